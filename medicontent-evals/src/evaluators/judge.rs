// Copyright 2025 Medicontent Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! LLM judge: per-item scores, analysis and improvement tips

use super::text_metrics::{max_points, SeoMetrics};
use crate::checklist::CompiledChecklist;
use crate::llm_client::LLMClient;
use crate::prompts::PromptTemplates;
use crate::response_parser::extract_json;
use crate::EvalError;
use medicontent_core::{EvalMode, ItemId, MAX_COMPLIANCE_SCORE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

const SCORE_KEYS: [&str; 2] = ["scores", "평가결과"];
const ANALYSIS_KEYS: [&str; 2] = ["analysis", "상세분석"];
const TIP_KEYS: [&str; 2] = ["tips", "권고수정"];

/// Parsed judge output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub scores: BTreeMap<ItemId, u8>,
    pub analysis: String,
    pub tips: Vec<String>,
}

impl JudgeVerdict {
    /// Interpret a parsed response. Items the judge skipped score 0; scores
    /// are clamped to the item's scale.
    pub fn from_value(value: &Value, mode: EvalMode) -> Self {
        let scores = first_key(value, &SCORE_KEYS)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, raw)| {
                        let item_id: ItemId = key.trim().parse().ok()?;
                        let score = numeric_score(raw)?;
                        Some((item_id, clamp_score(mode, item_id, score)))
                    })
                    .filter(|(item_id, _)| mode.item_ids().contains(item_id))
                    .collect()
            })
            .unwrap_or_default();

        let analysis = match first_key(value, &ANALYSIS_KEYS) {
            Some(Value::String(text)) => text.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => String::new(),
        };

        let tips = match first_key(value, &TIP_KEYS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|tip| match tip {
                    Value::String(text) => Some(text.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
            _ => Vec::new(),
        };

        Self {
            scores,
            analysis,
            tips,
        }
    }

    pub fn score(&self, item_id: ItemId) -> u8 {
        self.scores.get(&item_id).copied().unwrap_or(0)
    }
}

fn first_key<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| value.get(*key))
}

fn numeric_score(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => obj
            .get("score")
            .or_else(|| obj.get("점수"))
            .and_then(numeric_score),
        _ => None,
    }
}

fn clamp_score(mode: EvalMode, item_id: ItemId, score: f64) -> u8 {
    let max = match mode {
        EvalMode::Compliance => MAX_COMPLIANCE_SCORE,
        EvalMode::Seo => max_points(item_id),
    };
    score.round().clamp(0.0, max as f64) as u8
}

/// Builds the evaluation prompt, calls the LLM and parses its verdict.
///
/// A failed call or an unusable response is returned as an error; there is
/// no fallback verdict.
#[derive(Clone)]
pub struct Judge {
    client: Arc<dyn LLMClient>,
    prompts: Arc<PromptTemplates>,
}

impl Judge {
    pub fn new(client: Arc<dyn LLMClient>, prompts: Arc<PromptTemplates>) -> Self {
        Self { client, prompts }
    }

    pub fn client(&self) -> &Arc<dyn LLMClient> {
        &self.client
    }

    #[instrument(skip_all, fields(mode = %checklist.mode(), model = self.client.model_name()))]
    pub async fn judge(
        &self,
        title: &str,
        body: &str,
        checklist: &CompiledChecklist,
        metrics: Option<&SeoMetrics>,
    ) -> Result<JudgeVerdict, EvalError> {
        let mode = checklist.mode();
        let prompt = self.prompts.evaluation(mode, title, body, checklist, metrics);

        let response = self
            .client
            .evaluate(prompt)
            .await
            .map_err(|e| EvalError::JudgeUnavailable(e.to_string()))?;
        debug!(
            tokens = response.usage.total_tokens,
            chars = response.content.len(),
            "judge responded"
        );

        let value = extract_json(&response.content)?;
        Ok(JudgeVerdict::from_value(&value, mode))
    }
}
