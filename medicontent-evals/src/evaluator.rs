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

//! One scoring pass over a draft.
//!
//! `ContentEvaluator` is the explicit context every pass runs against: the
//! mode, the resolved threshold profile, the compiled checklist, the judge
//! and the prompt templates. Nothing here is process-global; the only state
//! shared between evaluators is the read-only compiled checklist.

use crate::cache::PatternCache;
use crate::checklist::{load_weights, CompiledChecklist, RuleSource};
use crate::evaluators::{Judge, RuleScorer, TextMetrics};
use crate::fusion::{fuse, weighted_total};
use crate::llm_client::{client_from_config, LLMClient};
use crate::patcher::{parse_patch_response, PatchUnit};
use crate::prompts::{map_stage, PromptTemplates};
use crate::violations::{detect_with, resolve_thresholds, violates};
use crate::EvalError;
use chrono::Utc;
use medicontent_core::{
    CriteriaProfile, EngineConfig, EvalMode, EvaluationRecord, ItemId, ItemScore, RegenSummary,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ContentEvaluator {
    mode: EvalMode,
    profile: String,
    criteria: CriteriaProfile,
    checklist: Arc<CompiledChecklist>,
    rule_scorer: RuleScorer,
    metrics: TextMetrics,
    judge: Judge,
    prompts: Arc<PromptTemplates>,
}

impl ContentEvaluator {
    /// Build an evaluator, failing early when the threshold profile is unknown
    pub fn new(
        mode: EvalMode,
        profile: impl Into<String>,
        criteria: CriteriaProfile,
        checklist: Arc<CompiledChecklist>,
        client: Arc<dyn LLMClient>,
        prompts: Arc<PromptTemplates>,
    ) -> Result<Self, EvalError> {
        let profile = profile.into();
        resolve_thresholds(&criteria, &profile)?;
        if checklist.mode() != mode {
            return Err(EvalError::RuleSource(format!(
                "checklist compiled for {} cannot evaluate in {} mode",
                checklist.mode(),
                mode
            )));
        }

        Ok(Self {
            mode,
            profile,
            criteria,
            rule_scorer: RuleScorer::new(checklist.clone()),
            checklist,
            metrics: TextMetrics::default(),
            judge: Judge::new(client, prompts.clone()),
            prompts,
        })
    }

    /// Build from configuration, constructing the LLM client it names
    pub fn from_config(config: &EngineConfig, cache: &PatternCache) -> Result<Self, EvalError> {
        let client = client_from_config(&config.llm)
            .map_err(|e| EvalError::JudgeUnavailable(e.to_string()))?;
        Self::from_config_with_client(config, client, cache)
    }

    pub fn from_config_with_client(
        config: &EngineConfig,
        client: Arc<dyn LLMClient>,
        cache: &PatternCache,
    ) -> Result<Self, EvalError> {
        let mode = config.evaluation.mode;
        let rules = &config.rules;

        let source = RuleSource::load(mode, rules.checklist_path.as_deref())?;
        let weights = load_weights(mode, rules.weights_path.as_deref());
        let checklist = cache.get_or_compile(mode, &source, &weights);

        let criteria = match &rules.criteria_path {
            Some(path) => CriteriaProfile::from_json_file(path)?,
            None => CriteriaProfile::builtin(mode),
        };
        let prompts = Arc::new(PromptTemplates::load(rules.prompt_dir.as_deref())?);

        info!(
            %mode,
            profile = config.evaluation.profile_name(),
            items = checklist.items().count(),
            "evaluator ready"
        );
        Self::new(
            mode,
            config.evaluation.profile_name(),
            criteria,
            checklist,
            client,
            prompts,
        )
    }

    /// Replace the SEO text measurer
    pub fn with_metrics(mut self, metrics: TextMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn checklist(&self) -> &Arc<CompiledChecklist> {
        &self.checklist
    }

    /// Score a draft: rules (compliance only), SEO metrics (SEO only), then
    /// the judge. A judge failure aborts the pass.
    pub async fn score(
        &self,
        title: &str,
        body: &str,
        iteration: u32,
    ) -> Result<EvaluationRecord, EvalError> {
        let mode = self.mode;
        let thresholds = resolve_thresholds(&self.criteria, &self.profile)?;

        let rule_outcomes = match mode {
            EvalMode::Compliance => self.rule_scorer.score_all(title, body),
            EvalMode::Seo => BTreeMap::new(),
        };
        let metrics = match mode {
            EvalMode::Seo => Some(self.metrics.measure(title, body)),
            EvalMode::Compliance => None,
        };

        let verdict = self
            .judge
            .judge(title, body, &self.checklist, metrics.as_ref())
            .await?;

        let rule_scores: BTreeMap<ItemId, u8> = rule_outcomes
            .iter()
            .map(|(id, outcome)| (*id, outcome.score))
            .collect();
        let final_scores = fuse(&rule_scores, &verdict.scores, mode);
        let violations = detect_with(&final_scores, thresholds, mode);

        let by_item: Vec<ItemScore> = mode
            .item_ids()
            .map(|item_id| {
                let (rule_score, hits) = rule_outcomes
                    .get(&item_id)
                    .map(|o| (o.score, o.hits.clone()))
                    .unwrap_or_default();
                let threshold = thresholds.get(item_id);
                let item = ItemScore::fused(
                    item_id,
                    self.checklist.name(item_id),
                    rule_score,
                    hits,
                    verdict.score(item_id),
                );
                let passed = !violates(item.final_score, threshold, mode);
                let item = item.with_verdict(threshold, passed);

                match metrics
                    .as_ref()
                    .and_then(|m| Some((m.value(item_id)?, m.points(item_id)?)))
                {
                    Some((actual, points)) => item.with_measurement(actual, points),
                    None => item,
                }
            })
            .collect();

        let violation_names = violations
            .iter()
            .map(|id| self.checklist.name(*id))
            .collect();
        let weights = self.checklist.weights().clone();
        let total = weighted_total(&final_scores, &weights, mode);

        debug!(
            iteration,
            total,
            violations = ?violations,
            "scored draft"
        );

        Ok(EvaluationRecord {
            title: title.to_string(),
            body: body.to_string(),
            mode,
            profile: self.profile.clone(),
            iteration,
            llm_total_raw: by_item.iter().map(|s| s.llm_score as u32).sum(),
            rule_total_proxy: by_item.iter().map(|s| s.rule_score as u32).sum(),
            by_item,
            weighted_total: total,
            violations,
            violation_names,
            recommendations: verdict.tips,
            analysis: verdict.analysis,
            weights,
            regen: RegenSummary::default(),
            regen_fit: None,
            evaluated_at: Utc::now(),
        })
    }

    /// Ask the LLM for a patch object targeting the record's violations
    pub async fn generate_patch(
        &self,
        record: &EvaluationRecord,
    ) -> Result<Vec<PatchUnit>, EvalError> {
        let stage = map_stage(&record.violations);
        let labelled: Vec<String> = record
            .violations
            .iter()
            .map(|id| format!("{}({})", self.checklist.name(*id), id))
            .collect();
        let prompt = self.prompts.regeneration(
            &record.title,
            &record.body,
            &self.profile,
            &labelled,
            &record.recommendations,
            stage,
        );

        let response = self
            .judge
            .client()
            .evaluate(prompt)
            .await
            .map_err(|e| EvalError::PatchGenerationFailed(e.to_string()))?;
        let units = parse_patch_response(&response.content)?;
        debug!(%stage, units = units.len(), "patch generated");
        Ok(units)
    }
}
