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

//! Prompt templates for evaluation and regeneration

use crate::checklist::CompiledChecklist;
use crate::evaluators::text_metrics::{band_points, SeoMetrics};
use crate::EvalError;
use medicontent_core::{EvalMode, ItemId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

pub const COMPLIANCE_TEMPLATE_FILE: &str = "compliance_evaluation.txt";
pub const SEO_TEMPLATE_FILE: &str = "seo_evaluation.txt";
pub const REGENERATION_TEMPLATE_FILE: &str = "regeneration.txt";

const DEFAULT_COMPLIANCE_TEMPLATE: &str = r#"당신은 의료광고 심의 전문가입니다. 아래 콘텐츠를 의료법 의료광고 체크리스트 항목별로 평가하십시오.

[평가 항목]
{checklist}

[점수 기준]
각 항목을 0~5점으로 채점합니다. 0점은 위반 소지 없음, 5점은 명백한 위반입니다.

[콘텐츠]
제목: {title}

본문:
{body}

[출력 형식]
{"scores": {"1": 0, "2": 0, ...}, "analysis": "항목별 상세 분석", "tips": ["구체적인 수정 권고", ...]}"#;

const DEFAULT_SEO_TEMPLATE: &str = r#"당신은 네이버 블로그 SEO 전문가입니다. 아래 콘텐츠를 SEO 체크리스트 항목별로 평가하십시오.

[평가 항목]
{checklist}

[콘텐츠]
제목: {title}

본문:
{body}

[실제 측정값과 정답]
{metrics}

위의 정답 점수를 그대로 사용하세요. 다른 점수를 부여하지 마세요.

[출력 형식]
{"scores": {"1": 0, "2": 0, ...}, "analysis": "항목별 상세 분석", "tips": ["구체적인 개선 권고", ...]}"#;

const DEFAULT_REGENERATION_TEMPLATE: &str = r#"당신은 의료광고 콘텐츠 편집자입니다. 아래 콘텐츠에서 기준을 위반한 항목만 국소적으로 수정하십시오. 문단 구조와 흐름은 최대한 유지합니다.

[평가 기준]
{profile}

[위반 항목]
{violations}

[수정 권고]
{hints}

[수정 범위]
{stage}

[콘텐츠]
제목: {title}

본문:
{body}

[출력 형식]
{"patch_units": [{"type": "replace|insert|delete", "scope": "title|body", "before": "기존 문구", "after": "수정 문구"}]}"#;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

const JSON_ONLY: &str = "\n\n반드시 위의 출력 형식의 JSON만 출력하고, 추가 설명은 쓰지 마십시오.";

/// Which parts of the draft a regeneration pass may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Content,
    Both,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Content => "content",
            Stage::Both => "both",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit stage for a violation set. Body-level items win over items that
/// also involve the title.
pub fn map_stage(violations: &[ItemId]) -> Stage {
    const CONTENT_ITEMS: [ItemId; 8] = [1, 2, 3, 5, 7, 9, 12, 14];
    const TITLE_AND_BODY_ITEMS: [ItemId; 3] = [6, 10, 11];

    if violations.iter().any(|v| CONTENT_ITEMS.contains(v)) {
        Stage::Content
    } else if violations.iter().any(|v| TITLE_AND_BODY_ITEMS.contains(v)) {
        Stage::Both
    } else {
        Stage::Content
    }
}

/// Replace `{key}` placeholders in one pass; unknown keys stay as written
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Evaluation and regeneration templates
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub compliance: String,
    pub seo: String,
    pub regeneration: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            compliance: DEFAULT_COMPLIANCE_TEMPLATE.to_string(),
            seo: DEFAULT_SEO_TEMPLATE.to_string(),
            regeneration: DEFAULT_REGENERATION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Built-in templates, each overridden by a same-named file in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self, EvalError> {
        let mut templates = Self::default();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        for (file, slot) in [
            (COMPLIANCE_TEMPLATE_FILE, &mut templates.compliance),
            (SEO_TEMPLATE_FILE, &mut templates.seo),
            (REGENERATION_TEMPLATE_FILE, &mut templates.regeneration),
        ] {
            let path = dir.join(file);
            if path.is_file() {
                *slot = std::fs::read_to_string(&path)?;
                info!(path = %path.display(), "loaded prompt template override");
            }
        }
        Ok(templates)
    }

    pub fn evaluation(
        &self,
        mode: EvalMode,
        title: &str,
        body: &str,
        checklist: &CompiledChecklist,
        metrics: Option<&SeoMetrics>,
    ) -> String {
        let checklist_text = checklist_lines(checklist);
        let metrics_text = metrics.map(metrics_lines).unwrap_or_default();
        let template = match mode {
            EvalMode::Compliance => &self.compliance,
            EvalMode::Seo => &self.seo,
        };

        let prompt = render(
            template,
            &[
                ("checklist", &checklist_text),
                ("metrics", &metrics_text),
                ("title", title),
                ("body", body),
            ],
        );
        prompt + JSON_ONLY
    }

    pub fn regeneration(
        &self,
        title: &str,
        body: &str,
        profile: &str,
        violation_names: &[String],
        hints: &[String],
        stage: Stage,
    ) -> String {
        let violations = serde_json::to_string(violation_names).unwrap_or_default();
        let hints = serde_json::to_string(hints).unwrap_or_default();
        let prompt = render(
            &self.regeneration,
            &[
                ("profile", profile),
                ("violations", &violations),
                ("hints", &hints),
                ("stage", stage.as_str()),
                ("title", title),
                ("body", body),
            ],
        );
        prompt + JSON_ONLY
    }
}

fn checklist_lines(checklist: &CompiledChecklist) -> String {
    checklist
        .items()
        .map(|item| {
            if item.notes.is_empty() {
                format!("{}. {}", item.id, item.name)
            } else {
                format!("{}. {}: {}", item.id, item.name, item.notes)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn metrics_lines(metrics: &SeoMetrics) -> String {
    const UNITS: [&str; 9] = ["글자", "글자", "글자", "글자", "개", "개", "개", "개", "개"];
    metrics
        .values()
        .into_iter()
        .zip(UNITS)
        .map(|((item_id, value), unit)| {
            format!(
                "{}. {}: {}{} → {}점",
                item_id,
                crate::checklist::item_name(EvalMode::Seo, item_id),
                value,
                unit,
                band_points(item_id, value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
