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

//! Evaluation record contracts emitted to the persistence collaborator

use crate::mode::{EvalMode, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest score either the rule engine or the judge may give a compliance item
pub const MAX_COMPLIANCE_SCORE: u8 = 5;

/// Fuse a rule score and a judge score for one item.
///
/// The fused score is always the larger of the two observations.
pub fn fused_score(rule_score: u8, llm_score: u8) -> u8 {
    rule_score.max(llm_score)
}

/// Per-item scoring outcome of one evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_id: ItemId,

    /// Human-readable checklist item name
    pub name: String,

    /// Score from deterministic pattern matching
    pub rule_score: u8,

    /// First matched substring per pattern that hit
    #[serde(default)]
    pub rule_hits: Vec<String>,

    /// Score from the LLM judge
    pub llm_score: u8,

    /// max(rule_score, llm_score)
    pub final_score: u8,

    /// Threshold the final score was compared against
    pub threshold: u8,

    /// Whether the item stayed on the right side of its threshold
    pub passed: bool,

    /// Measured value backing the item (SEO mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<u64>,

    /// Band points derived from the measured value (SEO mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_points: Option<u8>,
}

impl ItemScore {
    /// Build an item score; the final score is derived, never supplied
    pub fn fused(
        item_id: ItemId,
        name: impl Into<String>,
        rule_score: u8,
        rule_hits: Vec<String>,
        llm_score: u8,
    ) -> Self {
        Self {
            item_id,
            name: name.into(),
            rule_score,
            rule_hits,
            llm_score,
            final_score: fused_score(rule_score, llm_score),
            threshold: MAX_COMPLIANCE_SCORE,
            passed: true,
            actual_value: None,
            metric_points: None,
        }
    }

    pub fn with_verdict(mut self, threshold: u8, passed: bool) -> Self {
        self.threshold = threshold;
        self.passed = passed;
        self
    }

    pub fn with_measurement(mut self, actual_value: u64, metric_points: u8) -> Self {
        self.actual_value = Some(actual_value);
        self.metric_points = Some(metric_points);
        self
    }
}

/// Post-hoc quality of a regeneration pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegenFitResult {
    /// Share of the initial violations that were resolved
    pub risk_reduction_rate: f64,

    /// How well the rewrite followed the judge's tips (0-1)
    pub guideline_adherence: f64,

    /// How much paragraph/sentence/character structure survived (0-1)
    pub flow_stability: f64,

    /// Combined score on a 0-100 scale
    pub score_0_100: u32,
}

/// Summary of what the regeneration loop did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegenSummary {
    /// At least one patch was applied
    pub applied: bool,

    /// The operator declined to patch
    #[serde(default)]
    pub user_declined: bool,

    /// Number of scored states the loop produced
    pub iterations: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_violation_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_violation_count: Option<usize>,
}

/// One evaluation pass over a (title, body) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub title: String,
    pub body: String,
    pub mode: EvalMode,

    /// Name of the threshold profile the violations were computed against
    pub profile: String,

    /// 1-based index of the scored state this record describes
    pub iteration: u32,

    pub by_item: Vec<ItemScore>,

    /// Compliance: 0-100 normalized. SEO: raw sum of point-scaled scores.
    pub weighted_total: f64,

    pub violations: Vec<ItemId>,

    #[serde(default)]
    pub violation_names: Vec<String>,

    /// Improvement tips returned by the judge
    #[serde(default)]
    pub recommendations: Vec<String>,

    /// Free-text analysis returned by the judge
    #[serde(default)]
    pub analysis: String,

    pub llm_total_raw: u32,
    pub rule_total_proxy: u32,

    #[serde(default)]
    pub weights: BTreeMap<ItemId, f64>,

    #[serde(default)]
    pub regen: RegenSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regen_fit: Option<RegenFitResult>,

    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn item(&self, item_id: ItemId) -> Option<&ItemScore> {
        self.by_item.iter().find(|s| s.item_id == item_id)
    }

    /// Final scores keyed by item id
    pub fn final_scores(&self) -> BTreeMap<ItemId, u8> {
        self.by_item
            .iter()
            .map(|s| (s.item_id, s.final_score))
            .collect()
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fused_item_takes_max() {
        let score = ItemScore::fused(3, "discount", 5, vec!["30% 할인".into()], 2);
        assert_eq!(score.final_score, 5);

        let score = ItemScore::fused(3, "discount", 0, vec![], 4);
        assert_eq!(score.final_score, 4);
    }

    #[test]
    fn test_measurement_is_skipped_when_absent() {
        let score = ItemScore::fused(1, "title", 0, vec![], 12);
        let json = serde_json::to_value(&score).unwrap();
        assert!(json.get("actual_value").is_none());

        let score = score.with_measurement(30, 12);
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["actual_value"], 30);
        assert_eq!(json["metric_points"], 12);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = EvaluationRecord {
            title: "제목".into(),
            body: "본문".into(),
            mode: EvalMode::Compliance,
            profile: "standard".into(),
            iteration: 1,
            by_item: vec![ItemScore::fused(1, "claims", 5, vec!["100%".into()], 3)
                .with_verdict(2, false)],
            weighted_total: 8.6,
            violations: vec![1],
            violation_names: vec!["claims".into()],
            recommendations: vec![],
            analysis: String::new(),
            llm_total_raw: 3,
            rule_total_proxy: 5,
            weights: BTreeMap::from([(1, 8.6)]),
            regen: RegenSummary::default(),
            regen_fit: None,
            evaluated_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: EvaluationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.final_scores().get(&1), Some(&5));
        assert!(back.has_violations());
        assert_eq!(back.weights.get(&1), Some(&8.6));
    }

    proptest! {
        #[test]
        fn prop_fused_score_is_max(rule in 0u8..=15, llm in 0u8..=15) {
            let fused = fused_score(rule, llm);
            prop_assert!(fused >= rule && fused >= llm);
            prop_assert!(fused == rule || fused == llm);
        }

        #[test]
        fn prop_item_score_final_matches_fused(id in 1u32..=15, rule in 0u8..=5, llm in 0u8..=5) {
            let score = ItemScore::fused(id, "item", rule, vec![], llm);
            prop_assert_eq!(score.final_score, fused_score(rule, llm));
        }
    }
}
