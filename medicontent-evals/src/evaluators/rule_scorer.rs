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

//! Deterministic pattern scoring of compliance items

use crate::checklist::CompiledChecklist;
use medicontent_core::ItemId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Item scored 5 outright when absolute-certainty or zero-risk language hits
pub const EXAGGERATION_ITEM: ItemId = 1;

/// Discount pricing, before/after photos, patient inducement, price disclosure
pub const HIGH_RISK_ITEMS: [ItemId; 4] = [3, 5, 7, 14];

static STRONG_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)100\s*%|부작용\s*없").unwrap());

/// Score and evidence for one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub score: u8,
    pub hits: Vec<String>,
}

/// Text the rule engine and the judge both observe: title first
pub fn compose_text(title: &str, body: &str) -> String {
    format!("{title}\n\n{body}")
}

/// Applies compiled checklist patterns to text
#[derive(Debug, Clone)]
pub struct RuleScorer {
    checklist: Arc<CompiledChecklist>,
}

impl RuleScorer {
    pub fn new(checklist: Arc<CompiledChecklist>) -> Self {
        Self { checklist }
    }

    pub fn checklist(&self) -> &CompiledChecklist {
        &self.checklist
    }

    /// Score one item against already-composed text
    pub fn score(&self, item_id: ItemId, text: &str) -> RuleOutcome {
        let hits: Vec<String> = self
            .checklist
            .patterns(item_id)
            .iter()
            .filter_map(|pattern| pattern.find(text))
            .map(|m| m.as_str().to_string())
            .collect();

        RuleOutcome {
            score: score_hits(item_id, &hits),
            hits,
        }
    }

    /// Score every item of the checklist's mode
    pub fn score_all(&self, title: &str, body: &str) -> BTreeMap<ItemId, RuleOutcome> {
        let text = compose_text(title, body);
        self.checklist
            .mode()
            .item_ids()
            .map(|item_id| (item_id, self.score(item_id, &text)))
            .collect()
    }
}

/// Table-driven scoring of matched evidence
pub fn score_hits(item_id: ItemId, hits: &[String]) -> u8 {
    if hits.is_empty() {
        return 0;
    }
    if item_id == EXAGGERATION_ITEM && hits.iter().any(|hit| STRONG_MARKER.is_match(hit)) {
        return 5;
    }
    if HIGH_RISK_ITEMS.contains(&item_id) && hits.len() >= 2 {
        return 5;
    }
    if hits.len() == 1 {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{default_weights, ChecklistRow, RuleSource};
    use medicontent_core::EvalMode;
    use proptest::prelude::*;

    fn bare_scorer() -> RuleScorer {
        // Rows without notes: only the built-in base patterns apply
        let source = RuleSource {
            items: (1..=15)
                .map(|id| ChecklistRow {
                    id,
                    name: format!("item {id}"),
                    notes: String::new(),
                    patterns: vec![],
                })
                .collect(),
        };
        let weights = default_weights(EvalMode::Compliance);
        RuleScorer::new(Arc::new(CompiledChecklist::compile(
            EvalMode::Compliance,
            &source,
            &weights,
        )))
    }

    #[test]
    fn test_strong_marker_scores_five() {
        let scorer = bare_scorer();
        let text = compose_text("임플란트 안내", "효과 100% 보장, 부작용 없음");
        let outcome = scorer.score(1, &text);
        assert_eq!(outcome.score, 5);
        assert!(outcome.hits.contains(&"100%".to_string()));
        assert!(outcome.hits.contains(&"부작용 없음".to_string()));
    }

    #[test]
    fn test_hundred_percent_is_strong_whatever_follows() {
        let scorer = bare_scorer();
        for body in ["100% 성공", "100%성공", "성공률 100 %.", "(100%)"] {
            let outcome = scorer.score(1, &compose_text("임플란트 안내", body));
            assert_eq!(outcome.score, 5, "{body}");
        }
        for body in ["2100% 성장", "1000% 증가"] {
            let outcome = scorer.score(1, &compose_text("임플란트 안내", body));
            assert_eq!(outcome.score, 0, "{body}");
        }
    }

    #[test]
    fn test_discount_two_hits_scores_five() {
        let scorer = bare_scorer();
        let text = compose_text("교정 안내", "이번 달 행사가 적용, 30% 할인");
        let outcome = scorer.score(3, &text);
        assert_eq!(outcome.hits.len(), 2);
        assert_eq!(outcome.score, 5);
    }

    #[test]
    fn test_discount_single_hit_scores_two() {
        let scorer = bare_scorer();
        let text = compose_text("교정 안내", "이번 달 행사가 적용됩니다");
        let outcome = scorer.score(3, &text);
        assert_eq!(outcome.hits, vec!["행사가".to_string()]);
        assert_eq!(outcome.score, 2);
    }

    #[test]
    fn test_ordinary_item_scores_by_hit_count() {
        let scorer = bare_scorer();
        let one = scorer.score(2, &compose_text("", "만족도가 높습니다"));
        assert_eq!(one.score, 2);

        let two = scorer.score(2, &compose_text("", "실제 후기와 만족도"));
        assert_eq!(two.score, 3);

        let none = scorer.score(2, &compose_text("", "진료 시간 안내"));
        assert_eq!(none, RuleOutcome::default());
    }

    #[test]
    fn test_title_is_scanned() {
        let scorer = bare_scorer();
        let outcomes = scorer.score_all("심의번호 없는 광고", "본문");
        assert_eq!(outcomes[&4].score, 2);
        assert_eq!(outcomes.len(), 15);
    }

    #[test]
    fn test_unknown_item_scores_zero() {
        let scorer = bare_scorer();
        assert_eq!(scorer.score(42, "100% 최고"), RuleOutcome::default());
    }

    #[test]
    fn test_score_hits_table() {
        let hits = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(score_hits(1, &hits(&["최고"])), 2);
        assert_eq!(score_hits(1, &hits(&["100 %"])), 5);
        assert_eq!(score_hits(5, &hits(&["전후", "before"])), 5);
        assert_eq!(score_hits(6, &hits(&["전문의", "전문병원"])), 3);
        assert_eq!(score_hits(14, &hits(&["최저가"])), 2);
    }

    proptest! {
        #[test]
        fn prop_score_is_pure(body in "[가-힣a-z0-9 %!]{0,60}", item_id in 1u32..=15) {
            let scorer = bare_scorer();
            let text = compose_text("제목", &body);
            let first = scorer.score(item_id, &text);
            let second = scorer.score(item_id, &text);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.score <= 5);
        }
    }
}
