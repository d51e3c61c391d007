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

//! Score fusion and the weighted composite

use crate::checklist::is_usable_weight;
use medicontent_core::{fused_score, EvalMode, ItemId};
use std::collections::BTreeMap;

/// Per-item maximum of rule and judge scores over every item of the mode
pub fn fuse(
    rule_scores: &BTreeMap<ItemId, u8>,
    llm_scores: &BTreeMap<ItemId, u8>,
    mode: EvalMode,
) -> BTreeMap<ItemId, u8> {
    mode.item_ids()
        .map(|item_id| {
            let rule = rule_scores.get(&item_id).copied().unwrap_or(0);
            let llm = llm_scores.get(&item_id).copied().unwrap_or(0);
            (item_id, fused_score(rule, llm))
        })
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Composite score.
///
/// Compliance normalizes 0-5 scores by the weight table to 0-100. SEO sums
/// the already point-scaled items 1-9 with no normalization, so the two
/// totals are on different scales.
pub fn weighted_total(
    final_scores: &BTreeMap<ItemId, u8>,
    weights: &BTreeMap<ItemId, f64>,
    mode: EvalMode,
) -> f64 {
    match mode {
        EvalMode::Seo => round1(
            mode.item_ids()
                .map(|id| final_scores.get(&id).copied().unwrap_or(0) as f64)
                .sum(),
        ),
        EvalMode::Compliance => {
            let usable = || weights.iter().filter(|(_, w)| is_usable_weight(**w));
            let denominator: f64 = usable().map(|(_, w)| w).sum();
            if denominator <= 0.0 {
                return 0.0;
            }
            let numerator: f64 = usable()
                .map(|(id, weight)| {
                    let score = final_scores.get(id).copied().unwrap_or(0).min(5) as f64;
                    score / 5.0 * weight
                })
                .sum();
            round1(numerator / denominator * 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::default_weights;
    use proptest::prelude::*;

    #[test]
    fn test_fuse_covers_every_item() {
        let rule = BTreeMap::from([(1, 5), (3, 2)]);
        let llm = BTreeMap::from([(1, 2), (3, 4), (7, 1)]);
        let fused = fuse(&rule, &llm, EvalMode::Compliance);

        assert_eq!(fused.len(), 15);
        assert_eq!(fused[&1], 5);
        assert_eq!(fused[&3], 4);
        assert_eq!(fused[&7], 1);
        assert_eq!(fused[&15], 0);
    }

    #[test]
    fn test_compliance_total() {
        let weights = default_weights(EvalMode::Compliance);
        let all_max: BTreeMap<ItemId, u8> = (1..=15).map(|id| (id, 5)).collect();
        assert_eq!(weighted_total(&all_max, &weights, EvalMode::Compliance), 100.0);

        let none = BTreeMap::new();
        assert_eq!(weighted_total(&none, &weights, EvalMode::Compliance), 0.0);

        // Item 1 alone at 5: 8.6 / 104.3 * 100
        let one = BTreeMap::from([(1, 5)]);
        assert_eq!(weighted_total(&one, &weights, EvalMode::Compliance), 8.2);
    }

    #[test]
    fn test_seo_total_is_plain_sum() {
        let scores = BTreeMap::from([(1, 12), (3, 15), (9, 8), (10, 99)]);
        assert_eq!(
            weighted_total(&scores, &BTreeMap::new(), EvalMode::Seo),
            35.0
        );
    }

    #[test]
    fn test_empty_weights_give_zero() {
        let scores = BTreeMap::from([(1, 5)]);
        assert_eq!(
            weighted_total(&scores, &BTreeMap::new(), EvalMode::Compliance),
            0.0
        );
    }

    #[test]
    fn test_negative_weight_cannot_pull_total_below_zero() {
        let weights = BTreeMap::from([(1, 10.0), (2, -5.0)]);
        let scores = BTreeMap::from([(1, 0), (2, 5)]);
        assert_eq!(weighted_total(&scores, &weights, EvalMode::Compliance), 0.0);

        let weights = BTreeMap::from([(1, 0.0), (2, f64::INFINITY)]);
        assert_eq!(weighted_total(&scores, &weights, EvalMode::Compliance), 0.0);
    }

    proptest! {
        #[test]
        fn prop_fused_is_max(rule in prop::collection::vec(0u8..=5, 15), llm in prop::collection::vec(0u8..=5, 15)) {
            let rule_map: BTreeMap<ItemId, u8> = (1..=15).zip(rule.iter().copied()).collect();
            let llm_map: BTreeMap<ItemId, u8> = (1..=15).zip(llm.iter().copied()).collect();
            let fused = fuse(&rule_map, &llm_map, EvalMode::Compliance);
            for id in 1..=15u32 {
                prop_assert_eq!(fused[&id], rule_map[&id].max(llm_map[&id]));
                prop_assert!(fused[&id] <= 5);
            }
        }

        #[test]
        fn prop_compliance_total_in_range(
            scores in prop::collection::vec(0u8..=5, 15),
            weights in prop::collection::vec(0.1f64..10.0, 15),
        ) {
            let scores: BTreeMap<ItemId, u8> = (1..=15).zip(scores).collect();
            let weights: BTreeMap<ItemId, f64> = (1..=15).zip(weights).collect();
            let total = weighted_total(&scores, &weights, EvalMode::Compliance);
            prop_assert!((0.0..=100.0).contains(&total));
        }

        #[test]
        fn prop_compliance_total_in_range_with_signed_weights(
            scores in prop::collection::vec(0u8..=5, 15),
            weights in prop::collection::vec(-10.0f64..10.0, 15),
        ) {
            let scores: BTreeMap<ItemId, u8> = (1..=15).zip(scores).collect();
            let weights: BTreeMap<ItemId, f64> = (1..=15).zip(weights).collect();
            let total = weighted_total(&scores, &weights, EvalMode::Compliance);
            prop_assert!((0.0..=100.0).contains(&total));
        }
    }
}
