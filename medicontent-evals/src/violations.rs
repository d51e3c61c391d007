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

//! Threshold comparison against a named criteria profile.
//!
//! The direction of the comparison depends on the mode. Compliance scores
//! measure risk, so an item violates when its score exceeds the threshold.
//! SEO scores measure quality, so an item violates when its score falls below
//! the threshold. The two are kept separate on purpose.

use crate::EvalError;
use medicontent_core::{CoreError, CriteriaProfile, EvalMode, ItemId, Thresholds};
use std::collections::BTreeMap;

/// Whether one score breaches its threshold in `mode`
pub fn violates(score: u8, threshold: u8, mode: EvalMode) -> bool {
    match mode {
        EvalMode::Compliance => score > threshold,
        EvalMode::Seo => score < threshold,
    }
}

/// Resolve a named profile, failing when it does not exist
pub fn resolve_thresholds<'a>(
    profile: &'a CriteriaProfile,
    profile_name: &str,
) -> Result<&'a Thresholds, EvalError> {
    profile.thresholds(profile_name).map_err(|err| match err {
        CoreError::ThresholdProfileMissing(name) => EvalError::ThresholdProfileMissing(name),
        other => EvalError::Core(other),
    })
}

/// Flagged items in ascending id order
pub fn detect_with(
    final_scores: &BTreeMap<ItemId, u8>,
    thresholds: &Thresholds,
    mode: EvalMode,
) -> Vec<ItemId> {
    final_scores
        .iter()
        .filter(|(item_id, score)| violates(**score, thresholds.get(**item_id), mode))
        .map(|(item_id, _)| *item_id)
        .collect()
}

pub fn detect(
    final_scores: &BTreeMap<ItemId, u8>,
    profile: &CriteriaProfile,
    profile_name: &str,
    mode: EvalMode,
) -> Result<Vec<ItemId>, EvalError> {
    let thresholds = resolve_thresholds(profile, profile_name)?;
    Ok(detect_with(final_scores, thresholds, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::fuse;
    use proptest::prelude::*;

    #[test]
    fn test_compliance_flags_scores_above_threshold() {
        let profile = CriteriaProfile::builtin(EvalMode::Compliance);
        let scores = BTreeMap::from([(1, 5), (2, 2), (3, 3)]);
        let flagged = detect(&scores, &profile, "standard", EvalMode::Compliance).unwrap();
        assert_eq!(flagged, vec![1, 3]);
    }

    #[test]
    fn test_seo_flags_scores_below_threshold() {
        let profile = CriteriaProfile::builtin(EvalMode::Seo);
        // good: item 1 needs 9, item 9 needs 6
        let scores = BTreeMap::from([(1, 12), (9, 2)]);
        let flagged = detect(&scores, &profile, "good", EvalMode::Seo).unwrap();
        assert_eq!(flagged, vec![9]);
    }

    #[test]
    fn test_missing_item_threshold_defaults_to_five() {
        let thresholds = Thresholds::new(BTreeMap::new());
        let scores = BTreeMap::from([(1, 5), (2, 4)]);
        assert!(detect_with(&scores, &thresholds, EvalMode::Compliance).is_empty());
        assert_eq!(detect_with(&scores, &thresholds, EvalMode::Seo), vec![2]);
    }

    #[test]
    fn test_unknown_profile_is_fatal() {
        let profile = CriteriaProfile::builtin(EvalMode::Compliance);
        let err = detect(&BTreeMap::new(), &profile, "paranoid", EvalMode::Compliance).unwrap_err();
        assert!(matches!(err, EvalError::ThresholdProfileMissing(_)));
    }

    #[test]
    fn test_korean_profile_alias() {
        let profile = CriteriaProfile::builtin(EvalMode::Compliance);
        let scores = BTreeMap::from([(1, 3)]);
        assert_eq!(
            detect(&scores, &profile, "엄격", EvalMode::Compliance).unwrap(),
            vec![1]
        );
    }

    proptest! {
        #[test]
        fn prop_directions_are_complementary(
            scores in prop::collection::vec(0u8..=5, 15),
            limits in prop::collection::vec(0u8..=4, 15),
        ) {
            let scores: BTreeMap<ItemId, u8> = (1..=15).zip(scores).collect();
            let compliance = Thresholds::new((1..=15).zip(limits.iter().copied()).collect());
            // Mirrored: score > t  <=>  !(score < t + 1)
            let seo = Thresholds::new((1..=15).zip(limits.iter().map(|t| t + 1)).collect());

            let over = detect_with(&scores, &compliance, EvalMode::Compliance);
            let under = detect_with(&scores, &seo, EvalMode::Seo);

            for id in 1..=15u32 {
                prop_assert!(over.contains(&id) != under.contains(&id));
            }
        }

        #[test]
        fn prop_fuse_and_detect_are_idempotent(
            rule in prop::collection::vec(0u8..=5, 15),
            llm in prop::collection::vec(0u8..=5, 15),
        ) {
            let profile = CriteriaProfile::builtin(EvalMode::Compliance);
            let rule: BTreeMap<ItemId, u8> = (1..=15).zip(rule).collect();
            let llm: BTreeMap<ItemId, u8> = (1..=15).zip(llm).collect();

            let first = detect(&fuse(&rule, &llm, EvalMode::Compliance), &profile, "standard", EvalMode::Compliance).unwrap();
            let second = detect(&fuse(&rule, &llm, EvalMode::Compliance), &profile, "standard", EvalMode::Compliance).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
