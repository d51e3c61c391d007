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

//! Named threshold profiles
//!
//! A profile maps item ids to the threshold the fused score is compared
//! against. Items missing from a profile fall back to [`DEFAULT_THRESHOLD`].
//! Profiles are loaded once and only read afterwards.

use crate::error::{CoreError, Result};
use crate::mode::{EvalMode, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Threshold used for items a profile does not mention
pub const DEFAULT_THRESHOLD: u8 = 5;

/// Korean profile names used by the rule-source spreadsheets
const PROFILE_ALIASES: &[(&str, &str)] = &[
    ("strict", "엄격"),
    ("standard", "표준"),
    ("lenient", "유연"),
    ("excellent", "우수"),
    ("good", "양호"),
    ("average", "보통"),
];

/// Threshold map of a single profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thresholds(BTreeMap<ItemId, u8>);

impl Thresholds {
    pub fn new(map: BTreeMap<ItemId, u8>) -> Self {
        Self(map)
    }

    /// Threshold for an item, defaulting to [`DEFAULT_THRESHOLD`]
    pub fn get(&self, item_id: ItemId) -> u8 {
        self.0.get(&item_id).copied().unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &u8)> {
        self.0.iter()
    }
}

/// Set of named threshold profiles for one rule family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaProfile {
    profiles: BTreeMap<String, Thresholds>,
}

impl CriteriaProfile {
    pub fn new(profiles: BTreeMap<String, Thresholds>) -> Self {
        Self { profiles }
    }

    /// Built-in profiles for the given mode
    pub fn builtin(mode: EvalMode) -> Self {
        match mode {
            EvalMode::Compliance => Self::compliance_defaults(),
            EvalMode::Seo => Self::seo_defaults(),
        }
    }

    /// Compliance profiles: a final score above the threshold is a violation
    pub fn compliance_defaults() -> Self {
        let uniform = |limit: u8| {
            Thresholds::new(EvalMode::Compliance.item_ids().map(|id| (id, limit)).collect())
        };

        let mut profiles = BTreeMap::new();
        profiles.insert("strict".to_string(), uniform(1));
        profiles.insert("standard".to_string(), uniform(2));
        profiles.insert("lenient".to_string(), uniform(3));
        Self { profiles }
    }

    /// SEO profiles: a final score below the threshold is a violation.
    ///
    /// Each band reuses the point value of the matching metric band.
    pub fn seo_defaults() -> Self {
        const EXCELLENT: [u8; 9] = [12, 12, 15, 15, 10, 10, 10, 8, 8];
        const GOOD: [u8; 9] = [9, 9, 12, 12, 8, 8, 8, 6, 6];
        const AVERAGE: [u8; 9] = [6, 6, 9, 9, 6, 6, 6, 4, 4];

        let band = |points: [u8; 9]| {
            Thresholds::new(
                points
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| (idx as ItemId + 1, *p))
                    .collect(),
            )
        };

        let mut profiles = BTreeMap::new();
        profiles.insert("excellent".to_string(), band(EXCELLENT));
        profiles.insert("good".to_string(), band(GOOD));
        profiles.insert("average".to_string(), band(AVERAGE));
        Self { profiles }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load profiles from a JSON file shaped `{profile: {item_id: threshold}}`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Resolve a profile by name, accepting the Korean aliases in both directions
    pub fn thresholds(&self, name: &str) -> Result<&Thresholds> {
        if let Some(t) = self.profiles.get(name) {
            return Ok(t);
        }

        PROFILE_ALIASES
            .iter()
            .filter_map(|(en, ko)| {
                if *en == name {
                    Some(*ko)
                } else if *ko == name {
                    Some(*en)
                } else {
                    None
                }
            })
            .find_map(|alias| self.profiles.get(alias))
            .ok_or_else(|| CoreError::ThresholdProfileMissing(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
