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

//! Evaluation modes and checklist item identifiers

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Numeric identifier of a checklist item (1-based, stable per rule family)
pub type ItemId = u32;

/// Number of items in the medical-advertising compliance checklist
pub const COMPLIANCE_ITEM_COUNT: u32 = 15;

/// Number of items in the SEO quality checklist
pub const SEO_ITEM_COUNT: u32 = 9;

/// Rule family a piece of content is graded against.
///
/// The two families disagree on what a high score means: in compliance mode a
/// high score means risky language was found, in SEO mode a high score means
/// the quality signal is strong. Every component that compares scores must
/// branch on the mode instead of assuming one polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    /// Medical-advertising legal compliance (15 items, 0-5 risk scores)
    #[default]
    Compliance,
    /// SEO quality (9 items, per-metric point scales)
    Seo,
}

impl EvalMode {
    pub fn item_count(&self) -> u32 {
        match self {
            EvalMode::Compliance => COMPLIANCE_ITEM_COUNT,
            EvalMode::Seo => SEO_ITEM_COUNT,
        }
    }

    pub fn item_ids(&self) -> RangeInclusive<ItemId> {
        1..=self.item_count()
    }

    /// Threshold profile used when the caller does not name one
    pub fn default_profile(&self) -> &'static str {
        match self {
            EvalMode::Compliance => "standard",
            EvalMode::Seo => "good",
        }
    }

    /// Short label used in output file names
    pub fn file_label(&self) -> &'static str {
        match self {
            EvalMode::Compliance => "legal",
            EvalMode::Seo => "seo",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvalMode::Compliance => "compliance",
            EvalMode::Seo => "seo",
        }
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvalMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compliance" | "medical" | "legal" => Ok(EvalMode::Compliance),
            "seo" => Ok(EvalMode::Seo),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_aliases() {
        assert_eq!("medical".parse::<EvalMode>().unwrap(), EvalMode::Compliance);
        assert_eq!("Legal".parse::<EvalMode>().unwrap(), EvalMode::Compliance);
        assert_eq!("seo".parse::<EvalMode>().unwrap(), EvalMode::Seo);
        assert!("marketing".parse::<EvalMode>().is_err());
    }

    #[test]
    fn test_default_mode_is_compliance() {
        assert_eq!(EvalMode::default(), EvalMode::Compliance);
    }

    #[test]
    fn test_item_ranges() {
        assert_eq!(EvalMode::Compliance.item_ids().count(), 15);
        assert_eq!(EvalMode::Seo.item_ids().count(), 9);
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&EvalMode::Seo).unwrap();
        assert_eq!(json, "\"seo\"");
    }
}
