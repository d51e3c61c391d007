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

//! Structural edit instructions and their application to title/body

use crate::response_parser::extract_json;
use crate::EvalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    Replace,
    Insert,
    Delete,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchScope {
    Title,
    #[default]
    #[serde(other)]
    Body,
}

/// One atomic edit instruction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchUnit {
    #[serde(rename = "type", default)]
    pub kind: PatchType,

    #[serde(default)]
    pub scope: PatchScope,

    #[serde(default)]
    pub before: Option<String>,

    #[serde(default)]
    pub after: Option<String>,
}

impl PatchUnit {
    fn before(&self) -> Option<&str> {
        self.before.as_deref().filter(|s| !s.is_empty())
    }

    fn after(&self) -> Option<&str> {
        self.after.as_deref().filter(|s| !s.is_empty())
    }
}

/// Patch units from an LLM response. Units that do not deserialize are
/// dropped; a missing `patch_units` list yields no units.
pub fn parse_patch_units(value: &Value) -> Vec<PatchUnit> {
    let Some(units) = value.get("patch_units").and_then(Value::as_array) else {
        return Vec::new();
    };
    units
        .iter()
        .filter_map(|unit| match serde_json::from_value::<PatchUnit>(unit.clone()) {
            Ok(unit) => Some(unit),
            Err(err) => {
                debug!(error = %err, "skipping malformed patch unit");
                None
            }
        })
        .collect()
}

/// Parse raw regeneration output into patch units
pub fn parse_patch_response(raw: &str) -> Result<Vec<PatchUnit>, EvalError> {
    let value = extract_json(raw).map_err(|err| EvalError::PatchGenerationFailed(err.to_string()))?;
    Ok(parse_patch_units(&value))
}

/// Apply units in order; later units see earlier results.
///
/// A unit whose `before` text is absent is a no-op, as is one that would
/// leave the title empty.
pub fn apply_patches(title: &str, body: &str, units: &[PatchUnit]) -> (String, String) {
    let mut title = title.to_string();
    let mut body = body.to_string();

    for (index, unit) in units.iter().enumerate() {
        let applied = match unit.scope {
            PatchScope::Title => apply_to_title(&mut title, unit),
            PatchScope::Body => apply_to_body(&mut body, unit),
        };
        if !applied {
            debug!(index, kind = ?unit.kind, scope = ?unit.scope, "patch unit had no effect");
        }
    }

    (title, body)
}

fn apply_to_title(title: &mut String, unit: &PatchUnit) -> bool {
    let after = unit.after.as_deref().unwrap_or("");
    let updated = match (unit.kind, unit.before()) {
        (PatchType::Replace, Some(before)) => title.replace(before, after),
        (PatchType::Replace, None) | (PatchType::Insert, _) => after.to_string(),
        (PatchType::Delete, Some(before)) => title.replace(before, ""),
        _ => return false,
    };
    if updated.trim().is_empty() || updated == *title {
        return false;
    }
    *title = updated;
    true
}

fn apply_to_body(body: &mut String, unit: &PatchUnit) -> bool {
    match (unit.kind, unit.before(), unit.after()) {
        (PatchType::Replace, Some(before), _) if body.contains(before) => {
            *body = body.replace(before, unit.after.as_deref().unwrap_or(""));
            true
        }
        (PatchType::Insert, _, Some(after)) => {
            body.push_str("\n\n");
            body.push_str(after);
            true
        }
        (PatchType::Delete, Some(before), _) if body.contains(before) => {
            *body = body.replace(before, "");
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(kind: PatchType, scope: PatchScope, before: Option<&str>, after: Option<&str>) -> PatchUnit {
        PatchUnit {
            kind,
            scope,
            before: before.map(String::from),
            after: after.map(String::from),
        }
    }

    #[test]
    fn test_body_replace_requires_presence() {
        let units = [
            unit(PatchType::Replace, PatchScope::Body, Some("100% 효과"), Some("높은 만족도")),
            unit(PatchType::Replace, PatchScope::Body, Some("없는 문구"), Some("무시됨")),
        ];
        let (_, body) = apply_patches("제목", "시술은 100% 효과가 있습니다.", &units);
        assert_eq!(body, "시술은 높은 만족도가 있습니다.");
    }

    #[test]
    fn test_body_insert_appends_paragraph() {
        let units = [unit(PatchType::Insert, PatchScope::Body, None, Some("부작용은 개인차가 있습니다."))];
        let (_, body) = apply_patches("제목", "본문", &units);
        assert_eq!(body, "본문\n\n부작용은 개인차가 있습니다.");
    }

    #[test]
    fn test_body_delete_removes_all_occurrences() {
        let units = [unit(PatchType::Delete, PatchScope::Body, Some("최고의 "), None)];
        let (_, body) = apply_patches("제목", "최고의 병원, 최고의 의료진", &units);
        assert_eq!(body, "병원, 의료진");
    }

    #[test]
    fn test_title_replace_and_insert() {
        let replace = [unit(PatchType::Replace, PatchScope::Title, Some("최고"), Some("믿을 수 있는"))];
        let (title, _) = apply_patches("최고 임플란트", "본문", &replace);
        assert_eq!(title, "믿을 수 있는 임플란트");

        let whole = [unit(PatchType::Replace, PatchScope::Title, None, Some("새 제목"))];
        assert_eq!(apply_patches("옛 제목", "본문", &whole).0, "새 제목");

        let insert = [unit(PatchType::Insert, PatchScope::Title, None, Some("삽입 제목"))];
        assert_eq!(apply_patches("옛 제목", "본문", &insert).0, "삽입 제목");
    }

    #[test]
    fn test_title_is_never_emptied() {
        let units = [
            unit(PatchType::Insert, PatchScope::Title, None, None),
            unit(PatchType::Delete, PatchScope::Title, Some("제목"), None),
        ];
        assert_eq!(apply_patches("제목", "본문", &units).0, "제목");
    }

    #[test]
    fn test_units_apply_in_order() {
        let units = [
            unit(PatchType::Replace, PatchScope::Body, Some("A"), Some("B")),
            unit(PatchType::Replace, PatchScope::Body, Some("B"), Some("C")),
        ];
        assert_eq!(apply_patches("t", "A", &units).1, "C");
    }

    #[test]
    fn test_lenient_parsing() {
        let value = json!({
            "patch_units": [
                {"type": "replace", "scope": "body", "before": "x", "after": "y"},
                {"type": "rewrite", "before": "x"},
                {"scope": "title", "after": "t"},
                {"type": ["replace"]},
                "not an object"
            ]
        });
        let units = parse_patch_units(&value);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].kind, PatchType::Replace);
        assert_eq!(units[1].kind, PatchType::Unknown);
        assert_eq!(units[1].scope, PatchScope::Body);
        assert_eq!(units[2].scope, PatchScope::Title);

        // Unknown types are skipped when applied
        let (title, body) = apply_patches("t0", "x", &units[1..2]);
        assert_eq!((title.as_str(), body.as_str()), ("t0", "x"));

        assert!(parse_patch_units(&json!({"other": 1})).is_empty());
    }

    #[test]
    fn test_unparseable_patch_response_fails() {
        assert!(matches!(
            parse_patch_response("no json here"),
            Err(EvalError::PatchGenerationFailed(_))
        ));
        assert!(parse_patch_response("{\"patch_units\": []}").unwrap().is_empty());
    }
}
