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

//! Extraction of one JSON object from noisy LLM output.
//!
//! Handles markdown fences, leading/trailing prose and braces inside string
//! literals. An empty response and an unparseable one are distinct errors.

use crate::EvalError;
use serde_json::Value;

/// Strip a surrounding markdown code fence, if any
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Locate the first balanced `{...}` block, ignoring braces inside strings
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the JSON object contained in a raw LLM response.
///
/// Tries the balanced block first, then the span from the first `{` to the
/// last `}`, then the whole fence-stripped text.
pub fn extract_json(raw: &str) -> Result<Value, EvalError> {
    if raw.trim().is_empty() {
        return Err(EvalError::JudgeUnavailable("empty LLM response".to_string()));
    }

    let text = strip_fence(raw);
    let mut candidates: Vec<&str> = Vec::with_capacity(3);
    if let Some(block) = balanced_object(text) {
        candidates.push(block);
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            candidates.push(&text[start..=end]);
        }
    }
    candidates.push(text.trim_matches('`').trim());

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(_) => last_error = Some("response is not a JSON object".to_string()),
            Err(err) => last_error = Some(err.to_string()),
        }
    }

    let preview: String = raw.chars().take(120).collect();
    Err(EvalError::JudgeParseError(format!(
        "{}; response starts with: {preview}",
        last_error.unwrap_or_else(|| "no JSON object found".to_string())
    )))
}
