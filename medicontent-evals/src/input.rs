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

//! Draft loading

use crate::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Body substituted for an empty body so the judge still has content to read
pub const EMPTY_BODY_PLACEHOLDER: &str = "제목 평가용 더미 콘텐츠입니다.";

/// A title and body pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub body: String,
}

impl Draft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Parse a plain-text draft: title on the first line, a separator line,
    /// then the body.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        let text = text.trim_start_matches('\u{feff}');
        let mut lines = text.lines();

        let title = lines.next().unwrap_or("").trim().to_string();
        if title.is_empty() {
            return Err(EvalError::InvalidInput("draft has no title line".into()));
        }

        let rest: Vec<&str> = lines.collect();
        let body_lines = match rest.split_first() {
            Some((separator, tail)) if separator.trim().is_empty() => tail,
            _ => rest.as_slice(),
        };
        let body = body_lines.join("\n").trim().to_string();

        Ok(Self {
            title,
            body: if body.is_empty() {
                EMPTY_BODY_PLACEHOLDER.to_string()
            } else {
                body
            },
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}
