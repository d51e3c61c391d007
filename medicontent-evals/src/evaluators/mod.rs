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

//! Scoring components: regex rules, SEO text metrics and the LLM judge

pub mod judge;
pub mod morpheme;
pub mod rule_scorer;
pub mod text_metrics;

pub use judge::{Judge, JudgeVerdict};
pub use morpheme::{default_analyzer, HeuristicKoreanAnalyzer, MorphemeAnalyzer};
#[cfg(feature = "ko-dic")]
pub use morpheme::DictionaryKoreanAnalyzer;
pub use rule_scorer::{compose_text, RuleOutcome, RuleScorer};
pub use text_metrics::{SeoMetrics, TextMetrics};
