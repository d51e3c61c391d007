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

//! # Medicontent Evaluation Engine
//!
//! Grades a marketing draft (title + body) against the medical-advertising
//! compliance checklist or the SEO quality checklist, and drives a bounded
//! regeneration loop that patches flagged passages and re-scores them.
//!
//! ## Features
//!
//! - **Rule scoring**: compiled regex checklists, cached by rule-source hash
//! - **SEO text metrics**: lengths, morpheme and image counts scored in bands
//! - **LLM-as-judge**: OpenAI-compatible and Gemini clients behind one trait
//! - **Regeneration loop**: patch, re-score and a post-hoc fit score
//! - **Batch evaluation**: independent drafts evaluated concurrently
//!
//! ## Example
//!
//! ```rust,ignore
//! use medicontent_core::EngineConfig;
//! use medicontent_evals::{AutoApprove, ContentEvaluator, PatternCache, RegenerationLoop};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let cache = PatternCache::default();
//!     let evaluator = Arc::new(ContentEvaluator::from_config(&config, &cache)?);
//!
//!     let driver = RegenerationLoop::new(evaluator, Arc::new(AutoApprove))
//!         .with_max_loops(config.evaluation.max_loops);
//!     let outcome = driver.run("제목", "본문").await?;
//!     println!("{}", outcome.record.weighted_total);
//!     Ok(())
//! }
//! ```

use medicontent_core::CoreError;
use thiserror::Error;

pub mod cache;
pub mod checklist;
pub mod evaluator;
pub mod evaluators;
pub mod fusion;
pub mod input;
pub mod llm_client;
pub mod patcher;
pub mod prompts;
pub mod regen_fit;
pub mod regeneration;
pub mod response_parser;
pub mod sink;
pub mod violations;

pub use cache::{CacheStats, PatternCache};
pub use checklist::{ChecklistItem, ChecklistRow, CompiledChecklist, RuleSource};
pub use evaluator::ContentEvaluator;
pub use evaluators::{Judge, JudgeVerdict, RuleOutcome, RuleScorer, SeoMetrics, TextMetrics};
pub use fusion::{fuse, weighted_total};
pub use input::Draft;
pub use llm_client::{client_from_config, LLMClient, LLMError, LLMResponse, RetryingClient};
pub use patcher::{apply_patches, PatchScope, PatchType, PatchUnit};
pub use prompts::{PromptTemplates, Stage};
pub use regen_fit::fit;
pub use regeneration::{AutoApprove, LoopOutcome, ProceedGate, RegenerationLoop};
pub use sink::{JsonFileSink, MemorySink, RecordSink};
pub use violations::{detect, violates};

/// Errors that can occur during evaluation
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Judge unavailable: {0}")]
    JudgeUnavailable(String),

    #[error("Judge response unusable: {0}")]
    JudgeParseError(String),

    #[error("Patch generation failed: {0}")]
    PatchGenerationFailed(String),

    #[error("Threshold profile not found: {0}")]
    ThresholdProfileMissing(String),

    #[error("Invalid rule source: {0}")]
    RuleSource(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Record sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether the error came from the judge boundary
    pub fn is_judge_failure(&self) -> bool {
        matches!(self, Self::JudgeUnavailable(_) | Self::JudgeParseError(_))
    }
}
