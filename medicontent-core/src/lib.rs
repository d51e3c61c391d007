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

//! Medicontent Core
//!
//! Shared contracts for grading marketing text against the medical-advertising
//! compliance checklist and the SEO quality checklist: evaluation modes,
//! per-item scores, evaluation records, threshold profiles and configuration.

pub mod config;
pub mod criteria;
pub mod error;
pub mod mode;
pub mod record;
pub mod resilience;

pub use config::{
    EngineConfig, EvaluationConfig, LlmConfig, LlmProvider, OutputConfig, RulesConfig,
};
pub use criteria::{CriteriaProfile, Thresholds, DEFAULT_THRESHOLD};
pub use error::{CoreError, Result};
pub use mode::{EvalMode, ItemId, COMPLIANCE_ITEM_COUNT, SEO_ITEM_COUNT};
pub use record::{
    fused_score, EvaluationRecord, ItemScore, RegenFitResult, RegenSummary, MAX_COMPLIANCE_SCORE,
};
pub use resilience::RetryPolicy;
