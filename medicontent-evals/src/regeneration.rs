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

//! Regeneration loop driver.
//!
//! ```text
//! SCORED ──(no violations | budget spent | declined)──▶ TERMINAL
//!    │
//!    └──▶ PATCHING ──▶ SCORED ──▶ ...
//! ```
//!
//! The loop is strictly sequential within one draft. Independent drafts run
//! concurrently through [`RegenerationLoop::run_many`], sharing only the
//! compiled checklist held by the evaluator.

use crate::evaluator::ContentEvaluator;
use crate::evaluators::compose_text;
use crate::input::Draft;
use crate::patcher::apply_patches;
use crate::regen_fit::fit;
use crate::EvalError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use medicontent_core::{EvaluationRecord, RegenSummary};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_MAX_LOOPS: u32 = 2;

/// Operator confirmation before each patch pass
#[async_trait]
pub trait ProceedGate: Send + Sync {
    /// Return false to stop with the current scores
    async fn proceed(&self, record: &EvaluationRecord) -> bool;
}

/// Gate that always proceeds (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ProceedGate for AutoApprove {
    async fn proceed(&self, _record: &EvaluationRecord) -> bool {
        true
    }
}

/// Final record plus every earlier scored state, oldest first
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub record: EvaluationRecord,
    pub history: Vec<EvaluationRecord>,
}

impl LoopOutcome {
    /// The very first scored state
    pub fn initial(&self) -> &EvaluationRecord {
        self.history.first().unwrap_or(&self.record)
    }

    pub fn patched(&self) -> bool {
        self.record.regen.applied
    }
}

pub struct RegenerationLoop {
    evaluator: Arc<ContentEvaluator>,
    gate: Arc<dyn ProceedGate>,
    max_loops: u32,
    cancel: CancellationToken,
}

impl RegenerationLoop {
    pub fn new(evaluator: Arc<ContentEvaluator>, gate: Arc<dyn ProceedGate>) -> Self {
        Self {
            evaluator,
            gate,
            max_loops: DEFAULT_MAX_LOOPS,
            cancel: CancellationToken::new(),
        }
    }

    /// Total scored states allowed, the initial one included
    pub fn with_max_loops(mut self, max_loops: u32) -> Self {
        self.max_loops = max_loops.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn evaluator(&self) -> &Arc<ContentEvaluator> {
        &self.evaluator
    }

    /// Evaluate one draft to a terminal state
    pub async fn run(&self, title: &str, body: &str) -> Result<LoopOutcome, EvalError> {
        let span = info_span!(
            "evaluation",
            mode = %self.evaluator.mode(),
            profile = self.evaluator.profile(),
            max_loops = self.max_loops,
        );
        self.drive(title, body).instrument(span).await
    }

    async fn drive(&self, title: &str, body: &str) -> Result<LoopOutcome, EvalError> {
        let mut current = self.evaluator.score(title, body, 1).await?;
        let mut history: Vec<EvaluationRecord> = Vec::new();
        let mut declined = false;

        loop {
            info!(
                iteration = current.iteration,
                total = current.weighted_total,
                violations = ?current.violations,
                "scored"
            );

            if current.violations.is_empty() {
                break;
            }
            if current.iteration >= self.max_loops {
                debug!("loop budget spent");
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(EvalError::Cancelled);
            }
            if !self.gate.proceed(&current).await {
                info!("regeneration declined");
                declined = true;
                break;
            }

            let units = self.evaluator.generate_patch(&current).await?;
            if units.is_empty() {
                warn!(iteration = current.iteration, "patch response had no units");
            }
            let (title, body) = apply_patches(&current.title, &current.body, &units);

            if self.cancel.is_cancelled() {
                return Err(EvalError::Cancelled);
            }
            let next = self
                .evaluator
                .score(&title, &body, current.iteration + 1)
                .await?;
            history.push(std::mem::replace(&mut current, next));
        }

        let applied = !history.is_empty();
        current.regen = RegenSummary {
            applied,
            user_declined: declined,
            iterations: current.iteration,
            before_violation_count: history.first().map(|first| first.violations.len()),
            after_violation_count: applied.then(|| current.violations.len()),
        };

        if let Some(first) = history.first() {
            let result = fit(
                &first.violations,
                &current.violations,
                &compose_text(&first.title, &first.body),
                &compose_text(&current.title, &current.body),
                &current.recommendations,
            );
            info!(score = result.score_0_100, "regeneration fit");
            current.regen_fit = Some(result);
        }

        Ok(LoopOutcome {
            record: current,
            history,
        })
    }

    /// Evaluate independent drafts, at most `max_concurrent` at a time.
    /// Results keep input order.
    pub async fn run_many(
        &self,
        drafts: Vec<Draft>,
        max_concurrent: usize,
    ) -> Vec<Result<LoopOutcome, EvalError>> {
        stream::iter(drafts)
            .map(|draft| async move { self.run(&draft.title, &draft.body).await })
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }
}
