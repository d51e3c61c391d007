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

//! Record sinks: where finished evaluations go

use crate::regeneration::LoopOutcome;
use crate::EvalError;
use async_trait::async_trait;
use medicontent_core::EvaluationRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// Receives one outcome per completed evaluation
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, outcome: &LoopOutcome) -> Result<(), EvalError>;
}

/// Row of the UI checklist file
#[derive(Debug, Serialize)]
struct UiChecklistRow<'a> {
    name: &'a str,
    threshold: u8,
    final_score: u8,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct PatchedContent<'a> {
    title: &'a str,
    content: &'a str,
}

/// Writes timestamped JSON files into a log directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
    ui_checklist: bool,
    write_patched: bool,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ui_checklist: true,
            write_patched: true,
        }
    }

    pub fn with_ui_checklist(mut self, enabled: bool) -> Self {
        self.ui_checklist = enabled;
        self
    }

    pub fn with_patched_content(mut self, enabled: bool) -> Self {
        self.write_patched = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every file for one outcome and return their paths, the
    /// evaluation file first
    pub async fn write(&self, outcome: &LoopOutcome) -> Result<Vec<PathBuf>, EvalError> {
        let record = &outcome.record;
        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp = self.free_stamp(record).await?;

        let mut written = Vec::new();
        let evaluation = self.dir.join(format!("{stamp}_evaluation.json"));
        write_json(&evaluation, record).await?;
        written.push(evaluation);

        if self.ui_checklist {
            let rows: Vec<UiChecklistRow<'_>> = record
                .by_item
                .iter()
                .map(|item| UiChecklistRow {
                    name: &item.name,
                    threshold: item.threshold,
                    final_score: item.final_score,
                    passed: item.passed,
                })
                .collect();
            let path = self.dir.join(format!(
                "{stamp}_{}_ui_checklist.json",
                record.mode.file_label()
            ));
            write_json(&path, &rows).await?;
            written.push(path);
        }

        if self.write_patched && outcome.patched() {
            let path = self.dir.join(format!("{stamp}_content.patched.json"));
            let content = PatchedContent {
                title: &record.title,
                content: &record.body,
            };
            write_json(&path, &content).await?;
            written.push(path);
        }

        info!(dir = %self.dir.display(), files = written.len(), "evaluation written");
        Ok(written)
    }

    /// Timestamp prefix not yet used in the directory
    async fn free_stamp(&self, record: &EvaluationRecord) -> Result<String, EvalError> {
        let base = record.evaluated_at.format("%Y%m%d_%H%M%S").to_string();
        let mut stamp = base.clone();
        let mut n = 1;
        while tokio::fs::try_exists(self.dir.join(format!("{stamp}_evaluation.json"))).await? {
            stamp = format!("{base}_{n}");
            n += 1;
        }
        Ok(stamp)
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EvalError> {
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| EvalError::Sink(format!("{}: {e}", path.display())))
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn emit(&self, outcome: &LoopOutcome) -> Result<(), EvalError> {
        self.write(outcome).await.map(|_| ())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EvaluationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<EvaluationRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, outcome: &LoopOutcome) -> Result<(), EvalError> {
        self.records.lock().await.push(outcome.record.clone());
        Ok(())
    }
}
