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

//! Medicontent CLI
//!
//! Evaluates plain-text drafts against the compliance or SEO checklist and
//! writes the evaluation records as JSON.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use medicontent_core::{EngineConfig, EvalMode, EvaluationRecord};
use medicontent_evals::{
    AutoApprove, ContentEvaluator, Draft, JsonFileSink, LoopOutcome, PatternCache, ProceedGate,
    RegenerationLoop,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medicontent")]
#[command(about = "Medical-advertising compliance and SEO evaluator", long_about = None)]
struct Cli {
    /// Draft files: title on the first line, a blank line, then the body
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "MEDICONTENT_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluation mode: compliance or seo
    #[arg(short, long)]
    mode: Option<String>,

    /// Threshold profile (strict/standard/lenient, excellent/good/average)
    #[arg(short, long)]
    profile: Option<String>,

    /// Maximum scored states per draft, the first one included
    #[arg(long)]
    max_loops: Option<u32>,

    /// Apply patches without asking
    #[arg(short = 'y', long = "yes")]
    auto_yes: bool,

    /// Output directory for evaluation records
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the final records to stdout as JSON
    #[arg(long)]
    json: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

/// Asks on the terminal before each patch pass
struct TerminalGate;

/// Anything but an answer starting with "n" proceeds, including a bare Enter
fn accepts(answer: &str) -> bool {
    !answer.trim().to_lowercase().starts_with('n')
}

#[async_trait]
impl ProceedGate for TerminalGate {
    async fn proceed(&self, record: &EvaluationRecord) -> bool {
        let names = record.violation_names.join(", ");
        let prompt = format!(
            "[{} #{}] violations: {}\nregenerate? [Y/n] ",
            record.mode, record.iteration, names
        );

        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{prompt}");
            let _ = stderr.flush();
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map(|read| (read > 0).then_some(line))
        })
        .await;

        match answer {
            Ok(Ok(Some(line))) => accepts(&line),
            Ok(Ok(None)) => {
                warn!("stdin closed, not regenerating");
                false
            }
            Ok(Err(e)) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation task failed: {}", e);
                false
            }
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.clone()).context("Failed to load config")?;

    if let Some(mode) = &cli.mode {
        config.evaluation.mode = mode.parse::<EvalMode>()?;
    }
    if let Some(profile) = &cli.profile {
        config.evaluation.profile = Some(profile.clone());
    }
    if let Some(max_loops) = cli.max_loops {
        config.evaluation.max_loops = max_loops;
    }
    if cli.auto_yes {
        config.evaluation.auto_yes = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.log_dir = dir.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn report(outcome: &LoopOutcome, written: &[PathBuf]) {
    let record = &outcome.record;
    info!(
        title = %record.title,
        total = record.weighted_total,
        violations = ?record.violations,
        iterations = record.regen.iterations,
        "evaluation finished"
    );
    if let Some(fit) = &record.regen_fit {
        info!(
            score = fit.score_0_100,
            risk_reduction = fit.risk_reduction_rate,
            adherence = fit.guideline_adherence,
            flow = fit.flow_stability,
            "regeneration fit"
        );
    }
    for path in written {
        info!("Wrote {}", path.display());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = build_config(&cli)?;

    let drafts = cli
        .inputs
        .iter()
        .map(|path| {
            Draft::from_file(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let cache = PatternCache::default();
    let evaluator = ContentEvaluator::from_config(&config, &cache)
        .context("Failed to initialise evaluator")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let gate: Arc<dyn ProceedGate> = if config.evaluation.auto_yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalGate)
    };
    // Interactive confirmation cannot interleave prompts
    let concurrency = if config.evaluation.auto_yes {
        config.evaluation.max_concurrent
    } else {
        1
    };

    let driver = RegenerationLoop::new(Arc::new(evaluator), gate)
        .with_max_loops(config.evaluation.max_loops)
        .with_cancellation(cancel);

    let sink = JsonFileSink::new(&config.output.log_dir)
        .with_ui_checklist(config.output.ui_checklist)
        .with_patched_content(config.output.write_patched);

    let mut failures = 0usize;
    let mut records = Vec::new();
    for (path, result) in cli
        .inputs
        .iter()
        .zip(driver.run_many(drafts, concurrency).await)
    {
        match result {
            Ok(outcome) => {
                let written = sink
                    .write(&outcome)
                    .await
                    .with_context(|| format!("Failed to write records for {}", path.display()))?;
                report(&outcome, &written);
                records.push(outcome.record);
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }

    if failures > 0 {
        bail!("{} of {} evaluations failed", failures, cli.inputs.len());
    }
    Ok(())
}
