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

//! Engine configuration
//!
//! Loaded with priority file > environment > defaults.

use crate::error::{CoreError, Result};
use crate::mode::EvalMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for an evaluation run
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// LLM backend used for judging and patch generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl std::str::FromStr for LlmProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            other => Err(CoreError::InvalidConfig(format!("unknown LLM provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; usually supplied through the environment instead of the file
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Override for OpenAI-compatible gateways
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub mode: EvalMode,

    /// Threshold profile name; the mode's default profile when unset
    #[serde(default)]
    pub profile: Option<String>,

    /// Maximum number of scored states per evaluation
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,

    /// Skip the interactive confirmation before patching
    #[serde(default)]
    pub auto_yes: bool,

    /// Upper bound on drafts evaluated concurrently in batch mode
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesConfig {
    /// TOML checklist table (`[[items]] id, name, notes`)
    #[serde(default)]
    pub checklist_path: Option<PathBuf>,

    /// Markdown report holding the priority weight table
    #[serde(default)]
    pub weights_path: Option<PathBuf>,

    /// JSON threshold profiles
    #[serde(default)]
    pub criteria_path: Option<PathBuf>,

    /// Directory with prompt template overrides
    #[serde(default)]
    pub prompt_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Also write the flattened UI checklist file
    #[serde(default = "default_true")]
    pub ui_checklist: bool,

    /// Write the patched title/body when regeneration happened
    #[serde(default = "default_true")]
    pub write_patched: bool,
}

// Default values
fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}

fn default_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_loops() -> u32 {
    2
}

fn default_max_concurrent() -> usize {
    4
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./medicontent-logs")
}

fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            temperature: 0.0,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            mode: EvalMode::default(),
            profile: None,
            max_loops: default_max_loops(),
            auto_yes: false,
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            ui_checklist: true,
            write_patched: true,
        }
    }
}

impl EvaluationConfig {
    /// Profile to evaluate against, falling back to the mode default
    pub fn profile_name(&self) -> &str {
        self.profile
            .as_deref()
            .unwrap_or_else(|| self.mode.default_profile())
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: file > env > defaults
    ///
    /// Supported environment variables:
    /// - MEDICONTENT_PROVIDER: `openai` or `gemini`
    /// - MEDICONTENT_MODEL: model name
    /// - MEDICONTENT_BASE_URL: API base URL override
    /// - MEDICONTENT_MAX_LOOPS: maximum scored states per evaluation
    /// - MEDICONTENT_PROFILE: threshold profile name
    /// - MEDICONTENT_LOG_DIR: output directory
    /// - GEMINI_API_KEY / OPENAI_API_KEY: API key for the selected provider
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    /// Apply environment overrides for variables that are explicitly set
    fn merge_with_env(mut config: Self) -> Self {
        if let Ok(provider) = std::env::var("MEDICONTENT_PROVIDER") {
            match provider.parse() {
                Ok(p) => config.llm.provider = p,
                Err(e) => tracing::warn!("Ignoring MEDICONTENT_PROVIDER: {}", e),
            }
        }

        if let Ok(model) = std::env::var("MEDICONTENT_MODEL") {
            config.llm.model = model;
        }

        if let Ok(base_url) = std::env::var("MEDICONTENT_BASE_URL") {
            config.llm.base_url = Some(base_url);
        }

        if let Ok(loops) = std::env::var("MEDICONTENT_MAX_LOOPS") {
            if let Ok(val) = loops.parse() {
                config.evaluation.max_loops = val;
            }
        }

        if let Ok(profile) = std::env::var("MEDICONTENT_PROFILE") {
            config.evaluation.profile = Some(profile);
        }

        if let Ok(dir) = std::env::var("MEDICONTENT_LOG_DIR") {
            config.output.log_dir = PathBuf::from(dir);
        }

        if config.llm.api_key.is_none() {
            let key_var = match config.llm.provider {
                LlmProvider::Gemini => "GEMINI_API_KEY",
                LlmProvider::OpenAi => "OPENAI_API_KEY",
            };
            config.llm.api_key = std::env::var(key_var).ok();
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.max_loops == 0 {
            return Err(CoreError::InvalidConfig(
                "evaluation.max_loops must be at least 1".to_string(),
            ));
        }

        if self.evaluation.max_concurrent == 0 {
            return Err(CoreError::InvalidConfig(
                "evaluation.max_concurrent must be at least 1".to_string(),
            ));
        }

        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(CoreError::InvalidConfig(format!(
                "no API key configured for provider {:?}",
                self.llm.provider
            )));
        }

        Ok(())
    }
}
