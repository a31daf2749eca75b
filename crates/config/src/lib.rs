//! Configuration loading, validation, and management for Chainloom.
//!
//! Loads configuration from `~/.chainloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chainloom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Conversation compaction
    #[serde(default)]
    pub summarization: SummarizationConfig,

    /// Sensitive data redaction before reasoning calls
    #[serde(default)]
    pub redaction: RedactionConfig,

    /// Retry of failed reasoning calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System instruction prepended to every reasoning request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum tool invocations per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Timeout for one reasoning call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_timeout_secs: Option<u64>,

    /// Timeout for one tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Use the available tools when they help answer the user.".into()
}
fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_iterations: default_max_iterations(),
            reasoning_timeout_secs: None,
            tool_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Estimated token count above which older messages are summarized
    #[serde(default = "default_max_tokens_before_summary")]
    pub max_tokens_before_summary: usize,

    /// Newest messages left untouched by compaction
    #[serde(default = "default_messages_to_keep")]
    pub messages_to_keep: usize,

    /// Prompt given to the summarizer; `{messages}` receives the transcript
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,
}

fn default_max_tokens_before_summary() -> usize {
    80
}
fn default_messages_to_keep() -> usize {
    1
}
fn default_summary_prompt() -> String {
    "Summarize the conversation below in a few sentences. Keep names, facts and open requests.\n\n{messages}".into()
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tokens_before_summary: default_max_tokens_before_summary(),
            messages_to_keep: default_messages_to_keep(),
            summary_prompt: default_summary_prompt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRuleConfig {
    /// Regular expression to match
    pub pattern: String,

    /// Replacement text
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_redaction_rules")]
    pub rules: Vec<RedactionRuleConfig>,
}

/// Email addresses and mainland China mobile numbers.
pub fn default_redaction_rules() -> Vec<RedactionRuleConfig> {
    vec![
        RedactionRuleConfig {
            pattern: r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+".into(),
            replacement: "[EMAIL]".into(),
        },
        RedactionRuleConfig {
            pattern: r"(\+86)?1[3-9]\d{9}".into(),
            replacement: "[PHONE]".into(),
        },
    ]
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: default_redaction_rules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Total attempts, first call included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Environment variable overrides:
    /// - `CHAINLOOM_SYSTEM_PROMPT`
    /// - `CHAINLOOM_MAX_ITERATIONS`
    /// - `CHAINLOOM_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prompt) = lookup("CHAINLOOM_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }

        if let Some(raw) = lookup("CHAINLOOM_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CHAINLOOM_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(level) = lookup("CHAINLOOM_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chainloom")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.summarization.messages_to_keep == 0 {
            return Err(ConfigError::ValidationError(
                "summarization.messages_to_keep must be at least 1".into(),
            ));
        }

        if !self.summarization.summary_prompt.contains("{messages}") {
            return Err(ConfigError::ValidationError(
                "summarization.summary_prompt must contain {messages}".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if let Some(rule) = self.redaction.rules.iter().find(|r| r.pattern.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "redaction rule with replacement '{}' has an empty pattern",
                rule.replacement
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
