//! Library half of the `chainloom` binary.
//!
//! Holds the pieces the subcommands share with the integration tests: the
//! offline keyword reasoner, the feedback triage pipeline and config
//! bootstrapping.

pub mod feedback;
pub mod keyword_reasoner;

use chainloom_config::{AppConfig, ConfigError};
use std::path::Path;

pub use feedback::{feedback_pipeline, render_report, triage};
pub use keyword_reasoner::KeywordReasoner;

/// Load the config from `path`, or from `~/.chainloom/config.toml` when no
/// path is given. Environment overrides apply in both cases.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse a `key=value` template variable.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(parse_var("a=b=c").unwrap(), ("a".into(), "b=c".into()));
        assert_eq!(parse_var("name=").unwrap(), ("name".into(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn explicit_missing_path_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.agent.max_iterations, 10);
    }
}
