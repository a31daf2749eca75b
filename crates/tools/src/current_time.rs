//! Local wall-clock time.

use async_trait::async_trait;
use chainloom_core::error::ToolError;
use chainloom_core::tool::Tool;
use chrono::Local;

/// Reports the local date and time. Input is ignored.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time. Takes no input."
    }

    async fn call(&self, _input: &str) -> Result<String, ToolError> {
        Ok(format!(
            "Current time: {}.",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn formats_timestamp() {
        let out = CurrentTimeTool.call("").await.unwrap();
        let stamp = out
            .strip_prefix("Current time: ")
            .and_then(|s| s.strip_suffix('.'))
            .unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
