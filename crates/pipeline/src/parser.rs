//! Output parsers: turn model text into structured values.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use serde_json::Value;
use tokio::sync::mpsc;
use crate::step::{Step, StepStream};

/// Parses raw text into a value.
pub trait OutputParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Value, PipelineError>;
}

/// Extract text from a step input: a string, or an object carrying a
/// string `content` field (an assistant message).
pub fn text_of(step: &str, value: &Value) -> Result<String, PipelineError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::missing_key(step, "content")),
        other => Err(PipelineError::invalid_input(step, "string or message", other)),
    }
}

/// Passes the text through as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl OutputParser for StrOutputParser {
    fn parse(&self, text: &str) -> Result<Value, PipelineError> {
        Ok(Value::String(text.to_string()))
    }
}

#[async_trait]
impl Step for StrOutputParser {
    fn name(&self) -> &str {
        "str_output_parser"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        self.parse(&text_of(self.name(), &input)?)
    }
}

/// Parses JSON, tolerating a surrounding Markdown code fence.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutputParser;

impl JsonOutputParser {
    fn strip_fence(text: &str) -> &str {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        // Drop the info string ("json") on the opening fence line.
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        body.trim_end().strip_suffix("```").unwrap_or(body).trim()
    }
}

impl OutputParser for JsonOutputParser {
    fn parse(&self, text: &str) -> Result<Value, PipelineError> {
        serde_json::from_str(Self::strip_fence(text)).map_err(|e| PipelineError::Parse {
            parser: "json_output_parser".into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Step for JsonOutputParser {
    fn name(&self) -> &str {
        "json_output_parser"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        self.parse(&text_of(self.name(), &input)?)
    }
}

/// Splits `a, b, c` into `["a", "b", "c"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommaSeparatedListOutputParser;

impl CommaSeparatedListOutputParser {
    fn items(text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl OutputParser for CommaSeparatedListOutputParser {
    fn parse(&self, text: &str) -> Result<Value, PipelineError> {
        Ok(Value::Array(Self::items(text).into_iter().map(Value::String).collect()))
    }
}

#[async_trait]
impl Step for CommaSeparatedListOutputParser {
    fn name(&self) -> &str {
        "comma_separated_list_parser"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        self.parse(&text_of(self.name(), &input)?)
    }

    /// Emits each list item as its own chunk.
    async fn stream(&self, input: Value) -> Result<StepStream, PipelineError> {
        let items = Self::items(&text_of(self.name(), &input)?);
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            let _ = tx.send(Ok(Value::String(item))).await;
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn str_parser_reads_message_content() {
        let message = json!({"role": "assistant", "content": "Bonjour"});
        assert_eq!(StrOutputParser.invoke(message).await.unwrap(), json!("Bonjour"));
        assert_eq!(StrOutputParser.invoke(json!("plain")).await.unwrap(), json!("plain"));
        assert!(StrOutputParser.invoke(json!(3)).await.is_err());
    }

    #[test]
    fn json_parser_strips_code_fence() {
        let text = "```json\n{\"order_id\": \"ORD1234567890\"}\n```";
        let value = JsonOutputParser.parse(text).unwrap();
        assert_eq!(value, json!({"order_id": "ORD1234567890"}));
    }

    #[test]
    fn json_parser_plain_and_invalid() {
        assert_eq!(JsonOutputParser.parse(" [1, 2] ").unwrap(), json!([1, 2]));
        let err = JsonOutputParser.parse("not json").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn list_parser_splits_and_trims() {
        let value = CommaSeparatedListOutputParser.parse("red, green ,blue,").unwrap();
        assert_eq!(value, json!(["red", "green", "blue"]));
    }

    #[tokio::test]
    async fn list_parser_streams_items() {
        let mut rx = CommaSeparatedListOutputParser.stream(json!("a, b")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), json!("a"));
        assert_eq!(rx.recv().await.unwrap().unwrap(), json!("b"));
        assert!(rx.recv().await.is_none());
    }
}
