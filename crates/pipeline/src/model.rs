//! Model step: a reasoner used as a plain pipeline step.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use chainloom_core::message::Message;
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use crate::prompt::messages_from_value;
use crate::step::Step;

/// Sends a prompt to a reasoner and returns the assistant message.
///
/// Accepts a string (sent as one user message), an array of messages, or
/// an object with a `messages` array. Tool calls are rejected: tools are
/// only available inside an agent.
pub struct ModelStep {
    name: String,
    reasoner: Arc<dyn Reasoner>,
}

impl ModelStep {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            name: format!("model({})", reasoner.name()),
            reasoner,
        }
    }

    fn messages(&self, input: &Value) -> Result<Vec<Message>, PipelineError> {
        let messages = match input {
            Value::String(text) => Some(vec![Message::user(text.clone())]),
            Value::Array(_) => messages_from_value(input),
            Value::Object(map) => map.get("messages").and_then(messages_from_value),
            _ => None,
        };
        messages.ok_or_else(|| PipelineError::invalid_input(&self.name, "prompt or messages", input))
    }
}

#[async_trait]
impl Step for ModelStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let messages = self.messages(&input)?;
        debug!(step = %self.name, messages = messages.len(), "Calling reasoner");

        match self.reasoner.reason(ReasoningRequest::new(messages)).await? {
            ReasoningResponse::Final { text } => serde_json::to_value(Message::assistant(text))
                .map_err(|e| PipelineError::step(&self.name, e.to_string())),
            ReasoningResponse::ToolCall { name, .. } => Err(PipelineError::step(
                &self.name,
                format!("reasoner requested tool '{name}' outside an agent"),
            )),
        }
    }
}
