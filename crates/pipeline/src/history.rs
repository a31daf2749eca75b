//! Session history wrapper for chat pipelines.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use chainloom_core::message::Message;
use chainloom_core::session::SessionStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use crate::parser::text_of;
use crate::step::Step;

/// Runs a chat pipeline with the history of one session.
///
/// The input must be an object with `session_id` and the configured input
/// key. The session's messages are injected under the history key, the
/// inner step runs, then the user input and the reply are appended to the
/// session. The session stays locked for the whole call, so concurrent
/// calls on one session are serialized.
pub struct WithMessageHistory {
    name: String,
    inner: Arc<dyn Step>,
    store: Arc<dyn SessionStore>,
    input_key: String,
    history_key: String,
}

impl WithMessageHistory {
    pub fn new<S: Step + 'static>(inner: S, store: Arc<dyn SessionStore>) -> Self {
        Self {
            name: format!("with_history({})", inner.name()),
            inner: Arc::new(inner),
            store,
            input_key: "input".into(),
            history_key: "history".into(),
        }
    }

    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn history_key(mut self, key: impl Into<String>) -> Self {
        self.history_key = key.into();
        self
    }

    fn string_field(&self, vars: &Map<String, Value>, key: &str) -> Result<String, PipelineError> {
        vars.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::missing_key(&self.name, key))
    }
}

#[async_trait]
impl Step for WithMessageHistory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let Value::Object(mut vars) = input else {
            return Err(PipelineError::invalid_input(&self.name, "object", &input));
        };
        let session_id = self.string_field(&vars, "session_id")?;
        let text = self.string_field(&vars, &self.input_key)?;

        let session = self.store.get(&session_id).await;
        let mut conversation = session.lock().await;
        debug!(session_id = %session_id, history = conversation.len(), "Injecting history");

        let history = serde_json::to_value(conversation.messages())
            .map_err(|e| PipelineError::step(&self.name, e.to_string()))?;
        vars.insert(self.history_key.clone(), history);

        let output = self.inner.invoke(Value::Object(vars)).await?;
        let reply = text_of(&self.name, &output)?;

        conversation.push(Message::user(text));
        conversation.push(Message::assistant(reply));
        Ok(output)
    }
}
