//! An agent used as a pipeline step.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use chainloom_core::message::Conversation;
use chainloom_core::session::SessionStore;
use chainloom_pipeline::Step;
use serde_json::Value;
use std::sync::Arc;
use crate::loop_runner::Agent;

/// Runs one agent turn per invocation.
///
/// A string input runs against a fresh conversation. An object
/// `{"input": ..., "session_id": ...}` runs against that session in the
/// attached store; without `session_id` it behaves like a string input.
/// The output is the final answer as a string.
pub struct AgentStep {
    name: String,
    agent: Arc<Agent>,
    store: Option<Arc<dyn SessionStore>>,
}

impl AgentStep {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            name: "agent".into(),
            agent,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    async fn ephemeral(&self, input: &str) -> Result<Value, PipelineError> {
        let mut conversation = Conversation::new();
        let outcome = self.agent.run(&mut conversation, input).await?;
        Ok(Value::String(outcome.output))
    }
}

#[async_trait]
impl Step for AgentStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let map = match input {
            Value::String(text) => return self.ephemeral(&text).await,
            Value::Object(map) => map,
            other => {
                return Err(PipelineError::invalid_input(
                    &self.name,
                    "string or object",
                    &other,
                ))
            }
        };

        let text = match map.get("input") {
            Some(Value::String(text)) => text.as_str(),
            Some(other) => return Err(PipelineError::invalid_input(&self.name, "string", other)),
            None => return Err(PipelineError::missing_key(&self.name, "input")),
        };

        match map.get("session_id").and_then(Value::as_str) {
            None => self.ephemeral(text).await,
            Some(session_id) => {
                let store = self.store.as_ref().ok_or_else(|| {
                    PipelineError::step(&self.name, "session_id given but no session store attached")
                })?;
                let outcome = self.agent.invoke(store.as_ref(), session_id, text).await?;
                Ok(Value::String(outcome.output))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedReasoner;
    use chainloom_core::error::AgentError;
    use chainloom_core::tool::ToolRegistry;
    use chainloom_memory::InMemorySessionStore;
    use chainloom_pipeline::{FnStep, StepExt};
    use serde_json::json;

    fn agent(answers: &[&str]) -> Arc<Agent> {
        Arc::new(Agent::new(
            Arc::new(ScriptedReasoner::finals(answers)),
            Arc::new(ToolRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn string_input_runs_ephemeral_turn() {
        let step = AgentStep::new(agent(&["hello back"]));
        assert_eq!(step.invoke(json!("hello")).await.unwrap(), json!("hello back"));
    }

    #[tokio::test]
    async fn session_input_uses_store() {
        let store = Arc::new(InMemorySessionStore::new());
        let step = AgentStep::new(agent(&["a", "b"])).with_store(store.clone());

        step.invoke(json!({"input": "one", "session_id": "u1"}))
            .await
            .unwrap();
        let out = step
            .invoke(json!({"input": "two", "session_id": "u1"}))
            .await
            .unwrap();

        assert_eq!(out, json!("b"));
        assert_eq!(store.get("u1").await.len().await, 4);
    }

    #[tokio::test]
    async fn session_without_store_fails() {
        let step = AgentStep::new(agent(&["x"]));
        let err = step
            .invoke(json!({"input": "hi", "session_id": "u1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { .. }));
    }

    #[tokio::test]
    async fn missing_input_key() {
        let step = AgentStep::new(agent(&["x"]));
        let err = step.invoke(json!({"question": "hi"})).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingKey { ref key, .. } if key == "input"));
    }

    #[tokio::test]
    async fn agent_errors_surface_as_pipeline_errors() {
        let step = AgentStep::new(agent(&[]));
        let err = step.invoke(json!("hi")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Agent(ref e) if matches!(**e, AgentError::Reasoner(_))));
    }

    #[tokio::test]
    async fn composes_with_other_steps() {
        let upper = FnStep::map("upper", |v| json!(v.as_str().unwrap_or_default().to_uppercase()));
        let chain = AgentStep::new(agent(&["done"])).pipe(upper);
        assert_eq!(chain.invoke(json!("go")).await.unwrap(), json!("DONE"));
    }
}
