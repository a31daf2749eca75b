//! Reasoner trait: the abstraction over the external reasoning capability.
//!
//! A Reasoner receives the ordered conversation plus the available tool
//! definitions and answers with either a final text or a request to call
//! one tool with a single string input. Concrete LLM backends live outside
//! this workspace; tests and the CLI use scripted implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ReasonerError;
use crate::message::Message;

/// A tool definition sent to the reasoner so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,
}

/// The outbound request handed to a reasoner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// The conversation messages, system instruction first
    pub messages: Vec<Message>,

    /// Available tools the reasoner can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ReasoningRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
    }
}

/// What the reasoner decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningResponse {
    /// No tool call: `text` is the answer.
    Final { text: String },

    /// Invoke the named tool with `input`.
    ToolCall { name: String, input: String },
}

impl ReasoningResponse {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self::Final { text: text.into() }
    }

    pub fn tool_call(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self::ToolCall {
            name: name.into(),
            input: input.into(),
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// The reasoning capability consumed by agents and model steps.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Reasoner name (e.g. "scripted", "keyword").
    fn name(&self) -> &str;

    /// Decide the next action for the given conversation.
    async fn reason(
        &self,
        request: ReasoningRequest,
    ) -> std::result::Result<ReasoningResponse, ReasonerError>;
}
