//! Agent state types shared by the loop and its middleware.

use serde::{Deserialize, Serialize};
use crate::message::{Conversation, Message};

/// Phase of the agent loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Waiting on the reasoner
    AwaitingReasoning,
    /// A tool was requested and is being run
    AwaitingToolResult,
    /// A final answer was produced
    Done,
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentPhase::AwaitingReasoning => "awaiting_reasoning",
            AgentPhase::AwaitingToolResult => "awaiting_tool_result",
            AgentPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Runtime state of one agent turn.
///
/// The conversation is the session's history; the system prompt is kept
/// apart and prepended to every reasoning request.
#[derive(Debug, Clone)]
pub struct AgentState {
    /// Session history including the current user input
    pub conversation: Conversation,

    /// System instruction for this agent
    pub system_prompt: Option<String>,

    /// Set once a final answer has been produced
    pub terminal: bool,

    /// Scratch space written by middleware patches
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AgentState {
    pub fn new(conversation: Conversation, system_prompt: Option<String>) -> Self {
        Self {
            conversation,
            system_prompt,
            terminal: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// The messages sent to the reasoner: system instruction, then history.
    pub fn context_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.conversation.messages().iter().cloned());
        messages
    }

    /// Merge a middleware patch into this state.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(messages) = patch.messages {
            self.conversation.replace_messages(messages);
        }
        self.metadata.extend(patch.metadata);
    }
}

/// A partial update returned by a middleware hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    /// Replacement for the whole conversation history
    pub messages: Option<Vec<Message>>,

    /// Keys merged into [`AgentState::metadata`]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StatePatch {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn metadata(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert(key.into(), value);
        Self {
            messages: None,
            metadata,
        }
    }
}
