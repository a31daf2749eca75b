//! # Chainloom Core
//!
//! Domain types, traits, and error definitions for the Chainloom pipeline
//! and agent runtime. Every other crate in the workspace depends inward on
//! this one.
//!
//! ## Design Philosophy
//!
//! Each seam is a trait defined here:
//! - [`Reasoner`] is the opaque reasoning capability
//! - [`Tool`] is a string-in, string-out capability an agent may call
//! - [`SessionStore`] maps session ids to conversations
//!
//! Implementations live in their respective crates or in tests.

pub mod error;
pub mod message;
pub mod reasoner;
pub mod tool;
pub mod session;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{
    AgentError, Error, PipelineError, ReasonerError, Result, SessionError, TemplateError,
    ToolError,
};
pub use message::{Conversation, ConversationId, Message, Role, ToolInvocation};
pub use reasoner::{Reasoner, ReasoningRequest, ReasoningResponse, ToolDefinition};
pub use tool::{FnTool, Tool, ToolRegistry};
pub use session::{Session, SessionStore};
pub use agent::{AgentPhase, AgentState, StatePatch};
pub use event::{DomainEvent, EventBus};
