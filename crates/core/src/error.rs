//! Error types for the Chainloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Chainloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Pipeline errors ---
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Reasoner errors ---
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by the external reasoning capability.
#[derive(Debug, Clone, Error)]
pub enum ReasonerError {
    #[error("Reasoner unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid reasoner response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Reasoner request timed out: {0}")]
    Timeout(String),
}

impl ReasonerError {
    /// Whether a retry middleware may re-issue the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    DuplicateName(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    #[error("Malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },
}

/// Failures of a pipeline step. A sequence propagates the first of these
/// unchanged; a parallel step wraps it with the failing branch name.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Parallel branch '{branch}' failed: {source}")]
    BranchFailed {
        branch: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Step '{step}' expected {expected}, got {found}")]
    InvalidInput {
        step: String,
        expected: String,
        found: String,
    },

    #[error("Step '{step}' missing key '{key}'")]
    MissingKey { step: String, key: String },

    #[error("Duplicate branch name: {0}")]
    DuplicateBranch(String),

    #[error("Pipeline '{0}' has no steps")]
    Empty(String),

    #[error("Parser '{parser}' failed: {reason}")]
    Parse { parser: String, reason: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Agent(Box<AgentError>),
}

impl PipelineError {
    /// A leaf step failure.
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_key(step: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            step: step.into(),
            key: key.into(),
        }
    }

    pub fn invalid_input(
        step: impl Into<String>,
        expected: impl Into<String>,
        found: &serde_json::Value,
    ) -> Self {
        Self::InvalidInput {
            step: step.into(),
            expected: expected.into(),
            found: json_kind(found).to_string(),
        }
    }
}

/// Short name of a JSON value's kind, for error messages.
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<AgentError> for PipelineError {
    fn from(err: AgentError) -> Self {
        Self::Agent(Box::new(err))
    }
}

/// Failures of an agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown tool requested: {name}")]
    UnknownTool { name: String },

    #[error("Agent loop exceeded {max_iterations} tool round-trips")]
    LoopExceeded { max_iterations: u32 },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Middleware '{middleware}' failed: {reason}")]
    Middleware { middleware: String, reason: String },

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AgentError {
    pub fn middleware(middleware: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: middleware.into(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Reasoner(ReasonerError::Timeout(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "weather_lookup".into(),
            reason: "upstream offline".into(),
        });
        assert!(err.to_string().contains("weather_lookup"));
        assert!(err.to_string().contains("upstream offline"));
    }

    #[test]
    fn bounded_errors_lift_into_error() {
        fn fails() -> Result<()> {
            let step: std::result::Result<(), PipelineError> =
                Err(PipelineError::missing_key("report", "order_id"));
            step?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, Error::Pipeline(PipelineError::MissingKey { .. })));
        assert!(err.to_string().contains("order_id"));
    }

    #[test]
    fn branch_failure_keeps_source() {
        let err = PipelineError::BranchFailed {
            branch: "sentiment".into(),
            source: Box::new(PipelineError::StepFailed {
                step: "classify".into(),
                reason: "boom".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("sentiment"));
        assert!(text.contains("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn retryable_reasoner_errors() {
        assert!(ReasonerError::Unavailable("503".into()).is_retryable());
        assert!(ReasonerError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(!ReasonerError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn timeouts_are_distinguishable() {
        let err = AgentError::Timeout {
            operation: "reasoning".into(),
            after_ms: 50,
        };
        assert!(err.is_timeout());
        assert!(!AgentError::UnknownTool { name: "x".into() }.is_timeout());
    }
}
