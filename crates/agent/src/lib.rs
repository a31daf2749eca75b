//! The agent runtime.
//!
//! An [`Agent`] runs a bounded reason/act loop over a session's
//! conversation:
//!
//! 1. **Append** the user input to the conversation
//! 2. **Run pre-hooks** ([`middleware`]), which may rewrite the history
//! 3. **Ask the reasoner**, through the wrap chain, for the next action
//! 4. **If a tool call**: run the tool, append its result, go back to 2
//! 5. **If a final answer**: append it, run post-hooks, return
//!
//! The loop stops at the final answer, an unknown tool, a timeout, or
//! when the tool invocation cap is hit.

pub mod loop_runner;
pub mod middleware;
pub mod step;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{Agent, AgentOutcome, DEFAULT_MAX_ITERATIONS};
pub use middleware::{
    CacheMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, Next, RedactionMiddleware,
    RetryMiddleware, SummarizationMiddleware,
};
pub use step::AgentStep;
