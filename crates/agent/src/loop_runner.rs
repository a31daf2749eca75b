//! The agent turn loop.
//!
//! One turn appends the user input, then alternates between asking the
//! reasoner what to do and running the tool it names, until the reasoner
//! produces a final answer:
//!
//! ```text
//! AwaitingReasoning ──tool call──▶ AwaitingToolResult
//!        ▲                                 │
//!        └─────────── tool result ─────────┘
//! AwaitingReasoning ──final text──▶ Done
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use chainloom_config::AppConfig;
use chainloom_core::agent::{AgentPhase, AgentState};
use chainloom_core::error::AgentError;
use chainloom_core::event::{DomainEvent, EventBus};
use chainloom_core::message::{Conversation, Message, ToolInvocation};
use chainloom_core::reasoner::{Reasoner, ReasoningRequest, ReasoningResponse};
use chainloom_core::session::SessionStore;
use chainloom_core::tool::ToolRegistry;
use tracing::{debug, info, warn};
use crate::middleware::{
    LoggingMiddleware, Middleware, MiddlewareChain, RedactionMiddleware, RetryMiddleware,
    SummarizationMiddleware,
};

/// Default cap on tool invocations per turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// What a completed turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutcome {
    /// The final answer
    pub output: String,

    /// Every phase entered, in order
    pub transitions: Vec<AgentPhase>,

    /// Tools invoked during the turn
    pub tool_calls: u32,

    /// Reasoning calls made during the turn
    pub reasoning_calls: u32,
}

/// A reasoner, a set of tools and a middleware chain, fixed at construction.
pub struct Agent {
    /// Decides the next action
    reasoner: Arc<dyn Reasoner>,

    /// Tools the reasoner may call
    tools: Arc<ToolRegistry>,

    /// Interceptors around every reasoning call
    middleware: MiddlewareChain,

    /// Prepended to every request, never stored
    system_prompt: Option<String>,

    /// Maximum tool invocations per turn
    max_iterations: u32,

    reasoning_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,

    /// Optional observer for phase changes and tool runs
    event_bus: Option<Arc<EventBus>>,
}

impl Agent {
    pub fn new(reasoner: Arc<dyn Reasoner>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            reasoner,
            tools,
            middleware: MiddlewareChain::new(),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            reasoning_timeout: None,
            tool_timeout: None,
            event_bus: None,
        }
    }

    /// Build an agent with the middleware stack described by `config`.
    ///
    /// Logging is always installed. Redaction, summarization and retry are
    /// added in that order when enabled; the summarizer is the agent's own
    /// reasoner.
    pub fn from_config(
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Result<Self, AgentError> {
        let mut agent = Self::new(reasoner.clone(), tools)
            .with_system_prompt(config.agent.system_prompt.clone())
            .with_max_iterations(config.agent.max_iterations)
            .with_middleware(Arc::new(LoggingMiddleware));

        if let Some(secs) = config.agent.reasoning_timeout_secs {
            agent = agent.with_reasoning_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.agent.tool_timeout_secs {
            agent = agent.with_tool_timeout(Duration::from_secs(secs));
        }

        if config.redaction.enabled {
            let redaction = RedactionMiddleware::from_rules(&config.redaction.rules)
                .map_err(|e| AgentError::middleware("redaction", e.to_string()))?;
            agent = agent.with_middleware(Arc::new(redaction));
        }
        if config.summarization.enabled {
            let summarization = SummarizationMiddleware::new(
                reasoner,
                config.summarization.max_tokens_before_summary,
                config.summarization.messages_to_keep,
            )
            .with_prompt(&config.summarization.summary_prompt)?;
            agent = agent.with_middleware(Arc::new(summarization));
        }
        if config.retry.enabled {
            agent = agent.with_middleware(Arc::new(RetryMiddleware::new(
                config.retry.max_attempts,
                Duration::from_millis(config.retry.delay_ms),
            )));
        }

        Ok(agent)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the maximum number of tool invocations per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Append a middleware. Registration order is execution order.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout = Some(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Run one turn against the session `session_id` in `store`.
    ///
    /// The session is created on first use and stays locked for the whole
    /// turn, so concurrent turns on one session run one after the other.
    pub async fn invoke(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        input: &str,
    ) -> Result<AgentOutcome, AgentError> {
        let session = store.get(session_id).await;
        let mut conversation = session.lock().await;
        info!(session_id, store = store.name(), "Agent turn started");
        self.run(&mut conversation, input).await
    }

    /// Run one turn against a caller-owned conversation.
    ///
    /// On error the conversation keeps every message appended before the
    /// failure.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<AgentOutcome, AgentError> {
        conversation.push(Message::user(input));
        let result = {
            let mut turn = Turn::new(conversation, self.system_prompt.clone());
            self.drive(&mut turn.state).await
        };

        if let Err(e) = &result {
            warn!(conversation_id = %conversation.id, error = %e, "Agent turn failed");
            self.publish(DomainEvent::turn_failed(&conversation.id.to_string(), e));
        }
        result
    }

    async fn drive(&self, state: &mut AgentState) -> Result<AgentOutcome, AgentError> {
        let session_id = state.conversation.id.to_string();
        let definitions = self.tools.definitions();
        let mut outcome = AgentOutcome::default();
        self.enter(&session_id, AgentPhase::AwaitingReasoning, &mut outcome);

        loop {
            let before = state.conversation.len();
            self.middleware.before_model(state).await?;
            let after = state.conversation.len();
            if after < before {
                self.publish(DomainEvent::compacted(&session_id, before - after));
            }

            let request =
                ReasoningRequest::new(state.context_messages()).with_tools(definitions.clone());
            outcome.reasoning_calls += 1;
            let response = self
                .middleware
                .call_model(request, self.reasoner.as_ref(), self.reasoning_timeout)
                .await?;

            match &response {
                ReasoningResponse::Final { text } => {
                    state.conversation.push(Message::assistant(text.clone()));
                    state.terminal = true;
                    outcome.output = text.clone();
                    self.enter(&session_id, AgentPhase::Done, &mut outcome);
                    self.middleware.after_model(state, &response).await?;
                    info!(
                        conversation_id = %session_id,
                        tool_calls = outcome.tool_calls,
                        reasoning_calls = outcome.reasoning_calls,
                        "Agent turn complete"
                    );
                    return Ok(outcome);
                }
                ReasoningResponse::ToolCall { name, input } => {
                    self.middleware.after_model(state, &response).await?;
                    if outcome.tool_calls >= self.max_iterations {
                        warn!(
                            conversation_id = %session_id,
                            max_iterations = self.max_iterations,
                            tool = %name,
                            "Tool invocation cap reached"
                        );
                        return Err(AgentError::LoopExceeded {
                            max_iterations: self.max_iterations,
                        });
                    }
                    self.enter(&session_id, AgentPhase::AwaitingToolResult, &mut outcome);
                    self.execute_tool(state, ToolInvocation::new(name.clone(), input.clone()))
                        .await?;
                    outcome.tool_calls += 1;
                    self.enter(&session_id, AgentPhase::AwaitingReasoning, &mut outcome);
                }
            }
        }
    }

    /// Run one tool and record its result. Tool failures are folded into
    /// the conversation; an unknown tool or a timeout ends the turn.
    async fn execute_tool(
        &self,
        state: &mut AgentState,
        call: ToolInvocation,
    ) -> Result<(), AgentError> {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Reasoner requested an unknown tool");
            let name = call.name.clone();
            state
                .conversation
                .push(Message::tool_result(call, format!("Error: unknown tool '{name}'")));
            return Err(AgentError::UnknownTool { name });
        };

        debug!(tool = %call.name, input = %call.input, "Executing tool");
        let start = Instant::now();
        let result = match self.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.call(&call.input)).await {
                Ok(result) => result,
                Err(_) => {
                    let after_ms = limit.as_millis() as u64;
                    self.tool_executed(state, &call.name, false, after_ms);
                    let operation = format!("tool '{}'", call.name);
                    state.conversation.push(Message::tool_result(
                        call,
                        format!("Error: timed out after {after_ms}ms"),
                    ));
                    return Err(AgentError::Timeout { operation, after_ms });
                }
            },
            None => tool.call(&call.input).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        self.tool_executed(state, &call.name, result.is_ok(), duration_ms);

        let content = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("Error: {e}")
            }
        };
        state.conversation.push(Message::tool_result(call, content));
        Ok(())
    }

    fn enter(&self, session_id: &str, phase: AgentPhase, outcome: &mut AgentOutcome) {
        debug!(session_id, %phase, "Agent phase");
        outcome.transitions.push(phase);
        self.publish(DomainEvent::phase_changed(session_id, phase));
    }

    fn tool_executed(&self, state: &AgentState, tool: &str, success: bool, duration_ms: u64) {
        let session_id = state.conversation.id.to_string();
        self.publish(DomainEvent::tool_executed(&session_id, tool, success, duration_ms));
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Lends a caller's conversation to one turn's [`AgentState`].
///
/// The conversation goes back on drop, so a turn whose future is dropped
/// mid-flight (a timeout, a failed sibling branch) still leaves the session
/// with its id and every message committed so far.
struct Turn<'a> {
    owner: &'a mut Conversation,
    state: AgentState,
}

impl<'a> Turn<'a> {
    fn new(owner: &'a mut Conversation, system_prompt: Option<String>) -> Self {
        let conversation = std::mem::take(owner);
        Self {
            owner,
            state: AgentState::new(conversation, system_prompt),
        }
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        std::mem::swap(self.owner, &mut self.state.conversation);
    }
}
