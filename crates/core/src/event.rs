//! Domain events published by the agent loop.
//!
//! Observers (the CLI's event logger, tests) subscribe to an [`EventBus`]
//! and never influence the turn they watch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::agent::AgentPhase;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    PhaseChanged {
        session_id: String,
        phase: AgentPhase,
        at: DateTime<Utc>,
    },

    ToolExecuted {
        session_id: String,
        tool: String,
        success: bool,
        duration_ms: u64,
        at: DateTime<Utc>,
    },

    /// Pre-hooks left the conversation shorter than they found it.
    ConversationCompacted {
        session_id: String,
        removed: usize,
        at: DateTime<Utc>,
    },

    TurnFailed {
        session_id: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn phase_changed(session_id: &str, phase: AgentPhase) -> Self {
        Self::PhaseChanged {
            session_id: session_id.to_string(),
            phase,
            at: Utc::now(),
        }
    }

    pub fn tool_executed(session_id: &str, tool: &str, success: bool, duration_ms: u64) -> Self {
        Self::ToolExecuted {
            session_id: session_id.to_string(),
            tool: tool.to_string(),
            success,
            duration_ms,
            at: Utc::now(),
        }
    }

    pub fn compacted(session_id: &str, removed: usize) -> Self {
        Self::ConversationCompacted {
            session_id: session_id.to_string(),
            removed,
            at: Utc::now(),
        }
    }

    pub fn turn_failed(session_id: &str, error: impl ToString) -> Self {
        Self::TurnFailed {
            session_id: session_id.to_string(),
            error: error.to_string(),
            at: Utc::now(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::ConversationCompacted { .. } => "conversation_compacted",
            Self::TurnFailed { .. } => "turn_failed",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::PhaseChanged { session_id, .. }
            | Self::ToolExecuted { session_id, .. }
            | Self::ConversationCompacted { session_id, .. }
            | Self::TurnFailed { session_id, .. } => session_id,
        }
    }
}

/// Fan-out of [`DomainEvent`]s over a `tokio::sync::broadcast` channel.
/// Slow subscribers lag and lose the oldest events; publishing never blocks.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(DomainEvent::phase_changed("s1", AgentPhase::Done));

        for rx in [&mut first, &mut second] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.kind(), "phase_changed");
            assert_eq!(event.session_id(), "s1");
            assert!(matches!(
                event.as_ref(),
                DomainEvent::PhaseChanged { phase: AgentPhase::Done, .. }
            ));
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.publish(DomainEvent::turn_failed("s1", "boom"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn serializes_with_a_type_tag() {
        let json = serde_json::to_value(DomainEvent::tool_executed("s1", "current_time", true, 3))
            .unwrap();
        assert_eq!(json["type"], "tool_executed");
        assert_eq!(json["tool"], "current_time");
    }
}
