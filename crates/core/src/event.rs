//! Agent lifecycle events — the externally consumable output of a turn.
//!
//! Every state transition in the turn loop yields exactly one typed event,
//! in strict order. Two categories exist: UI-facing events are forwarded
//! verbatim to the transport layer, while `db_save` events are consumed only
//! by the collaborator that writes messages — the orchestrator itself never
//! touches the store.

use serde::{Deserialize, Serialize};

use crate::message::StoredRole;

/// Events emitted by the turn loop, in the order the state machine produces
/// them: response text/thinking, then per-tool request/result/image, then a
/// terminal marker (or a single error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Assistant text from the model response.
    Text { content: String },

    /// Reasoning text from the model response.
    Thinking { content: String },

    /// The model requested a tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool invocation completed.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },

    /// A tool produced a screenshot.
    Image { tool_use_id: String, data: String },

    /// Terminal failure for the current utterance.
    Error { content: String },

    /// A turn is ready to be persisted. Consumed by the transport layer's
    /// persistence hook, never forwarded to clients.
    DbSave { role: StoredRole, content: String },

    /// Terminal marker: the loop reached its final state for this utterance.
    Done,
}

impl AgentEvent {
    /// The `type` discriminator, useful for logging and SSE event names.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Image { .. } => "image",
            Self::Error { .. } => "error",
            Self::DbSave { .. } => "db_save",
            Self::Done => "done",
        }
    }

    /// Whether this event is consumed by the persistence hook rather than
    /// forwarded to the client.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::DbSave { .. })
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_type_discriminator() {
        let event = AgentEvent::ToolUse {
            id: "toolu_1".into(),
            name: "bash".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_use""#));
        assert!(json.contains(r#""name":"bash""#));
    }

    #[test]
    fn db_save_is_persistence_facing() {
        let event = AgentEvent::DbSave {
            role: StoredRole::Assistant,
            content: "[]".into(),
        };
        assert!(event.is_persistence());
        assert!(!AgentEvent::Done.is_persistence());
    }

    #[test]
    fn terminal_events() {
        assert!(AgentEvent::Done.is_terminal());
        assert!(AgentEvent::Error {
            content: "x".into()
        }
        .is_terminal());
        assert!(!AgentEvent::Text {
            content: "x".into()
        }
        .is_terminal());
    }

    #[test]
    fn db_save_role_serializes_lowercase() {
        let event = AgentEvent::DbSave {
            role: StoredRole::Tool,
            content: "[]".into(),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["role"], "tool");
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"text","content":"hi"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AgentEvent::Text {
                content: "hi".into()
            }
        );
    }
}
