//! Model provider trait — the abstraction over the hosted model API.
//!
//! A provider knows how to send the full turn history (plus system
//! instructions, tool schemas, and feature flags) and return the model's
//! content-block sequence. The turn loop calls `send()` without knowing
//! which backend is configured — which is also what makes the loop testable
//! with scripted doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::error::ProviderError;
use crate::message::Turn;

/// One model call's worth of request state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g. "claude-sonnet-4-20250514").
    pub model: String,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// The ordered turn history, newest last.
    pub turns: Vec<Turn>,

    /// System instructions, sent as a top-level field.
    pub system: String,

    /// Provider-facing tool schemas for the active version group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_schemas: Vec<serde_json::Value>,

    /// Beta feature flags required to unlock the tool schemas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub betas: Vec<String>,
}

/// A complete response from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The ordered content blocks the model returned.
    pub content: Vec<ContentBlock>,

    /// Why generation stopped ("end_turn", "tool_use", ...).
    #[serde(default)]
    pub stop_reason: Option<String>,

    /// Token usage, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The model provider contract.
///
/// Exactly one call may be outstanding per session; the turn loop enforces
/// that by being single-flow-of-control.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Send a request and await the complete response. Failures are
    /// classified by [`ProviderError`] and are terminal for the current
    /// user utterance.
    async fn send(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_turns_in_wire_shape() {
        let request = ModelRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            turns: vec![Turn::user_text("hello")],
            system: "be helpful".into(),
            tool_schemas: vec![serde_json::json!({"type": "bash_20250124", "name": "bash"})],
            betas: vec!["computer-use-2025-01-24".into()],
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["turns"][0]["content"], "hello");
        assert_eq!(v["tool_schemas"][0]["name"], "bash");
    }

    #[test]
    fn empty_flags_are_omitted() {
        let request = ModelRequest {
            model: "m".into(),
            max_tokens: 1,
            turns: vec![],
            system: String::new(),
            tool_schemas: vec![],
            betas: vec![],
        };
        let v = serde_json::to_value(&request).unwrap();
        assert!(v.get("betas").is_none());
        assert!(v.get("tool_schemas").is_none());
    }
}
