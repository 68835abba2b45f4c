//! Tool capability trait — the uniform contract every tool satisfies.
//!
//! Tools are what give the agent the ability to act on the machine:
//! execute shell commands, edit files, drive the screen and mouse.
//! The turn loop knows nothing about a tool beyond this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The outcome of one tool invocation.
///
/// Produced exactly once per invocation and never retried by the core.
/// Execution failures are *captured* here (`error`), never raised past the
/// invoking loop — the provider protocol requires a result block for every
/// issued `tool_use`. `error` and `output` are not mutually exclusive: an
/// error may accompany partial output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Error text, if the invocation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Base64-encoded PNG screenshot, if the tool captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    /// A system-level note prepended to output/error when packaging the
    /// result block (e.g. truncation notices).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl ToolOutput {
    /// Successful text output.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// Failed invocation.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach a system note.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach a base64 PNG screenshot.
    pub fn with_image(mut self, data: impl Into<String>) -> Self {
        self.base64_image = Some(data.into());
        self
    }
}

/// The uniform capability contract.
///
/// `schema()` returns the provider-facing descriptor for this tool — for
/// computer-use tools that is a provider-defined typed schema such as
/// `{"type": "bash_20250124", "name": "bash"}` rather than a free-form JSON
/// Schema.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Unique name within a registry version (e.g. "bash", "computer").
    fn name(&self) -> &str;

    /// Provider-facing input-shape descriptor.
    fn schema(&self) -> serde_json::Value;

    /// Run the tool. May suspend. Must not panic or return early on
    /// execution failure — capture it in the output instead.
    async fn invoke(&self, input: serde_json::Value) -> ToolOutput;
}
