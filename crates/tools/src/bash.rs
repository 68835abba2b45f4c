//! Bash capability — shell execution for the model.
//!
//! One-shot `sh -c` with a timeout. Both stdout and stderr are reported and
//! clipped to the response cap; execution failures land in the output's
//! error field, never as a Rust error.

use async_trait::async_trait;
use deskclaw_core::tool::{ToolCapability, ToolOutput};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::groups::ToolVersion;
use crate::run::run_command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BashTool {
    version: ToolVersion,
    timeout: Duration,
}

impl BashTool {
    pub fn new(version: ToolVersion) -> Self {
        Self {
            version,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn schema_type(&self) -> &'static str {
        match self.version {
            ToolVersion::ComputerUse20241022 => "bash_20241022",
            ToolVersion::ComputerUse20250124 => "bash_20250124",
        }
    }
}

#[async_trait]
impl ToolCapability for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type(),
            "name": "bash",
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutput {
        if input.get("restart").and_then(Value::as_bool) == Some(true) {
            // Sessions are per-invocation here, so a restart is a no-op;
            // still acknowledge it the way the protocol expects.
            return ToolOutput::default().with_system("tool has been restarted.");
        }

        let Some(command) = input.get("command").and_then(Value::as_str) else {
            return ToolOutput::error("no command provided");
        };

        debug!(command, "Executing bash command");

        match run_command(command, self.timeout).await {
            Ok((_code, stdout, stderr)) => ToolOutput {
                output: (!stdout.is_empty()).then_some(stdout),
                error: (!stderr.is_empty()).then_some(stderr),
                base64_image: None,
                system: None,
            },
            Err(reason) => ToolOutput::error(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> BashTool {
        BashTool::new(ToolVersion::ComputerUse20250124)
    }

    #[tokio::test]
    async fn echo_captures_output() {
        let out = tool()
            .invoke(serde_json::json!({"command": "echo hello"}))
            .await;
        assert_eq!(out.output.as_deref().map(str::trim), Some("hello"));
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn stderr_lands_in_error_alongside_output() {
        let out = tool()
            .invoke(serde_json::json!({"command": "echo out; echo err >&2"}))
            .await;
        assert_eq!(out.output.as_deref().map(str::trim), Some("out"));
        assert_eq!(out.error.as_deref().map(str::trim), Some("err"));
    }

    #[tokio::test]
    async fn missing_command_is_an_error_output() {
        let out = tool().invoke(serde_json::json!({})).await;
        assert_eq!(out.error.as_deref(), Some("no command provided"));
    }

    #[tokio::test]
    async fn timeout_is_captured_not_thrown() {
        let out = tool()
            .with_timeout(Duration::from_millis(50))
            .invoke(serde_json::json!({"command": "sleep 5"}))
            .await;
        assert!(out.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn restart_acknowledges_with_system_note() {
        let out = tool().invoke(serde_json::json!({"restart": true})).await;
        assert_eq!(out.system.as_deref(), Some("tool has been restarted."));
        assert!(out.output.is_none() && out.error.is_none());
    }

    #[test]
    fn schema_is_version_typed() {
        let v = tool().schema();
        assert_eq!(v["type"], "bash_20250124");
        assert_eq!(v["name"], "bash");
    }
}
