//! Computer capability — screen, keyboard, and mouse automation.
//!
//! Drives X11 through `xdotool` and captures the screen with `scrot`,
//! returning screenshots as base64 PNG payloads. Missing binaries and
//! failed actions are captured in the tool output.

use async_trait::async_trait;
use base64::Engine;
use deskclaw_core::tool::{ToolCapability, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::groups::ToolVersion;
use crate::run::run_command;

const ACTION_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay between keystrokes when typing, in milliseconds.
const TYPING_DELAY_MS: u32 = 12;

pub struct ComputerTool {
    version: ToolVersion,
    width: u32,
    height: u32,
    display_num: Option<u32>,
}

#[derive(Deserialize)]
struct ComputerInput {
    action: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    coordinate: Option<(u32, u32)>,
}

impl ComputerTool {
    pub fn new(version: ToolVersion, width: u32, height: u32) -> Self {
        let display_num = std::env::var("DISPLAY_NUM")
            .ok()
            .and_then(|v| v.parse().ok());
        Self {
            version,
            width,
            height,
            display_num,
        }
    }

    fn schema_type(&self) -> &'static str {
        match self.version {
            ToolVersion::ComputerUse20241022 => "computer_20241022",
            ToolVersion::ComputerUse20250124 => "computer_20250124",
        }
    }

    /// `DISPLAY=:N ` prefix for every spawned command.
    fn display_prefix(&self) -> String {
        match self.display_num {
            Some(n) => format!("DISPLAY=:{n} "),
            None => String::new(),
        }
    }

    async fn shell(&self, command: &str) -> Result<String, String> {
        let full = format!("{}{command}", self.display_prefix());
        debug!(command = %full, "Computer action");
        let (code, stdout, stderr) = run_command(&full, ACTION_TIMEOUT).await?;
        if code != 0 {
            return Err(if stderr.is_empty() {
                format!("'{command}' exited with code {code}")
            } else {
                stderr
            });
        }
        Ok(stdout)
    }

    async fn screenshot(&self) -> Result<ToolOutput, String> {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("screenshot_{}.png", uuid_suffix()));
        let path_str = path.display().to_string();

        self.shell(&format!("scrot -p {path_str}")).await?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("failed to read screenshot: {e}"))?;
        let _ = tokio::fs::remove_file(&path).await;

        Ok(ToolOutput::default()
            .with_image(base64::engine::general_purpose::STANDARD.encode(bytes)))
    }

    async fn run(&self, input: ComputerInput) -> Result<ToolOutput, String> {
        match input.action.as_str() {
            "key" | "type" => {
                let text = input
                    .text
                    .ok_or_else(|| format!("text is required for {}", input.action))?;
                if input.action == "key" {
                    self.shell(&format!("xdotool key -- {}", shell_quote(&text)))
                        .await?;
                } else {
                    self.shell(&format!(
                        "xdotool type --delay {TYPING_DELAY_MS} -- {}",
                        shell_quote(&text)
                    ))
                    .await?;
                }
                Ok(ToolOutput::default())
            }
            "mouse_move" => {
                let (x, y) = input
                    .coordinate
                    .ok_or("coordinate is required for mouse_move")?;
                if x >= self.width || y >= self.height {
                    return Err(format!("coordinate ({x}, {y}) is outside the display"));
                }
                self.shell(&format!("xdotool mousemove --sync {x} {y}"))
                    .await?;
                Ok(ToolOutput::default())
            }
            "left_click" | "right_click" | "middle_click" | "double_click" => {
                if let Some((x, y)) = input.coordinate {
                    self.shell(&format!("xdotool mousemove --sync {x} {y}"))
                        .await?;
                }
                let arg = match input.action.as_str() {
                    "left_click" => "1",
                    "middle_click" => "2",
                    "right_click" => "3",
                    _ => "--repeat 2 --delay 500 1",
                };
                self.shell(&format!("xdotool click {arg}")).await?;
                Ok(ToolOutput::default())
            }
            "screenshot" => self.screenshot().await,
            "cursor_position" => {
                let out = self.shell("xdotool getmouselocation --shell").await?;
                let mut x = None;
                let mut y = None;
                for line in out.lines() {
                    if let Some(v) = line.strip_prefix("X=") {
                        x = v.trim().parse::<u32>().ok();
                    } else if let Some(v) = line.strip_prefix("Y=") {
                        y = v.trim().parse::<u32>().ok();
                    }
                }
                match (x, y) {
                    (Some(x), Some(y)) => Ok(ToolOutput::text(format!("X={x},Y={y}"))),
                    _ => Err(format!("could not parse cursor position from: {out}")),
                }
            }
            other => Err(format!("Invalid action: {other}")),
        }
    }
}

/// Single-quote a string for `sh -c`, escaping embedded quotes.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn uuid_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[async_trait]
impl ToolCapability for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type(),
            "name": "computer",
            "display_width_px": self.width,
            "display_height_px": self.height,
            "display_number": self.display_num,
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutput {
        let input: ComputerInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(format!("invalid computer input: {e}")),
        };

        match self.run(input).await {
            Ok(output) => output,
            Err(reason) => ToolOutput::error(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ComputerTool {
        ComputerTool::new(ToolVersion::ComputerUse20250124, 1024, 768)
    }

    #[test]
    fn schema_carries_display_geometry() {
        let v = tool().schema();
        assert_eq!(v["type"], "computer_20250124");
        assert_eq!(v["display_width_px"], 1024);
        assert_eq!(v["display_height_px"], 768);
    }

    #[tokio::test]
    async fn invalid_action_is_captured() {
        let out = tool()
            .invoke(serde_json::json!({"action": "teleport"}))
            .await;
        assert!(out.error.unwrap().contains("Invalid action"));
    }

    #[tokio::test]
    async fn type_requires_text() {
        let out = tool().invoke(serde_json::json!({"action": "type"})).await;
        assert!(out.error.unwrap().contains("text is required"));
    }

    #[tokio::test]
    async fn mouse_move_requires_coordinate() {
        let out = tool()
            .invoke(serde_json::json!({"action": "mouse_move"}))
            .await;
        assert!(out.error.unwrap().contains("coordinate is required"));
    }

    #[tokio::test]
    async fn out_of_bounds_coordinate_is_rejected() {
        let out = tool()
            .invoke(serde_json::json!({"action": "mouse_move", "coordinate": [5000, 10]}))
            .await;
        assert!(out.error.unwrap().contains("outside the display"));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
