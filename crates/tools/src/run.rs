//! Shared command execution helpers for the shell-backed capabilities.

use std::time::Duration;
use tokio::process::Command;

/// Output beyond this length is clipped before being sent to the model.
pub const MAX_RESPONSE_LEN: usize = 16000;

/// Marker appended to clipped output so the model knows to narrow its query.
pub const TRUNCATED_MESSAGE: &str =
    "<response clipped><NOTE>To save on context only part of this output has been shown. \
     Re-run the command against a narrower target or grep for what you need.</NOTE>";

/// Clip overly long tool output, appending the truncation marker.
pub fn maybe_truncate(text: &str) -> String {
    if text.len() <= MAX_RESPONSE_LEN {
        return text.to_string();
    }
    // Cut on a char boundary at or below the cap.
    let mut end = MAX_RESPONSE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATED_MESSAGE)
}

/// Run a command through `sh -c` with a timeout.
///
/// Returns `(exit_code, stdout, stderr)`; spawn failures and timeouts come
/// back as `Err` so callers can capture them in a tool output.
pub async fn run_command(
    command: &str,
    timeout: Duration,
) -> Result<(i32, String, String), String> {
    let fut = Command::new("sh").args(["-c", command]).output();

    let output = match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(format!("failed to spawn '{command}': {e}")),
        Err(_) => {
            return Err(format!(
                "command '{command}' timed out after {} seconds",
                timeout.as_secs()
            ))
        }
    };

    let code = output.status.code().unwrap_or(-1);
    let stdout = maybe_truncate(&String::from_utf8_lossy(&output.stdout));
    let stderr = maybe_truncate(&String::from_utf8_lossy(&output.stderr));
    Ok((code, stdout, stderr))
}
