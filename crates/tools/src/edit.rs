//! Str-replace editor capability — shell-free file viewing and editing.
//!
//! Implements the provider's `str_replace_editor` commands: `view`,
//! `create`, `str_replace` (uniqueness-checked), `insert`, and `undo_edit`
//! (per-path history). All failures are captured in the tool output.

use async_trait::async_trait;
use deskclaw_core::tool::{ToolCapability, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::groups::ToolVersion;
use crate::run::maybe_truncate;

/// Lines of context shown around an edit.
const SNIPPET_LINES: usize = 4;

pub struct EditTool {
    version: ToolVersion,
    /// Previous file contents, newest last, for `undo_edit`.
    history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

#[derive(Deserialize)]
struct EditInput {
    command: String,
    path: String,
    #[serde(default)]
    file_text: Option<String>,
    #[serde(default)]
    view_range: Option<Vec<i64>>,
    #[serde(default)]
    old_str: Option<String>,
    #[serde(default)]
    new_str: Option<String>,
    #[serde(default)]
    insert_line: Option<usize>,
}

impl EditTool {
    pub fn new(version: ToolVersion) -> Self {
        Self {
            version,
            history: Mutex::new(HashMap::new()),
        }
    }

    fn schema_type(&self) -> &'static str {
        match self.version {
            ToolVersion::ComputerUse20241022 => "text_editor_20241022",
            ToolVersion::ComputerUse20250124 => "text_editor_20250124",
        }
    }

    async fn run(&self, input: EditInput) -> Result<ToolOutput, String> {
        let path = PathBuf::from(&input.path);
        if !path.is_absolute() {
            return Err(format!(
                "The path {} is not an absolute path, it should start with '/'.",
                input.path
            ));
        }

        match input.command.as_str() {
            "view" => self.view(&path, input.view_range).await,
            "create" => {
                let file_text = input
                    .file_text
                    .ok_or("Parameter `file_text` is required for command: create")?;
                self.create(&path, file_text).await
            }
            "str_replace" => {
                let old_str = input
                    .old_str
                    .ok_or("Parameter `old_str` is required for command: str_replace")?;
                self.str_replace(&path, &old_str, input.new_str.as_deref().unwrap_or(""))
                    .await
            }
            "insert" => {
                let insert_line = input
                    .insert_line
                    .ok_or("Parameter `insert_line` is required for command: insert")?;
                let new_str = input
                    .new_str
                    .ok_or("Parameter `new_str` is required for command: insert")?;
                self.insert(&path, insert_line, &new_str).await
            }
            "undo_edit" => self.undo_edit(&path).await,
            other => Err(format!("Unrecognized command {other}.")),
        }
    }

    async fn read(&self, path: &Path) -> Result<String, String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Ran into {e} while trying to read {}", path.display()))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), String> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| format!("Ran into {e} while trying to write to {}", path.display()))
    }

    fn record(&self, path: &Path, previous: String) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_path_buf())
            .or_default()
            .push(previous);
    }

    async fn view(&self, path: &Path, view_range: Option<Vec<i64>>) -> Result<ToolOutput, String> {
        let content = self.read(path).await?;

        let (content, start_line) = match view_range {
            None => (content, 1),
            Some(range) => {
                let [start, end] = range[..] else {
                    return Err("Invalid `view_range`. It should be a list of two integers.".into());
                };
                let lines: Vec<&str> = content.split('\n').collect();
                let total = lines.len() as i64;
                if start < 1 || start > total {
                    return Err(format!(
                        "Invalid `view_range`: first element {start} should be within [1, {total}]."
                    ));
                }
                let end = if end == -1 { total } else { end };
                if end < start || end > total {
                    return Err(format!(
                        "Invalid `view_range`: second element {end} should be within [{start}, {total}] or -1."
                    ));
                }
                (
                    lines[(start - 1) as usize..end as usize].join("\n"),
                    start as usize,
                )
            }
        };

        Ok(ToolOutput::text(numbered_output(
            &content,
            &path.display().to_string(),
            start_line,
        )))
    }

    async fn create(&self, path: &Path, file_text: String) -> Result<ToolOutput, String> {
        if path.exists() {
            return Err(format!(
                "File already exists at: {}. Cannot overwrite files using command `create`.",
                path.display()
            ));
        }
        self.write(path, &file_text).await?;
        self.record(path, file_text);
        Ok(ToolOutput::text(format!(
            "File created successfully at: {}",
            path.display()
        )))
    }

    async fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<ToolOutput, String> {
        let content = self.read(path).await?;

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Err(format!(
                "No replacement was performed, old_str `{old_str}` did not appear verbatim in {}.",
                path.display()
            ));
        }
        if occurrences > 1 {
            let lines: Vec<usize> = content
                .split('\n')
                .enumerate()
                .filter(|(_, line)| line.contains(old_str))
                .map(|(i, _)| i + 1)
                .collect();
            return Err(format!(
                "No replacement was performed. Multiple occurrences of old_str `{old_str}` in lines {lines:?}. Please ensure it is unique."
            ));
        }

        let new_content = content.replacen(old_str, new_str, 1);
        self.write(path, &new_content).await?;
        self.record(path, content.clone());

        // Show the edited region for review.
        let replacement_line = content.split(old_str).next().unwrap_or("").matches('\n').count();
        let start = replacement_line.saturating_sub(SNIPPET_LINES);
        let end = replacement_line + SNIPPET_LINES + new_str.matches('\n').count();
        let snippet = new_content
            .split('\n')
            .skip(start)
            .take(end + 1 - start)
            .collect::<Vec<_>>()
            .join("\n");

        let mut msg = format!("The file {} has been edited. ", path.display());
        msg.push_str(&numbered_output(
            &snippet,
            &format!("a snippet of {}", path.display()),
            start + 1,
        ));
        msg.push_str("Review the changes and make sure they are as expected. Edit the file again if necessary.");
        Ok(ToolOutput::text(msg))
    }

    async fn insert(
        &self,
        path: &Path,
        insert_line: usize,
        new_str: &str,
    ) -> Result<ToolOutput, String> {
        let content = self.read(path).await?;
        let lines: Vec<&str> = content.split('\n').collect();

        if insert_line > lines.len() {
            return Err(format!(
                "Invalid `insert_line` parameter: {insert_line}. It should be within [0, {}].",
                lines.len()
            ));
        }

        let new_lines: Vec<&str> = new_str.split('\n').collect();
        let mut edited: Vec<&str> = Vec::with_capacity(lines.len() + new_lines.len());
        edited.extend(&lines[..insert_line]);
        edited.extend(&new_lines);
        edited.extend(&lines[insert_line..]);
        let new_content = edited.join("\n");

        let snippet_start = insert_line.saturating_sub(SNIPPET_LINES);
        let snippet = edited
            .iter()
            .skip(snippet_start)
            .take(insert_line - snippet_start + new_lines.len() + SNIPPET_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        self.write(path, &new_content).await?;
        self.record(path, content);

        let mut msg = format!("The file {} has been edited. ", path.display());
        msg.push_str(&numbered_output(
            &snippet,
            "a snippet of the edited file",
            snippet_start + 1,
        ));
        msg.push_str("Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.");
        Ok(ToolOutput::text(msg))
    }

    async fn undo_edit(&self, path: &Path) -> Result<ToolOutput, String> {
        let previous = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(path)
            .and_then(Vec::pop);

        let Some(previous) = previous else {
            return Err(format!("No edit history found for {}.", path.display()));
        };

        self.write(path, &previous).await?;
        Ok(ToolOutput::text(format!(
            "Last edit to {} undone successfully. {}",
            path.display(),
            numbered_output(&previous, &path.display().to_string(), 1)
        )))
    }
}

/// `cat -n`-style output, clipped to the response cap.
fn numbered_output(content: &str, descriptor: &str, start_line: usize) -> String {
    let numbered = content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{line}", i + start_line))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Here's the result of running `cat -n` on {descriptor}:\n{}\n",
        maybe_truncate(&numbered)
    )
}

#[async_trait]
impl ToolCapability for EditTool {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type(),
            "name": "str_replace_editor",
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutput {
        let input: EditInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(format!("invalid editor input: {e}")),
        };

        debug!(command = %input.command, path = %input.path, "Editor command");

        match self.run(input).await {
            Ok(output) => output,
            Err(reason) => ToolOutput::error(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool() -> EditTool {
        EditTool::new(ToolVersion::ComputerUse20250124)
    }

    fn path_in(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    #[tokio::test]
    async fn create_then_view() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "hello.txt");
        let tool = tool();

        let out = tool
            .invoke(serde_json::json!({
                "command": "create", "path": path, "file_text": "line one\nline two"
            }))
            .await;
        assert!(out.error.is_none(), "{:?}", out.error);

        let out = tool
            .invoke(serde_json::json!({"command": "view", "path": path}))
            .await;
        let text = out.output.unwrap();
        assert!(text.contains("     1\tline one"));
        assert!(text.contains("     2\tline two"));
    }

    #[tokio::test]
    async fn view_range_slices_lines() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "r.txt");
        std::fs::write(&path, "a\nb\nc\nd").unwrap();

        let out = tool()
            .invoke(serde_json::json!({
                "command": "view", "path": path, "view_range": [2, 3]
            }))
            .await;
        let text = out.output.unwrap();
        assert!(text.contains("     2\tb"));
        assert!(text.contains("     3\tc"));
        assert!(!text.contains("\ta"));
        assert!(!text.contains("\td"));
    }

    #[tokio::test]
    async fn create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "x.txt");
        std::fs::write(&path, "existing").unwrap();

        let out = tool()
            .invoke(serde_json::json!({
                "command": "create", "path": path, "file_text": "new"
            }))
            .await;
        assert!(out.error.unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn str_replace_requires_unique_match() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "dup.txt");
        std::fs::write(&path, "foo\nfoo\n").unwrap();

        let out = tool()
            .invoke(serde_json::json!({
                "command": "str_replace", "path": path, "old_str": "foo", "new_str": "bar"
            }))
            .await;
        assert!(out.error.unwrap().contains("Multiple occurrences"));

        let out = tool()
            .invoke(serde_json::json!({
                "command": "str_replace", "path": path, "old_str": "missing", "new_str": "bar"
            }))
            .await;
        assert!(out.error.unwrap().contains("did not appear verbatim"));
    }

    #[tokio::test]
    async fn str_replace_edits_and_undo_restores() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "e.txt");
        std::fs::write(&path, "alpha\nbeta\ngamma").unwrap();
        let tool = tool();

        let out = tool
            .invoke(serde_json::json!({
                "command": "str_replace", "path": path, "old_str": "beta", "new_str": "delta"
            }))
            .await;
        assert!(out.error.is_none(), "{:?}", out.error);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "alpha\ndelta\ngamma"
        );

        let out = tool
            .invoke(serde_json::json!({"command": "undo_edit", "path": path}))
            .await;
        assert!(out.output.unwrap().contains("undone successfully"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha\nbeta\ngamma");
    }

    #[tokio::test]
    async fn insert_places_text_after_line() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "i.txt");
        std::fs::write(&path, "one\nthree").unwrap();

        let out = tool()
            .invoke(serde_json::json!({
                "command": "insert", "path": path, "insert_line": 1, "new_str": "two"
            }))
            .await;
        assert!(out.error.is_none(), "{:?}", out.error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn undo_without_history_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir, "h.txt");
        std::fs::write(&path, "x").unwrap();

        let out = tool()
            .invoke(serde_json::json!({"command": "undo_edit", "path": path}))
            .await;
        assert!(out.error.unwrap().contains("No edit history"));
    }

    #[tokio::test]
    async fn relative_path_is_rejected() {
        let out = tool()
            .invoke(serde_json::json!({"command": "view", "path": "relative.txt"}))
            .await;
        assert!(out.error.unwrap().contains("not an absolute path"));
    }
}
