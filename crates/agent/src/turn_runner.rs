//! The turn loop: model call, tool execution, repeat until no tools run.

use std::sync::Arc;

use deskclaw_core::content::{make_tool_result_block, normalize_response, ContentBlock};
use deskclaw_core::event::AgentEvent;
use deskclaw_core::message::{SessionId, StoredRole, Turn};
use deskclaw_core::provider::{ModelProvider, ModelRequest};
use deskclaw_tools::ToolGroup;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::prompt;
use crate::sink::EventSink;

/// Capacity of the event channel between the turn loop and its subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives one user utterance to completion: send history to the model,
/// execute any requested tools, feed results back, repeat. Progress is
/// reported as a finite stream of [`AgentEvent`]s.
pub struct TurnRunner {
    provider: Arc<dyn ModelProvider>,
    tools: ToolGroup,
    model: String,
    max_tokens: u32,
    max_iterations: u32,
    system_prompt: String,
}

impl TurnRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: ToolGroup, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            max_tokens: 4096,
            max_iterations: 25,
            system_prompt: prompt::system_prompt(),
        }
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the cap on model/tool iterations per utterance.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Replace the default system instructions.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Run one utterance against the session's history.
    ///
    /// Returns immediately with a receiver; a background task pushes events
    /// into it as the loop progresses; the caller just reads until the
    /// channel closes. The stream is finite and ends with
    /// either `done` or a single `error`. Dropping the receiver stops the
    /// loop at its next emit.
    pub fn run_turn(
        &self,
        session_id: SessionId,
        utterance: String,
        prior_history: Vec<Turn>,
    ) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel::<AgentEvent>(EVENT_CHANNEL_CAPACITY);

        let provider = self.provider.clone();
        let tools = self.tools.clone();
        let model = self.model.clone();
        let max_tokens = self.max_tokens;
        let max_iterations = self.max_iterations;
        let system_prompt = self.system_prompt.clone();

        tokio::spawn(async move {
            let sink = EventSink::new(tx);
            let mut turns = prior_history;
            turns.push(Turn::user_text(utterance));

            let schemas = tools.schemas();
            let betas: Vec<String> = tools.beta_flag().map(String::from).into_iter().collect();

            info!(session_id = %session_id.0, turns = turns.len(), "starting turn");

            for iteration in 1..=max_iterations {
                debug!(session_id = %session_id.0, iteration, "turn loop iteration");

                let request = ModelRequest {
                    model: model.clone(),
                    max_tokens,
                    turns: turns.clone(),
                    system: system_prompt.clone(),
                    tool_schemas: schemas.clone(),
                    betas: betas.clone(),
                };

                let response = match provider.send(request).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(session_id = %session_id.0, error = %e, "provider call failed");
                        let _ = sink.emit(AgentEvent::Error { content: e.to_string() }).await;
                        return;
                    }
                };

                let blocks = normalize_response(response.content);
                let assistant_json = match serde_json::to_string(&blocks) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = sink
                            .emit(AgentEvent::Error {
                                content: format!("failed to serialize assistant turn: {e}"),
                            })
                            .await;
                        return;
                    }
                };
                turns.push(Turn::assistant_blocks(blocks.clone()));

                // The assistant turn is persisted before any tool runs, so a
                // crash mid-batch never loses the model's output.
                if sink
                    .emit(AgentEvent::DbSave {
                        role: StoredRole::Assistant,
                        content: assistant_json,
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                let mut results: Vec<ContentBlock> = Vec::new();

                for block in &blocks {
                    let emitted = match block {
                        ContentBlock::Text { text } => {
                            sink.emit(AgentEvent::Text { content: text.clone() }).await
                        }
                        ContentBlock::Thinking { thinking, .. } => {
                            sink.emit(AgentEvent::Thinking { content: thinking.clone() }).await
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            if sink
                                .emit(AgentEvent::ToolUse {
                                    id: id.clone(),
                                    name: name.clone(),
                                    input: input.clone(),
                                })
                                .await
                                .is_err()
                            {
                                return;
                            }

                            let Some(tool) = tools.get(name) else {
                                // No fabricated result for a tool we don't
                                // have; the model sees nothing came back.
                                warn!(session_id = %session_id.0, tool = %name, "unknown tool requested, skipping");
                                continue;
                            };

                            let output = tool.invoke(input.clone()).await;

                            // Partial output survives a failure; it rides
                            // along after the error text.
                            let summary = match (&output.error, &output.output) {
                                (Some(err), Some(partial)) if !partial.is_empty() => {
                                    format!("Error: {err}\n{partial}")
                                }
                                (Some(err), _) => format!("Error: {err}"),
                                (None, out) => out.clone().unwrap_or_default(),
                            };
                            if sink
                                .emit(AgentEvent::ToolResult {
                                    tool_use_id: id.clone(),
                                    content: summary,
                                    is_error: output.error.is_some(),
                                })
                                .await
                                .is_err()
                            {
                                return;
                            }
                            if let Some(image) = &output.base64_image {
                                if sink
                                    .emit(AgentEvent::Image {
                                        tool_use_id: id.clone(),
                                        data: image.clone(),
                                    })
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }

                            results.push(make_tool_result_block(&output, id));
                            Ok(())
                        }
                        // Assistant output never carries result or opaque
                        // blocks we need to act on.
                        ContentBlock::ToolResult { .. } | ContentBlock::Unknown(_) => Ok(()),
                    };
                    if emitted.is_err() {
                        return;
                    }
                }

                if results.is_empty() {
                    let _ = sink.emit(AgentEvent::Done).await;
                    return;
                }

                let results_json = match serde_json::to_string(&results) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = sink
                            .emit(AgentEvent::Error {
                                content: format!("failed to serialize tool results: {e}"),
                            })
                            .await;
                        return;
                    }
                };
                turns.push(Turn::user_blocks(results));

                if sink
                    .emit(AgentEvent::DbSave {
                        role: StoredRole::Tool,
                        content: results_json,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
            }

            warn!(session_id = %session_id.0, max_iterations, "iteration cap reached, ending turn");
            let _ = sink.emit(AgentEvent::Done).await;
        });

        rx
    }
}
