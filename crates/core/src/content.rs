//! Content blocks — the typed units inside a conversation turn.
//!
//! A model response is an ordered sequence of blocks (`text`, `thinking`,
//! `tool_use`), and tool results flow back as `tool_result` blocks on the
//! next user turn. The union is closed but carries an explicit
//! [`ContentBlock::Unknown`] fallback: block shapes this build does not know
//! about are preserved verbatim so that echoing them back to the provider on
//! a later turn stays valid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolOutput;

/// One unit of conversation content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain assistant text.
    Text { text: String },

    /// Extended-thinking output. The signature is opaque and must be passed
    /// through unmodified when the block is echoed back.
    Thinking {
        thinking: String,
        signature: Option<String>,
    },

    /// The model requests a tool invocation. `id` correlates the request
    /// with its eventual `tool_result`.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    /// The result of a tool invocation, sent back on a user-role turn.
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultPart>,
        is_error: bool,
    },

    /// Any block shape we don't recognize, kept as-is.
    Unknown(Value),
}

/// A sub-part of a `tool_result` block's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultPart {
    Text { text: String },
    Image { source: ImageSource },
}

/// Base64 image payload in the provider's source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".into(),
            media_type: "image/png".into(),
            data: data.into(),
        }
    }
}

impl ContentBlock {
    /// Wire representation of this block.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text { text } => serde_json::json!({ "type": "text", "text": text }),
            Self::Thinking {
                thinking,
                signature,
            } => {
                let mut v = serde_json::json!({ "type": "thinking", "thinking": thinking });
                if let Some(sig) = signature {
                    v["signature"] = Value::String(sig.clone());
                }
                v
            }
            Self::ToolUse { id, name, input } => serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }),
            Self::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
            Self::Unknown(v) => v.clone(),
        }
    }

    /// Decode a wire value. Anything that doesn't match a known shape becomes
    /// [`ContentBlock::Unknown`] — never an error, never dropped.
    pub fn from_value(v: Value) -> Self {
        let Some(kind) = v.get("type").and_then(Value::as_str) else {
            return Self::Unknown(v);
        };

        match kind {
            "text" => match v.get("text").and_then(Value::as_str) {
                Some(text) => Self::Text { text: text.into() },
                None => Self::Unknown(v),
            },
            "thinking" => match v.get("thinking").and_then(Value::as_str) {
                Some(thinking) => Self::Thinking {
                    thinking: thinking.into(),
                    signature: v
                        .get("signature")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                },
                None => Self::Unknown(v),
            },
            "tool_use" => {
                let id = v.get("id").and_then(Value::as_str).map(str::to_string);
                let name = v.get("name").and_then(Value::as_str).map(str::to_string);
                match (id, name) {
                    (Some(id), Some(name)) => Self::ToolUse {
                        id,
                        name,
                        input: v.get("input").cloned().unwrap_or(Value::Null),
                    },
                    _ => Self::Unknown(v),
                }
            }
            "tool_result" => {
                let Some(tool_use_id) = v.get("tool_use_id").and_then(Value::as_str) else {
                    return Self::Unknown(v);
                };
                let tool_use_id = tool_use_id.to_string();
                let is_error = v.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                // `content` may be a bare string (legacy error form) or a
                // sequence of parts.
                let content = match v.get("content") {
                    Some(Value::String(s)) => vec![ToolResultPart::Text { text: s.clone() }],
                    Some(parts @ Value::Array(_)) => {
                        match serde_json::from_value(parts.clone()) {
                            Ok(parts) => parts,
                            Err(_) => return Self::Unknown(v),
                        }
                    }
                    _ => Vec::new(),
                };
                Self::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                }
            }
            _ => Self::Unknown(v),
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

/// Normalize a model response into the block sequence that is appended to
/// history and echoed back to the provider. Blank text blocks are dropped;
/// everything else passes through untouched.
pub fn normalize_response(blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .filter(|b| !matches!(b, ContentBlock::Text { text } if text.is_empty()))
        .collect()
}

/// Package a tool execution's output into the `tool_result` block that
/// answers `tool_use_id`.
///
/// An error yields error text alone (system note prepended) with the error
/// flag set. Otherwise the content is a text part (if there is output)
/// followed by an image part (if there is a screenshot). An output with
/// nothing at all still produces a valid empty-content block — the protocol
/// never skips a result for an issued `tool_use`.
pub fn make_tool_result_block(output: &ToolOutput, tool_use_id: &str) -> ContentBlock {
    if let Some(error) = &output.error {
        return ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultPart::Text {
                text: prepend_system(output, error),
            }],
            is_error: true,
        };
    }

    let mut content = Vec::new();
    if let Some(text) = &output.output {
        if !text.is_empty() {
            content.push(ToolResultPart::Text {
                text: prepend_system(output, text),
            });
        }
    }
    if let Some(image) = &output.base64_image {
        content.push(ToolResultPart::Image {
            source: ImageSource::png(image.clone()),
        });
    }

    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.into(),
        content,
        is_error: false,
    }
}

fn prepend_system(output: &ToolOutput, text: &str) -> String {
    match &output.system {
        Some(system) => format!("<system>{system}</system>\n{text}"),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(block: ContentBlock) -> ContentBlock {
        let json = serde_json::to_string(&block).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn text_roundtrip() {
        let block = ContentBlock::Text {
            text: "hello".into(),
        };
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn thinking_roundtrip_preserves_signature() {
        let block = ContentBlock::Thinking {
            thinking: "step by step".into(),
            signature: Some("sig-abc123".into()),
        };
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn thinking_without_signature_roundtrips() {
        let block = ContentBlock::Thinking {
            thinking: "hmm".into(),
            signature: None,
        };
        let v = block.to_value();
        assert!(v.get("signature").is_none());
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn tool_use_roundtrip() {
        let block = ContentBlock::ToolUse {
            id: "toolu_01".into(),
            name: "bash".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn tool_result_roundtrip() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_01".into(),
            content: vec![
                ToolResultPart::Text {
                    text: "a.txt\nb.txt".into(),
                },
                ToolResultPart::Image {
                    source: ImageSource::png("aGVsbG8="),
                },
            ],
            is_error: false,
        };
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn unknown_block_roundtrips_unmodified() {
        let wire = serde_json::json!({
            "type": "server_tool_use",
            "id": "srv_1",
            "payload": { "nested": [1, 2, 3] }
        });
        let block = ContentBlock::from_value(wire.clone());
        assert!(matches!(block, ContentBlock::Unknown(_)));
        assert_eq!(block.to_value(), wire);
        assert_eq!(roundtrip(block.clone()), block);
    }

    #[test]
    fn missing_type_tag_is_unknown() {
        let wire = serde_json::json!({ "text": "no tag" });
        assert!(matches!(
            ContentBlock::from_value(wire),
            ContentBlock::Unknown(_)
        ));
    }

    #[test]
    fn string_tool_result_content_decodes_as_text_part() {
        let wire = serde_json::json!({
            "type": "tool_result",
            "tool_use_id": "toolu_9",
            "content": "plain error text",
            "is_error": true
        });
        match ContentBlock::from_value(wire) {
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert_eq!(
                    content,
                    vec![ToolResultPart::Text {
                        text: "plain error text".into()
                    }]
                );
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn normalize_drops_blank_text_only() {
        let blocks = vec![
            ContentBlock::Text { text: "".into() },
            ContentBlock::Text { text: "kept".into() },
            ContentBlock::ToolUse {
                id: "t1".into(),
                name: "bash".into(),
                input: Value::Null,
            },
        ];
        let normalized = normalize_response(blocks);
        assert_eq!(normalized.len(), 2);
        assert!(matches!(&normalized[0], ContentBlock::Text { text } if text == "kept"));
    }

    #[test]
    fn error_output_packages_error_text_only() {
        let output = ToolOutput {
            output: Some("partial".into()),
            error: Some("boom".into()),
            base64_image: Some("aGk=".into()),
            system: None,
        };
        match make_tool_result_block(&output, "toolu_1") {
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert_eq!(content, vec![ToolResultPart::Text { text: "boom".into() }]);
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn system_note_is_prepended() {
        let output = ToolOutput {
            output: Some("done".into()),
            error: None,
            base64_image: None,
            system: Some("took a while".into()),
        };
        match make_tool_result_block(&output, "toolu_1") {
            ContentBlock::ToolResult { content, .. } => {
                assert_eq!(
                    content,
                    vec![ToolResultPart::Text {
                        text: "<system>took a while</system>\ndone".into()
                    }]
                );
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_still_yields_result_block() {
        let output = ToolOutput::default();
        match make_tool_result_block(&output, "toolu_1") {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert!(content.is_empty());
                assert!(!is_error);
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn output_and_image_order_text_first() {
        let output = ToolOutput {
            output: Some("took screenshot".into()),
            error: None,
            base64_image: Some("cG5n".into()),
            system: None,
        };
        match make_tool_result_block(&output, "toolu_2") {
            ContentBlock::ToolResult { content, .. } => {
                assert!(matches!(content[0], ToolResultPart::Text { .. }));
                assert!(matches!(content[1], ToolResultPart::Image { .. }));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }
}
