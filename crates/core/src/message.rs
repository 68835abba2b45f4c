//! Session, stored-message, and turn domain types.
//!
//! Two shapes coexist on purpose: [`StoredMessage`] is what the persistence
//! collaborator writes (role + serialized content + timestamp), while
//! [`Turn`] is the provider-facing message the orchestrator sends. History
//! reconstruction maps one to the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::ContentBlock;

/// Opaque identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation identity. Created on first contact, never mutated
/// afterwards except for the liveness flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// The role a persisted message was stored under.
///
/// `Tool` marks a tool-result-carrying turn; the provider protocol has no
/// such role, so reconstruction remaps it to `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredRole {
    User,
    Assistant,
    Tool,
}

impl StoredRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::str::FromStr for StoredRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(format!("unknown stored role: {other}")),
        }
    }
}

/// One persisted turn, exactly as the store returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: SessionId,
    pub role: StoredRole,
    /// Either plain text or a serialized content-block sequence.
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The role of a provider-facing turn. The provider only knows these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    User,
    Assistant,
}

/// A turn's content: either raw text or structured blocks. Serialized
/// untagged so the wire shape matches the provider's message param.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One provider-facing turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: ApiRole,
    pub content: TurnContent,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: ApiRole::User,
            content: TurnContent::Blocks(blocks),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: ApiRole::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_turn_serializes_as_bare_string_content() {
        let turn = Turn::user_text("list files");
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"], "list files");
    }

    #[test]
    fn block_turn_serializes_as_array_content() {
        let turn = Turn::assistant_blocks(vec![ContentBlock::Text {
            text: "done".into(),
        }]);
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(v["role"], "assistant");
        assert!(v["content"].is_array());
        assert_eq!(v["content"][0]["type"], "text");
    }

    #[test]
    fn stored_role_parse_roundtrip() {
        for role in [StoredRole::User, StoredRole::Assistant, StoredRole::Tool] {
            assert_eq!(role.as_str().parse::<StoredRole>().unwrap(), role);
        }
        assert!("system".parse::<StoredRole>().is_err());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
