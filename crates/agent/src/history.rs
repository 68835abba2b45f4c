//! Rebuilding provider turns from stored messages.

use deskclaw_core::content::ContentBlock;
use deskclaw_core::message::{ApiRole, StoredMessage, StoredRole, Turn, TurnContent};
use tracing::debug;

/// Convert a stored transcript back into the turn list the provider
/// expects.
///
/// Stored content is a serialized content-block array for assistant and
/// tool messages and usually plain text for user messages. Anything that
/// fails to parse as blocks is carried verbatim as raw text; history
/// reconstruction never fails. The `tool` role exists only in storage;
/// the wire protocol has no such role, so tool result batches are sent
/// back as `user` turns.
pub fn reconstruct(messages: &[StoredMessage]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                StoredRole::Assistant => ApiRole::Assistant,
                StoredRole::User | StoredRole::Tool => ApiRole::User,
            };
            let content = match serde_json::from_str::<Vec<ContentBlock>>(&m.content) {
                Ok(blocks) => TurnContent::Blocks(blocks),
                Err(_) => {
                    debug!(message_id = m.id, "stored content is not a block array, using raw text");
                    TurnContent::Text(m.content.clone())
                }
            };
            Turn { role, content }
        })
        .collect()
}
