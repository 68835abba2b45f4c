//! deskclaw-store — session and transcript persistence.
//!
//! One SQLite database file with two tables:
//! - `sessions` — one row per conversation
//! - `messages` — the transcript, cascade-deleted with its session
//!
//! Assistant and tool messages store a serialized content-block array;
//! user messages usually store plain text. The store does not interpret
//! content; reconstruction lives in the agent layer.

mod sqlite;

pub use sqlite::SessionStore;
