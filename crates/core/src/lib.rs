//! # DeskClaw Core
//!
//! Domain types, traits, and error definitions for the DeskClaw computer-use
//! agent backend. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod content;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use content::{make_tool_result_block, normalize_response, ContentBlock, ToolResultPart};
pub use error::{ConfigError, Error, ProviderError, Result, StoreError};
pub use event::AgentEvent;
pub use message::{ApiRole, Session, SessionId, StoredMessage, StoredRole, Turn, TurnContent};
pub use provider::{ModelProvider, ModelRequest, ModelResponse, Usage};
pub use tool::{ToolCapability, ToolOutput};
