//! Built-in tool capabilities for DeskClaw and the versioned registry that
//! exposes them to the agent loop.
//!
//! Each protocol version gets its own immutable [`ToolGroup`]; the agent
//! resolves tools only through the group, never by reaching into this crate.

pub mod bash;
pub mod computer;
pub mod edit;
pub mod groups;
pub mod run;

pub use bash::BashTool;
pub use computer::ComputerTool;
pub use edit::EditTool;
pub use groups::{ToolGroup, ToolVersion, VersionRegistry};
pub use run::{maybe_truncate, run_command};
