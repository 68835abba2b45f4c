//! Model provider implementations for DeskClaw.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
