//! deskclaw-agent — the turn loop orchestrator.
//!
//! Given a conversation history and a fresh user utterance, [`TurnRunner`]
//! drives the model/tool cycle and streams [`AgentEvent`]s to the caller
//! through a bounded channel. The runner never touches the database; it
//! emits `db_save` events and leaves persistence to whoever is listening.
//!
//! [`AgentEvent`]: deskclaw_core::event::AgentEvent

pub mod history;
pub mod prompt;
pub mod sink;
pub mod turn_runner;

pub use history::reconstruct;
pub use prompt::system_prompt;
pub use sink::EventSink;
pub use turn_runner::TurnRunner;
