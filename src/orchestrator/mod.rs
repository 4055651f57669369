//! Streaming tool-call orchestration.

pub mod accumulator;
pub mod phase;
pub mod runner;

pub use accumulator::ToolCallAccumulator;
pub use phase::{TurnPhase, TurnState};
pub use runner::{ChatEventStream, Orchestrator};
