//! Turn phases of the streaming orchestrator.

use strum::Display;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where a turn currently is.
///
/// A turn without tool calls goes straight from content streaming to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    AwaitingFirstTurn,
    StreamingContent,
    StreamingToolCalls,
    ToolExecution,
    AwaitingSecondTurn,
    StreamingFinalContent,
    Done,
    Failed,
}

impl TurnPhase {
    /// Whether `next` may follow `self`. Staying in the same phase is always allowed.
    pub fn can_advance_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (AwaitingFirstTurn, StreamingContent | StreamingToolCalls | Done) => true,
            (StreamingContent, StreamingToolCalls | Done) => true,
            (StreamingToolCalls, ToolExecution) => true,
            (ToolExecution, AwaitingSecondTurn) => true,
            (AwaitingSecondTurn, StreamingFinalContent | Done) => true,
            (StreamingFinalContent, Done) => true,
            _ => false,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Failed)
    }
}

/// Phase tracker for one turn; transitions are traced under the turn id.
#[derive(Debug)]
pub struct TurnState {
    id: Uuid,
    phase: TurnPhase,
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: TurnPhase::AwaitingFirstTurn,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Move to `next`. A finished turn keeps its terminal phase.
    pub fn advance(&mut self, next: TurnPhase) {
        if self.phase == next {
            return;
        }
        if self.phase.is_finished() {
            warn!(turn_id = %self.id, from = %self.phase, to = %next, "turn already finished");
            return;
        }
        if !self.phase.can_advance_to(next) {
            warn!(turn_id = %self.id, from = %self.phase, to = %next, "unexpected turn transition");
        }
        debug!(turn_id = %self.id, from = %self.phase, to = %next, "turn phase");
        self.phase = next;
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}
