//! Game core: grids, layouts and the per-match state machine

pub mod grid;
pub mod layout;
pub mod r#match;

pub use grid::{Grid, GridError, HitOutcome, Ship};
pub use layout::{Layout, LayoutError, LayoutMode, ShipSet};
pub use r#match::{GameMatch, MatchPhase, MatchRegistry, ShotReport, ShotResult};

use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Identifies one connected participant
pub type ParticipantId = Uuid;

/// Identifies one live match
pub type MatchId = Uuid;

/// Action a participant can trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    JoinQueue,
    RegenerateGrid,
    DeclareReady,
    TargetCell(usize),
    /// Chat line for everyone connected
    Broadcast(String),
    /// The transport lost the participant
    Disconnect,
}

/// Action delivered by the transport
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub participant_id: ParticipantId,
    pub action: PlayerAction,
    pub received_at: u64,
}

/// Outbound side of the transport: the only way the core talks to participants.
///
/// Sends are fire-and-forget. Implementations must deliver messages to one
/// participant in send order.
pub trait Emitter: Send + Sync {
    /// Deliver a message to one participant
    fn emit(&self, to: ParticipantId, msg: ServerMsg);

    /// Deliver a message to every connected participant
    fn broadcast(&self, msg: ServerMsg);
}

/// Why an inbound action was ignored. Never shown to participants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionRejected {
    #[error("Action not allowed in phase {0:?}")]
    WrongPhase(MatchPhase),

    #[error("Participant is not part of this match")]
    NotAParticipant,

    #[error("Participant cannot play against themselves")]
    SameParticipant,

    #[error("Not this participant's turn")]
    NotYourTurn,

    #[error("Grid is already locked")]
    GridLocked,

    #[error("Participant already declared ready")]
    AlreadyReady,

    #[error("Cell {0} cannot be targeted")]
    CellNotClickable(usize),

    #[error("Participant is already waiting for an opponent")]
    AlreadyWaiting,

    #[error("Participant is already in a match")]
    AlreadyInMatch,

    #[error("Participant is not in any match")]
    NotInMatch,

    #[error("Chat message is empty")]
    EmptyMessage,

    #[error("Chat message exceeds {0} characters")]
    MessageTooLong(usize),

    #[error("Grid generation failed: {0}")]
    Generation(#[from] GridError),
}
