//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::PlayerAction;

/// State of a single grid cell.
///
/// Encoded on the wire as the one-letter codes the browser client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    #[serde(rename = "w")]
    Water,
    #[serde(rename = "i")]
    IntactShip,
    #[serde(rename = "h")]
    Hit,
    #[serde(rename = "m")]
    Missed,
    #[serde(rename = "d")]
    Destroyed,
}

impl Default for CellState {
    fn default() -> Self {
        Self::Water
    }
}

/// Legend entry for one ship: never reveals where the ship is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipStatus {
    pub length: usize,
    pub destroyed: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask to be paired with the next waiting participant
    JoinQueue,

    /// Request a freshly generated own grid (pre-game only)
    RegenerateGrid,

    /// Lock the own grid and wait for the opponent
    DeclareReady,

    /// Fire at a cell of the opponent grid
    TargetCell {
        /// Row-major cell index
        index: usize,
    },

    /// Chat line relayed to everyone connected
    ChatMessage { text: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Map a client message onto the action the matchmaker understands.
    ///
    /// Returns `None` for transport-level messages (ping) that never reach the game core.
    pub fn into_action(self) -> Option<PlayerAction> {
        match self {
            Self::JoinQueue => Some(PlayerAction::JoinQueue),
            Self::RegenerateGrid => Some(PlayerAction::RegenerateGrid),
            Self::DeclareReady => Some(PlayerAction::DeclareReady),
            Self::TargetCell { index } => Some(PlayerAction::TargetCell(index)),
            Self::ChatMessage { text } => Some(PlayerAction::Broadcast(text)),
            Self::Ping { .. } => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        participant_id: Uuid,
        server_time: u64,
    },

    /// Placed in the waiting slot, no opponent yet
    Queued,

    /// Paired with an opponent; grids may now be regenerated
    PreGameStarted,

    /// Full view of the receiver's own grid
    GridSnapshot { cells: Vec<CellState> },

    /// Opponent grid with unsunk ship segments hidden
    OpponentGridSnapshot { cells: Vec<CellState> },

    /// Opponent fleet legend, in ship-id order
    ShipSummary { ships: Vec<ShipStatus> },

    /// Own grid locked, opponent not ready yet
    WaitingForOpponent,

    /// Both grids locked, turns begin
    GameStarted,

    /// Whether the receiver may fire next
    TurnIndicator { your_turn: bool },

    /// The match was torn down before a winner was found
    MatchAborted,

    /// Final result for the receiver
    Outcome { won: bool },

    /// Chat line from any participant
    ChatRelay { text: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
