//! Matchmaking service - the single task that owns all matchmaking state

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::game::{ParticipantId, PlayerAction, PlayerInput};
use crate::util::time::unix_millis;

use super::matchmaker::{Matchmaker, MatchmakingStats};

/// Inbound command queue depth
const COMMAND_CHANNEL_CAPACITY: usize = 1024;

/// Work items for the matchmaking task
#[derive(Debug)]
pub enum Command {
    /// A participant action, processed to completion before the next command
    Input(PlayerInput),
    /// Occupancy snapshot for health reporting
    Stats(oneshot::Sender<MatchmakingStats>),
}

/// Cloneable handle used by connections to reach the matchmaking task
#[derive(Clone)]
pub struct MatchmakingHandle {
    command_tx: mpsc::Sender<Command>,
}

impl MatchmakingHandle {
    /// Queue an action for the matchmaker. Returns `false` once the service has stopped.
    pub async fn submit(&self, participant_id: ParticipantId, action: PlayerAction) -> bool {
        let input = PlayerInput {
            participant_id,
            action,
            received_at: unix_millis(),
        };

        if self.command_tx.send(Command::Input(input)).await.is_err() {
            warn!(participant_id = %participant_id, "Matchmaking service is gone, dropping action");
            return false;
        }
        true
    }

    /// Ask the matchmaker for its current occupancy
    pub async fn stats(&self) -> Option<MatchmakingStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx.send(Command::Stats(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }
}

/// Matchmaking service
pub struct MatchmakingService {
    matchmaker: Matchmaker,
    command_rx: mpsc::Receiver<Command>,
}

impl MatchmakingService {
    pub fn new(matchmaker: Matchmaker) -> (Self, MatchmakingHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let service = Self {
            matchmaker,
            command_rx,
        };
        (service, MatchmakingHandle { command_tx })
    }

    /// Process commands one at a time until every handle is dropped
    pub async fn run(mut self) {
        info!("Matchmaking service started");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                Command::Input(input) => self.matchmaker.handle(input),
                Command::Stats(reply_tx) => {
                    let _ = reply_tx.send(self.matchmaker.stats());
                }
            }
        }

        info!("Matchmaking service stopped");
    }
}
