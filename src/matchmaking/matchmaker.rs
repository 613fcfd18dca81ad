//! Matchmaker - pairs waiting participants and routes their actions to matches

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{
    ActionRejected, Emitter, GameMatch, Layout, MatchId, MatchRegistry, ParticipantId,
    PlayerAction, PlayerInput,
};
use crate::ws::protocol::ServerMsg;

use super::queue::WaitingSlot;

/// Default upper bound on relayed chat lines, in characters
pub const DEFAULT_MAX_CHAT_LEN: usize = 280;

/// Matchmaker policy knobs
#[derive(Debug, Clone)]
pub struct MatchmakerSettings {
    /// Put the remaining participant back in the queue after an opponent disconnects
    pub requeue_on_abort: bool,
    /// Longest chat line relayed, in characters
    pub max_chat_len: usize,
}

impl Default for MatchmakerSettings {
    fn default() -> Self {
        Self {
            requeue_on_abort: false,
            max_chat_len: DEFAULT_MAX_CHAT_LEN,
        }
    }
}

/// Actions that are forwarded to the participant's match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchAction {
    RegenerateGrid,
    DeclareReady,
    TargetCell(usize),
}

/// Result of joining the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Nobody was waiting; the participant now is
    Waiting,
    /// Paired with the waiting participant
    Paired(MatchId),
}

/// Snapshot of matchmaker occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchmakingStats {
    pub waiting_participants: usize,
    pub active_matches: usize,
    pub participants_in_matches: usize,
}

/// Owns the waiting slot, every live match and the participant → match index
pub struct Matchmaker {
    waiting: WaitingSlot,
    registry: MatchRegistry,
    /// Map of participant -> current match
    participant_matches: HashMap<ParticipantId, MatchId>,
    layout: Arc<Layout>,
    rng: ChaCha8Rng,
    emitter: Arc<dyn Emitter>,
    settings: MatchmakerSettings,
}

impl Matchmaker {
    pub fn new(
        layout: Arc<Layout>,
        seed: u64,
        emitter: Arc<dyn Emitter>,
        settings: MatchmakerSettings,
    ) -> Self {
        Self {
            waiting: WaitingSlot::new(),
            registry: MatchRegistry::new(),
            participant_matches: HashMap::new(),
            layout,
            rng: ChaCha8Rng::seed_from_u64(seed),
            emitter,
            settings,
        }
    }

    /// Route one inbound action. Rejected actions are logged and dropped.
    pub fn handle(&mut self, input: PlayerInput) {
        let PlayerInput {
            participant_id,
            action,
            received_at,
        } = input;

        let result = match action {
            PlayerAction::JoinQueue => self.enqueue(participant_id).map(|_| ()),
            PlayerAction::RegenerateGrid => {
                self.dispatch(participant_id, MatchAction::RegenerateGrid)
            }
            PlayerAction::DeclareReady => self.dispatch(participant_id, MatchAction::DeclareReady),
            PlayerAction::TargetCell(index) => {
                self.dispatch(participant_id, MatchAction::TargetCell(index))
            }
            PlayerAction::Broadcast(text) => self.relay_chat(participant_id, text),
            PlayerAction::Disconnect => {
                self.close_match(participant_id, true);
                Ok(())
            }
        };

        if let Err(reason) = result {
            debug!(
                participant_id = %participant_id,
                received_at,
                reason = %reason,
                "Ignored participant action"
            );
        }
    }

    /// Join the queue: wait in the slot, or pair with whoever is already waiting
    pub fn enqueue(&mut self, participant_id: ParticipantId) -> Result<EnqueueOutcome, ActionRejected> {
        if self.waiting.contains(&participant_id) {
            return Err(ActionRejected::AlreadyWaiting);
        }
        if self.participant_matches.contains_key(&participant_id) {
            return Err(ActionRejected::AlreadyInMatch);
        }

        let Some(opponent) = self.waiting.pair_or_wait(participant_id) else {
            self.emitter.emit(participant_id, ServerMsg::Queued);
            info!(participant_id = %participant_id, "Participant waiting for an opponent");
            return Ok(EnqueueOutcome::Waiting);
        };

        let match_id = self.create_match(opponent.participant_id, participant_id)?;
        info!(
            match_id = %match_id,
            waited_ms = opponent.wait_time().as_millis() as u64,
            "Paired participants"
        );
        Ok(EnqueueOutcome::Paired(match_id))
    }

    fn create_match(
        &mut self,
        player_one: ParticipantId,
        player_two: ParticipantId,
    ) -> Result<MatchId, ActionRejected> {
        let match_id = Uuid::new_v4();
        let seed = self.rng.gen::<u64>();
        let mut game = GameMatch::new(
            match_id,
            player_one,
            self.layout.clone(),
            seed,
            self.emitter.clone(),
        );

        if let Err(e) = game.add_second_player(player_two) {
            error!(match_id = %match_id, error = %e, "Failed to open match");
            game.abort();
            return Err(e);
        }

        self.registry.insert(game);
        self.participant_matches.insert(player_one, match_id);
        self.participant_matches.insert(player_two, match_id);
        Ok(match_id)
    }

    /// Forward an action to the participant's match
    pub fn dispatch(
        &mut self,
        participant_id: ParticipantId,
        action: MatchAction,
    ) -> Result<(), ActionRejected> {
        let match_id = self
            .match_of(&participant_id)
            .ok_or(ActionRejected::NotInMatch)?;

        let Some(game) = self.registry.get_mut(&match_id) else {
            warn!(
                participant_id = %participant_id,
                match_id = %match_id,
                "Participant indexed to a missing match, dropping stale entry"
            );
            self.participant_matches.remove(&participant_id);
            return Err(ActionRejected::NotInMatch);
        };

        match action {
            MatchAction::RegenerateGrid => game.regenerate_grid(participant_id),
            MatchAction::DeclareReady => game.declare_ready(participant_id),
            MatchAction::TargetCell(index) => {
                let report = game.target_cell(participant_id, index)?;
                if report.match_over {
                    self.close_match(participant_id, false);
                }
                Ok(())
            }
        }
    }

    /// Remove a participant's match (or their waiting slot).
    ///
    /// A disconnect aborts the match first so the opponent is told.
    pub fn close_match(&mut self, participant_id: ParticipantId, is_disconnect: bool) {
        if self.waiting.remove(participant_id).is_some() {
            info!(participant_id = %participant_id, "Waiting participant left");
            return;
        }

        let Some(match_id) = self.participant_matches.remove(&participant_id) else {
            debug!(participant_id = %participant_id, "No match to close");
            return;
        };

        let Some(mut game) = self.registry.remove(&match_id) else {
            warn!(
                participant_id = %participant_id,
                match_id = %match_id,
                "Closing a match that is not registered"
            );
            return;
        };

        if is_disconnect {
            game.abort();
        }

        let players: Vec<ParticipantId> = game.players().collect();
        for player in &players {
            self.participant_matches.remove(player);
        }

        info!(
            match_id = %match_id,
            disconnect = is_disconnect,
            "Match removed from registry"
        );

        if is_disconnect && self.settings.requeue_on_abort {
            for player in players.into_iter().filter(|p| *p != participant_id) {
                if let Err(e) = self.enqueue(player) {
                    warn!(participant_id = %player, error = %e, "Failed to requeue participant");
                }
            }
        }
    }

    /// Relay a chat line to everyone connected
    pub fn relay_chat(
        &mut self,
        participant_id: ParticipantId,
        text: String,
    ) -> Result<(), ActionRejected> {
        if text.trim().is_empty() {
            return Err(ActionRejected::EmptyMessage);
        }
        if text.chars().count() > self.settings.max_chat_len {
            return Err(ActionRejected::MessageTooLong(self.settings.max_chat_len));
        }

        debug!(participant_id = %participant_id, "Relaying chat message");
        self.emitter.broadcast(ServerMsg::ChatRelay { text });
        Ok(())
    }

    pub fn is_participant_in_any_match(&self, participant_id: &ParticipantId) -> bool {
        self.participant_matches.contains_key(participant_id)
    }

    /// The participant's current match id
    pub fn match_of(&self, participant_id: &ParticipantId) -> Option<MatchId> {
        self.participant_matches.get(participant_id).copied()
    }

    pub fn is_waiting(&self, participant_id: &ParticipantId) -> bool {
        self.waiting.contains(participant_id)
    }

    pub fn get_match(&self, match_id: &MatchId) -> Option<&GameMatch> {
        self.registry.get(match_id)
    }

    pub fn stats(&self) -> MatchmakingStats {
        MatchmakingStats {
            waiting_participants: self.waiting.len(),
            active_matches: self.registry.active_matches(),
            participants_in_matches: self.participant_matches.len(),
        }
    }
}
