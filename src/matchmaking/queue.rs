//! Single-slot waiting buffer for participants without an opponent

use std::time::{Duration, Instant};

use crate::game::ParticipantId;

/// Participant waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub participant_id: ParticipantId,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this participant has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Holds at most one waiting participant
#[derive(Debug, Default)]
pub struct WaitingSlot {
    slot: Option<QueuedPlayer>,
}

impl WaitingSlot {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Park a participant if nobody is waiting.
    /// Otherwise hand back the one already waiting, leaving the slot empty.
    pub fn pair_or_wait(&mut self, participant_id: ParticipantId) -> Option<QueuedPlayer> {
        match self.slot.take() {
            Some(waiting) => Some(waiting),
            None => {
                self.slot = Some(QueuedPlayer::new(participant_id));
                None
            }
        }
    }

    /// Clear the slot if it holds this participant
    pub fn remove(&mut self, participant_id: ParticipantId) -> Option<QueuedPlayer> {
        if self.contains(&participant_id) {
            self.slot.take()
        } else {
            None
        }
    }

    /// Check if a participant is the one waiting
    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.slot
            .as_ref()
            .map_or(false, |p| &p.participant_id == participant_id)
    }

    pub fn len(&self) -> usize {
        usize::from(self.slot.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
