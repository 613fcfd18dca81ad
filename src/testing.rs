//! Test doubles for driving the game core without a network

use parking_lot::Mutex;

use crate::game::{Emitter, ParticipantId};
use crate::ws::protocol::ServerMsg;

/// Where a recorded message was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    One(ParticipantId),
    Everyone,
}

/// Emitter that records every message instead of delivering it
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    sent: Mutex<Vec<(Recipient, ServerMsg)>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages addressed to one participant, in send order
    pub fn messages_for(&self, participant_id: ParticipantId) -> Vec<ServerMsg> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == Recipient::One(participant_id))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Messages fanned out to everyone, in send order
    pub fn broadcasts(&self) -> Vec<ServerMsg> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == Recipient::Everyone)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// How many messages matching `predicate` one participant received
    pub fn count_for(
        &self,
        participant_id: ParticipantId,
        predicate: impl Fn(&ServerMsg) -> bool,
    ) -> usize {
        self.messages_for(participant_id)
            .iter()
            .filter(|msg| predicate(msg))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Emitter for RecordingEmitter {
    fn emit(&self, to: ParticipantId, msg: ServerMsg) {
        self.sent.lock().push((Recipient::One(to), msg));
    }

    fn broadcast(&self, msg: ServerMsg) {
        self.sent.lock().push((Recipient::Everyone, msg));
    }
}
