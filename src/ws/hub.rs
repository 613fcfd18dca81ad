//! Connection hub - per-participant outbound channels

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::game::{Emitter, ParticipantId};
use crate::ws::protocol::ServerMsg;

/// Outbound channel of every connected participant
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<ParticipantId, mpsc::UnboundedSender<ServerMsg>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection and get the receiving end of its outbound channel
    pub fn register(&self, participant_id: ParticipantId) -> mpsc::UnboundedReceiver<ServerMsg> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(participant_id, tx);
        rx
    }

    pub fn unregister(&self, participant_id: &ParticipantId) {
        self.connections.remove(participant_id);
    }

    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.connections.contains_key(participant_id)
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

impl Emitter for ConnectionHub {
    fn emit(&self, to: ParticipantId, msg: ServerMsg) {
        match self.connections.get(&to) {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    debug!(participant_id = %to, "Outbound channel closed");
                }
            }
            None => trace!(participant_id = %to, "Dropping message for unknown participant"),
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn emit_reaches_only_the_addressee_in_order() {
        let hub = ConnectionHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.register(a);
        let mut rx_b = hub.register(b);

        hub.emit(a, ServerMsg::PreGameStarted);
        hub.emit(a, ServerMsg::GameStarted);

        assert_eq!(rx_a.recv().await, Some(ServerMsg::PreGameStarted));
        assert_eq!(rx_a.recv().await, Some(ServerMsg::GameStarted));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let hub = ConnectionHub::new();
        let mut receivers: Vec<_> = (0..3).map(|_| hub.register(Uuid::new_v4())).collect();

        let msg = ServerMsg::ChatRelay {
            text: "gg".to_string(),
        };
        hub.broadcast(msg.clone());

        for rx in receivers.iter_mut() {
            assert_eq!(rx.recv().await, Some(msg.clone()));
        }
    }

    #[test]
    fn unregistered_participants_are_skipped() {
        let hub = ConnectionHub::new();
        let a = Uuid::new_v4();
        let _rx = hub.register(a);
        assert_eq!(hub.connected_count(), 1);

        hub.unregister(&a);
        assert!(!hub.is_connected(&a));
        hub.emit(a, ServerMsg::MatchAborted);
        assert_eq!(hub.connected_count(), 0);
    }
}
