//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::{Matchmaker, MatchmakerSettings, MatchmakingHandle, MatchmakingService};
use crate::ws::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<ConnectionHub>,
    pub matchmaking: MatchmakingHandle,
}

impl AppState {
    /// Build the state together with the matchmaking service that still has to be spawned
    pub fn new(config: Config) -> (Self, MatchmakingService) {
        let config = Arc::new(config);

        // Initialize connection hub, also the matchmaker's emitter
        let hub = Arc::new(ConnectionHub::new());

        // Initialize matchmaker
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let matchmaker = Matchmaker::new(
            Arc::new(config.layout.clone()),
            seed,
            hub.clone(),
            MatchmakerSettings {
                requeue_on_abort: config.requeue_on_abort,
                max_chat_len: config.max_chat_len,
            },
        );
        let (service, matchmaking) = MatchmakingService::new(matchmaker);

        let state = Self {
            config,
            hub,
            matchmaking,
        };
        (state, service)
    }
}
