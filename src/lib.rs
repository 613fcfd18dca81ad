//! Grid Duel Server - authoritative matchmaking and match coordinator
//! for two-player hidden-grid duels.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod testing;
pub mod util;
pub mod ws;
