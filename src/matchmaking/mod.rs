//! Matchmaking: the waiting slot, the match coordinator and its service task

pub mod matchmaker;
pub mod queue;
pub mod service;

pub use matchmaker::{
    EnqueueOutcome, MatchAction, Matchmaker, MatchmakerSettings, MatchmakingStats,
};
pub use service::{MatchmakingHandle, MatchmakingService};
