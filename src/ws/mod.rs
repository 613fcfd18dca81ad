//! WebSocket transport: wire protocol, connection hub and socket handler

pub mod handler;
pub mod hub;
pub mod protocol;

pub use hub::ConnectionHub;
