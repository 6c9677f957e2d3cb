//! Request handlers.

pub mod basic;
pub mod control;
pub mod ping;
pub mod status;

pub use crate::server::ServerState;
