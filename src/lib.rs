//! Salvage Arena Server Library
//!
//! Authoritative backend for a multiplayer arena shooter: ships fight, break
//! apart into salvage, and bolt the salvage back on. Clients speak JSON over
//! a WebTransport stream.
//!
//! - [`lobby`] reconciles identities across reconnects and assigns them to arenas
//! - [`game`] holds the per-arena simulation
//! - [`net`] carries the gateway, the connection hub and the transport

pub mod config;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod net;
pub mod util;
