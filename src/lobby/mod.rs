//! Identities and room management
//!
//! Handles identity reconciliation across reconnects and capacity-bounded
//! assignment of identities to arenas.

pub mod identity;
pub mod manager;
pub mod room;
