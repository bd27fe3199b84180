pub mod arena;
pub mod attachment;
pub mod combat;
pub mod constants;
pub mod map;
pub mod physics;
pub mod registry;
pub mod scheduler;
pub mod slots;
pub mod spatial;
pub mod state;
pub mod timers;
