//! Gameplay and simulation constants
//!
//! Tunables that are not exposed through `ServerConfig` live here,
//! grouped by the system that reads them.

/// Simulation clock constants
pub mod sim {
    /// Default server tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Tick duration in milliseconds (integer arena clock)
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Maximum speed of any body in world units per second
    pub const MAX_VELOCITY: f32 = 900.0;
    /// Velocity drag per second (fraction retained is `1 - DRAG * dt`)
    pub const DRAG: f32 = 0.35;
}

/// Ship resource limits and thermal model
pub mod ship {
    pub const MAX_INTEGRITY: f32 = 100.0;
    pub const MAX_FUEL: f32 = 100.0;
    pub const MAX_AMMO: f32 = 100.0;
    /// Resting temperature, coolant can never push a ship below this
    pub const AMBIENT_TEMPERATURE: f32 = 20.0;
    /// Above this temperature the hull takes overheat damage
    pub const SAFE_TEMPERATURE: f32 = 100.0;
    /// Passive cooling in degrees per second
    pub const COOLING_PER_SECOND: f32 = 12.0;
    /// Overheat damage per degree above `SAFE_TEMPERATURE` per second
    pub const OVERHEAT_DAMAGE_PER_DEGREE_SECOND: f32 = 0.05;
    /// Collision radius used when registering ships with the physics service
    pub const RADIUS: f32 = 24.0;
    /// Minimum closing speed for a ship-ship contact to deal ramming damage
    pub const RAM_MIN_SPEED: f32 = 60.0;
    /// Ramming damage per unit of closing speed
    pub const RAM_DAMAGE_FACTOR: f32 = 0.05;
}

/// Attachment slot ring and module tuning
pub mod attachment {
    /// Number of directional slots around a ship
    pub const SLOT_COUNT: usize = 8;
    /// Angular spacing between slots in degrees
    pub const SLOT_ANGLE: f32 = 360.0 / SLOT_COUNT as f32;
    /// Debounce window for slot rotation
    pub const ROTATION_DELAY_MS: u64 = 100;
    /// Speed added along the heading when an attachment is thrown
    pub const THROW_FORCE: f32 = 360.0;
    /// How long a thrown attachment stays "thrown" (no re-pickup, deals impact damage)
    pub const THROWN_GRACE_MS: u64 = 1_500;
    /// Damage dealt to a ship struck by a thrown attachment
    pub const THROWN_ATTACHMENT_DAMAGE: f32 = 15.0;
    /// Floating attachments nobody picks up are removed after this long
    pub const FLOATING_TTL_MS: u64 = 30_000;
    pub const MAX_INTEGRITY: f32 = 60.0;
    pub const RADIUS: f32 = 10.0;

    /// Thruster tuning
    pub mod thruster {
        /// Acceleration in world units per second squared
        pub const THRUST: f32 = 160.0;
        pub const FUEL_PER_SECOND: f32 = 4.0;
        pub const HEAT_PER_SECOND: f32 = 3.0;
    }

    /// Cannon tuning
    pub mod cannon {
        pub const DAMAGE: f32 = 40.0;
        pub const COOLDOWN_MS: u64 = 800;
        pub const BULLET_SPEED: f32 = 520.0;
        pub const HEAT_PER_SHOT: f32 = 9.0;
        pub const AMMO_PER_SHOT: f32 = 2.0;
    }

    /// Machine gun tuning
    pub mod machine_gun {
        pub const DAMAGE: f32 = 8.0;
        pub const COOLDOWN_MS: u64 = 120;
        pub const BULLET_SPEED: f32 = 720.0;
        pub const HEAT_PER_SHOT: f32 = 2.0;
        pub const AMMO_PER_SHOT: f32 = 1.0;
    }
}

/// Projectile constants
pub mod bullet {
    pub const LIFETIME_MS: u64 = 2_000;
    pub const RADIUS: f32 = 3.0;
    /// Bullets spawn this far outside the hull so they never start inside their owner
    pub const MUZZLE_OFFSET: f32 = super::ship::RADIUS + 6.0;
}

/// Loot ejected when a ship is destroyed
pub mod supply {
    /// Largest amount of ammo a single container carries
    pub const MAX_AMMO: f32 = 25.0;
    /// Largest amount of fuel a single container carries
    pub const MAX_FUEL: f32 = 25.0;
    /// Temperature removed by a coolant container
    pub const COOLANT_AMOUNT: f32 = 40.0;
    /// Integrity restored by a repairs container
    pub const REPAIRS_AMOUNT: f32 = 30.0;
    /// Remainders smaller than this are not worth a container
    pub const MIN_AMOUNT: f32 = 1.0;
    /// Delay until a supply starts flickering
    pub const FLICKER_AFTER_MS: u64 = 15_000;
    /// Delay between flickering and unconditional removal
    pub const REMOVE_AFTER_MS: u64 = 3_000;
    /// Maximum scatter speed given to ejected containers
    pub const SCATTER_SPEED: f32 = 40.0;
    pub const RADIUS: f32 = 12.0;
}

/// Wire limits
pub mod net {
    /// Maximum framed message size
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Capacity of the inbound message queue between transport and simulation
    pub const INBOUND_QUEUE_CAPACITY: usize = 4096;
    /// Frames buffered per connection before new ones are dropped
    pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
}

/// Identity validation limits
pub mod identity {
    pub const MAX_FINGERPRINT_LEN: usize = 64;
    pub const MAX_NAME_LEN: usize = 16;
}
