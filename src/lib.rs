//! Pineapple - collision rules and level lifecycle for a side-scrolling platformer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (contact classification, entity models, level bookkeeping)
//! - `tuning`: Data-driven gameplay constants
//!
//! Rendering, audio and input polling live outside this crate. The simulation talks
//! to them through the [`sim::SceneGraph`] and [`sim::PhysicsWorld`] seams and the
//! [`sim::GameEvent`] queue.

pub mod sim;
pub mod tuning;

pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// World gravity in tiles/s² (y axis points up)
    pub const GRAVITY: f32 = -30.0;

    /// Number of companion slots in every level
    pub const KID_COUNT: usize = 4;

    /// Z-order bands. Callers must stay inside a band to keep draw order correct:
    /// behind-walls < walls < obstacles < characters.
    pub const Z_BEHIND_WALLS: i32 = 0;
    pub const Z_WALLS: i32 = 10;
    pub const Z_OBSTACLES: i32 = 20;
    pub const Z_CHARACTERS: i32 = 30;

    /// Collision filter categories
    pub const CATEGORY_DEFAULT: u16 = 0x0001;
    pub const CATEGORY_AVATAR: u16 = 0x0002;
    pub const CATEGORY_KID: u16 = 0x0004;
    pub const CATEGORY_HAZARD: u16 = 0x0008;

    /// Collision filter masks
    pub const MASK_ALL: u16 = 0xFFFF;
    /// Companions never touch the avatar directly
    pub const MASK_KID: u16 = !CATEGORY_AVATAR;
    /// Hazards only see the characters, never walls
    pub const MASK_HAZARD: u16 = CATEGORY_AVATAR | CATEGORY_KID;
    /// A blended character only keeps touching hazards (so the blade can finish it)
    pub const MASK_BLENDED: u16 = CATEGORY_HAZARD;

    /// Overlap tolerance for resting contacts
    pub const CONTACT_SLOP: f32 = 0.01;
}
