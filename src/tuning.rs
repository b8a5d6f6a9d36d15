//! Gameplay tuning
//!
//! Every number the simulation reacts to that is not part of the collision
//! contract lives here. Files may be partial: missing keys take the defaults.

use std::path::Path;

use anyhow::Context;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Gameplay constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Avatar ===
    /// Horizontal run speed (tiles/s)
    pub avatar_speed: f32,
    /// Speed multiplier while small
    pub small_speed_factor: f32,
    /// Speed multiplier while large
    pub large_speed_factor: f32,
    /// Jump launch speed (tiles/s)
    pub jump_speed: f32,
    /// Ticks between jumps
    pub jump_cooldown_ticks: u32,
    /// Ticks a size change lasts before reverting to normal
    pub size_duration_ticks: u32,
    /// Fixture scale while small
    pub small_scale: f32,
    /// Fixture scale while large
    pub large_scale: f32,
    /// Avatar half extents at normal size
    pub avatar_half_extents: Vec2,

    // === Contact reactions ===
    /// Vertical velocity below which a landing crushes (negative: falling)
    pub max_velocity_to_crush: f32,
    /// Upward speed given to the avatar after smashing a cup
    pub crush_push: f32,
    /// Upward speed given to a small avatar by jello
    pub avatar_bounce: f32,
    /// Velocity given to a companion by jello (x is applied in its walking direction)
    pub kid_bounce: Vec2,

    // === Companions ===
    pub kid_speed: f32,
    pub kid_jump_speed: f32,
    /// Companions stop walking when this close to the avatar
    pub kid_follow_gap: f32,
    pub kid_jump_delay_min: u32,
    pub kid_jump_delay_max: u32,
    pub kid_half_extents: Vec2,

    // === Hazards ===
    /// Blender advance speed (tiles/s)
    pub blender_speed: f32,
    /// Ticks of spiral before a blended character dies regardless
    pub blend_duration_ticks: u32,
    /// Pull strength toward the blade while blended
    pub blend_pull: f32,

    // === Props ===
    pub jello_smush_frames: u32,
    pub cup_smash_frames: u32,
    /// Moveable platform travel speed (tiles/s)
    pub platform_speed: f32,
    /// Separation tolerance for the platform open/closed thresholds
    pub platform_epsilon: f32,

    // === Flow ===
    /// Frames shown on the win/lose screen before the level resets
    pub countdown_ticks: u32,
    /// Visible world width used for camera scrolling
    pub view_width: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            avatar_speed: 6.0,
            small_speed_factor: 1.3,
            large_speed_factor: 0.7,
            jump_speed: 12.0,
            jump_cooldown_ticks: 20,
            size_duration_ticks: 300,
            small_scale: 0.6,
            large_scale: 1.6,
            avatar_half_extents: Vec2::new(0.4, 0.5),

            max_velocity_to_crush: -6.0,
            crush_push: 3.0,
            avatar_bounce: 14.0,
            kid_bounce: Vec2::new(2.5, 14.0),

            kid_speed: 4.0,
            kid_jump_speed: 10.0,
            kid_follow_gap: 1.5,
            kid_jump_delay_min: 90,
            kid_jump_delay_max: 240,
            kid_half_extents: Vec2::new(0.3, 0.35),

            blender_speed: 1.0,
            blend_duration_ticks: 90,
            blend_pull: 3.0,

            jello_smush_frames: 30,
            cup_smash_frames: 20,
            platform_speed: 2.0,
            platform_epsilon: 0.05,

            countdown_ticks: 120,
            view_width: 16.0,
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON (missing keys keep their defaults)
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let tuning: Tuning = serde_json::from_str(json).context("invalid tuning JSON")?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load tuning from a file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tuning file {}", path.display()))?;
        let tuning = Self::from_json(&json)
            .with_context(|| format!("failed to load tuning from {}", path.display()))?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.max_velocity_to_crush < 0.0,
            "max_velocity_to_crush must be negative (a falling speed), got {}",
            self.max_velocity_to_crush
        );
        anyhow::ensure!(
            self.kid_jump_delay_min <= self.kid_jump_delay_max,
            "kid_jump_delay_min ({}) exceeds kid_jump_delay_max ({})",
            self.kid_jump_delay_min,
            self.kid_jump_delay_max
        );
        anyhow::ensure!(
            self.small_scale > 0.0 && self.large_scale > 0.0,
            "size scales must be positive"
        );
        Ok(())
    }
}
