//! Entity models
//!
//! Per-kind gameplay state layered over a physics [`Body`]. The closed
//! [`ObstacleKind`] union replaces tag-and-cast identification: every place
//! that needs the concrete kind matches on it.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, FixtureRef, ObstacleId};
use super::class::CollisionClass;
use crate::tuning::Tuning;

/// Avatar size state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AvatarSize {
    Small,
    #[default]
    Normal,
    Large,
}

impl AvatarSize {
    /// Fixture scale relative to normal size
    pub fn scale(self, tuning: &Tuning) -> f32 {
        match self {
            AvatarSize::Small => tuning.small_scale,
            AvatarSize::Normal => 1.0,
            AvatarSize::Large => tuning.large_scale,
        }
    }

    pub fn speed_factor(self, tuning: &Tuning) -> f32 {
        match self {
            AvatarSize::Small => tuning.small_speed_factor,
            AvatarSize::Normal => 1.0,
            AvatarSize::Large => tuning.large_speed_factor,
        }
    }
}

/// The player-controlled pineapple ("Will")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Avatar {
    pub size: AvatarSize,
    /// Ticks left before the size reverts to normal
    pub size_ticks: u32,
    /// Set on the tick the size changed; switch contacts are ignored meanwhile
    pub size_changed_this_frame: bool,
    pub grounded: bool,
    /// Ground fixtures currently under the foot sensor
    pub ground_fixtures: BTreeSet<FixtureRef>,
    pub jump_cooldown: u32,
    pub reached_goal: bool,
    pub colliding_with_jello: bool,
    pub colliding_with_switch: bool,
    pub blended: bool,
    pub blend_ticks: u32,
    pub dead: bool,
}

impl Avatar {
    pub fn is_small(&self) -> bool {
        self.size == AvatarSize::Small
    }

    pub fn is_large(&self) -> bool {
        self.size == AvatarSize::Large
    }

    /// Request a size change. Asking for the opposite extreme first returns to
    /// normal. Returns the previous size if the size actually changed.
    pub fn request_size(&mut self, target: AvatarSize, duration: u32) -> Option<AvatarSize> {
        let previous = self.size;
        let next = match (previous, target) {
            (AvatarSize::Small, AvatarSize::Large) | (AvatarSize::Large, AvatarSize::Small) => {
                AvatarSize::Normal
            }
            _ => target,
        };

        self.size_ticks = if next == AvatarSize::Normal { 0 } else { duration };
        if next == previous {
            return None;
        }
        self.size = next;
        self.size_changed_this_frame = true;
        Some(previous)
    }

    /// Count down the size timer. Returns the previous size when it reverts.
    pub fn tick_size(&mut self) -> Option<AvatarSize> {
        if self.size == AvatarSize::Normal {
            return None;
        }
        self.size_ticks = self.size_ticks.saturating_sub(1);
        if self.size_ticks > 0 {
            return None;
        }
        let previous = self.size;
        self.size = AvatarSize::Normal;
        self.size_changed_this_frame = true;
        Some(previous)
    }

    pub fn begin_ground(&mut self, fixture: FixtureRef) {
        self.ground_fixtures.insert(fixture);
        self.grounded = true;
    }

    /// Grounding only clears once no ground fixture is left
    pub fn end_ground(&mut self, fixture: FixtureRef) {
        self.ground_fixtures.remove(&fixture);
        if self.ground_fixtures.is_empty() {
            self.grounded = false;
        }
    }

    pub fn can_jump(&self) -> bool {
        self.grounded && self.jump_cooldown == 0 && !self.blended && !self.dead
    }
}

/// An AI companion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Kid {
    /// Slot in [0, KID_COUNT)
    pub index: usize,
    pub grounded: bool,
    pub ground_fixtures: BTreeSet<FixtureRef>,
    pub reached_goal: bool,
    pub colliding_with_jello: bool,
    pub blended: bool,
    pub blend_ticks: u32,
    /// Stuck on spikes; stays in the level until something finishes it
    pub impaled: bool,
    pub dead: bool,
    /// Ticks until the next hop
    pub jump_delay: u32,
    /// Last walking direction (-1 or 1)
    pub facing: f32,
}

impl Kid {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            facing: 1.0,
            ..Default::default()
        }
    }

    pub fn begin_ground(&mut self, fixture: FixtureRef) {
        self.ground_fixtures.insert(fixture);
        self.grounded = true;
    }

    pub fn end_ground(&mut self, fixture: FixtureRef) {
        self.ground_fixtures.remove(&fixture);
        if self.ground_fixtures.is_empty() {
            self.grounded = false;
        }
    }

    /// Whether the AI still walks this companion around
    pub fn is_active(&self) -> bool {
        !(self.impaled || self.blended || self.reached_goal || self.dead)
    }
}

/// The chasing blender. Its main fixture is the non-lethal body; the blade
/// fixture kills on touch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blender {
    /// Whether it is currently advancing
    pub running: bool,
}

/// Bouncy jello block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jello {
    /// Being squished by a heavy landing
    pub smushing: bool,
    pub anim_frame: u32,
}

/// Crushable cup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cup {
    /// Tile the cup sits in (column, row); stacked cups share a column
    pub tile: (i32, i32),
    pub smashing: bool,
    pub smashed: bool,
    /// Lost its support and has not landed yet
    pub falling: bool,
    pub anim_frame: u32,
}

impl Cup {
    pub fn new(tile: (i32, i32)) -> Self {
        Self {
            tile,
            ..Default::default()
        }
    }

    /// Whether `other` sits somewhere above this cup in the same column
    pub fn supports(&self, other: &Cup) -> bool {
        other.tile.0 == self.tile.0 && other.tile.1 > self.tile.1
    }
}

/// Switch (sticky toggle) or button (momentary) linked to platforms by color
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonSwitch {
    /// Switch toggles on every new touch; a button is only active while held
    pub is_switch: bool,
    pub pressed: bool,
    /// Color tag matched against platform colors at load time
    pub color: String,
    /// Platforms resolved from the color at load time
    pub linked: Vec<ObstacleId>,
    /// Fixtures currently touching; a touch only counts once
    pub touching: BTreeSet<FixtureRef>,
}

impl ButtonSwitch {
    pub fn new(is_switch: bool, color: impl Into<String>) -> Self {
        Self {
            is_switch,
            color: color.into(),
            ..Default::default()
        }
    }

    pub fn is_button(&self) -> bool {
        !self.is_switch
    }

    /// Register a touch. Returns true if the press state changed.
    pub fn start_contact(&mut self, toucher: FixtureRef) -> bool {
        if !self.touching.insert(toucher) {
            return false;
        }
        if self.is_switch {
            self.pressed = !self.pressed;
            true
        } else if self.touching.len() == 1 {
            self.pressed = true;
            true
        } else {
            false
        }
    }

    /// Release a touch. Returns true if the press state changed.
    pub fn end_contact(&mut self, toucher: FixtureRef) -> bool {
        if !self.touching.remove(&toucher) {
            return false;
        }
        if self.is_button() && self.touching.is_empty() && self.pressed {
            self.pressed = false;
            return true;
        }
        false
    }
}

/// Moveable platform states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlatformState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// A bridge/door that slides between its closed anchor and an open offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveablePlatform {
    pub state: PlatformState,
    pub color: String,
    /// Closed position
    pub anchor: Vec2,
    /// Travel distance when fully open
    pub length: f32,
    pub vertical: bool,
}

impl MoveablePlatform {
    pub fn new(color: impl Into<String>, anchor: Vec2, length: f32, vertical: bool) -> Self {
        Self {
            state: PlatformState::Closed,
            color: color.into(),
            anchor,
            length,
            vertical,
        }
    }

    pub fn direction(&self) -> Vec2 {
        if self.vertical { Vec2::Y } else { Vec2::X }
    }

    pub fn open_position(&self) -> Vec2 {
        self.anchor + self.direction() * self.length
    }

    pub fn is_open(&self) -> bool {
        self.state == PlatformState::Open
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            PlatformState::Closed | PlatformState::Closing => PlatformState::Opening,
            PlatformState::Open | PlatformState::Opening => PlatformState::Closing,
        };
    }

    /// Advance the state machine from the measured position and return the
    /// velocity the body should move with this tick.
    pub fn update(&mut self, pos: Vec2, speed: f32, epsilon: f32, dt: f32) -> Vec2 {
        let separation = (pos - self.anchor).length();
        let dir = self.direction();
        match self.state {
            PlatformState::Opening => {
                let remaining = self.length - separation;
                if remaining <= epsilon {
                    self.state = PlatformState::Open;
                    Vec2::ZERO
                } else {
                    dir * speed.min(remaining / dt)
                }
            }
            PlatformState::Closing => {
                if separation <= epsilon {
                    self.state = PlatformState::Closed;
                    Vec2::ZERO
                } else {
                    -dir * speed.min(separation / dt)
                }
            }
            PlatformState::Open | PlatformState::Closed => Vec2::ZERO,
        }
    }
}

/// Closed union of every obstacle kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObstacleKind {
    Wall,
    Goal,
    Avatar(Avatar),
    Kid(Kid),
    Jello(Jello),
    Cup(Cup),
    Spikes,
    Blender(Blender),
    ButtonSwitch(ButtonSwitch),
    /// Moveable platforms are solid like walls
    Platform(MoveablePlatform),
}

impl ObstacleKind {
    pub fn class(&self) -> CollisionClass {
        match self {
            ObstacleKind::Wall | ObstacleKind::Platform(_) => CollisionClass::Wall,
            ObstacleKind::Goal => CollisionClass::Goal,
            ObstacleKind::Avatar(_) => CollisionClass::Pineapple,
            ObstacleKind::Kid(_) => CollisionClass::Kid,
            ObstacleKind::Jello(_) => CollisionClass::Jello,
            ObstacleKind::Cup(_) => CollisionClass::Cup,
            ObstacleKind::Spikes => CollisionClass::Spikes,
            ObstacleKind::Blender(_) => CollisionClass::Blender,
            ObstacleKind::ButtonSwitch(_) => CollisionClass::ButtonSwitch,
        }
    }
}

/// A game object: body, kind, and scene bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    /// Debug name ("will", "kid2", "wall7", ...)
    pub name: String,
    pub body: Body,
    pub kind: ObstacleKind,
    /// Texture key; obstacles without one only get a debug node
    pub texture: Option<String>,
    pub z_order: i32,
    /// Logically dead; the slot is freed on the next garbage collection
    pub removed: bool,
}

impl Obstacle {
    pub fn new(name: impl Into<String>, body: Body, kind: ObstacleKind) -> Self {
        Self {
            id: ObstacleId {
                index: u32::MAX,
                generation: 0,
            },
            name: name.into(),
            body,
            kind,
            texture: None,
            z_order: 0,
            removed: false,
        }
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn class(&self) -> CollisionClass {
        self.kind.class()
    }

    pub fn has_visual(&self) -> bool {
        self.texture.is_some()
    }

    pub fn as_avatar(&self) -> Option<&Avatar> {
        match &self.kind {
            ObstacleKind::Avatar(avatar) => Some(avatar),
            _ => None,
        }
    }

    pub fn as_avatar_mut(&mut self) -> Option<&mut Avatar> {
        match &mut self.kind {
            ObstacleKind::Avatar(avatar) => Some(avatar),
            _ => None,
        }
    }

    pub fn as_kid(&self) -> Option<&Kid> {
        match &self.kind {
            ObstacleKind::Kid(kid) => Some(kid),
            _ => None,
        }
    }

    pub fn as_kid_mut(&mut self) -> Option<&mut Kid> {
        match &mut self.kind {
            ObstacleKind::Kid(kid) => Some(kid),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&ButtonSwitch> {
        match &self.kind {
            ObstacleKind::ButtonSwitch(switch) => Some(switch),
            _ => None,
        }
    }

    pub fn as_switch_mut(&mut self) -> Option<&mut ButtonSwitch> {
        match &mut self.kind {
            ObstacleKind::ButtonSwitch(switch) => Some(switch),
            _ => None,
        }
    }

    pub fn as_platform(&self) -> Option<&MoveablePlatform> {
        match &self.kind {
            ObstacleKind::Platform(platform) => Some(platform),
            _ => None,
        }
    }

    pub fn as_cup(&self) -> Option<&Cup> {
        match &self.kind {
            ObstacleKind::Cup(cup) => Some(cup),
            _ => None,
        }
    }
}
