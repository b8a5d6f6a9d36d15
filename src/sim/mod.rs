//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (slot order, ordered sets)
//! - No rendering or platform dependencies: the physics engine and the scene
//!   graph are reached through the [`PhysicsWorld`] and [`SceneGraph`] seams

pub mod body;
pub mod class;
pub mod collision;
pub mod level;
pub mod loader;
pub mod models;
pub mod scene;
pub mod tick;
pub mod world;

pub use body::{Aabb, Body, BodyType, Fixture, FixtureKind, FixtureRef, ObstacleId};
pub use class::{CollisionClass, Filter};
pub use collision::CollisionController;
pub use level::{GameEvent, Level, SoundEffect};
pub use loader::LevelSpec;
pub use models::{
    Avatar, AvatarSize, Blender, ButtonSwitch, Cup, Jello, Kid, MoveablePlatform, Obstacle,
    ObstacleKind, PlatformState,
};
pub use scene::{Layer, NullScene, SceneGraph, SceneLog};
pub use tick::{Game, GamePhase, TickInput, check_victory};
pub use world::{Contact, ContactListener, KinematicWorld, PhysicsWorld};
