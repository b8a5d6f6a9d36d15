//! Level aggregate
//!
//! The level owns every obstacle of the current stage in generation-tagged
//! slots. Killing an obstacle is immediate for gameplay (references cleared,
//! scene nodes removed) but the slot and the physics body are only released by
//! [`Level::garbage_collect`] after the physics step, so contacts still being
//! reported during the step never see a reused slot.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Aabb, BodyType, FixtureKind, FixtureRef, ObstacleId};
use super::class::CollisionClass;
use super::models::{Avatar, Cup, Kid, Obstacle, ObstacleKind};
use super::scene::{Layer, SceneGraph};
use super::world::PhysicsWorld;
use crate::consts::{CONTACT_SLOP, KID_COUNT};

/// Sounds the level asks the audio layer to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundEffect {
    Jump,
    Grow,
    Shrink,
    /// Jello squished by a heavy landing
    Squish,
    /// Cup smashed
    Crush,
    Bounce,
    /// Killed by the blade
    Splat,
    /// Spikes
    Impale,
    /// Caught by the blender body
    Blend,
    /// Switch or button changed state
    Click,
    Victory,
    Failure,
}

/// Things that happened during a tick, for audio/HUD consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Sound(SoundEffect),
    Died { id: ObstacleId, class: CollisionClass },
    Blended(ObstacleId),
    GoalReached(ObstacleId),
    PlatformToggled(ObstacleId),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    obstacle: Option<Obstacle>,
}

/// All entities of one loaded level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    /// Level extent along x (world units)
    pub length: f32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    avatar: Option<ObstacleId>,
    kids: [Option<ObstacleId>; KID_COUNT],
    goal: Option<ObstacleId>,
    blender: Option<ObstacleId>,
    walls: Vec<ObstacleId>,
    platforms: Vec<ObstacleId>,
    spikes: Vec<ObstacleId>,
    jellos: Vec<ObstacleId>,
    cups: Vec<ObstacleId>,
    switches: Vec<ObstacleId>,
    kids_remaining: usize,
    failed: bool,
    pending_removal: Vec<ObstacleId>,
    events: Vec<GameEvent>,
}

impl Level {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
            slots: Vec::new(),
            free: Vec::new(),
            avatar: None,
            kids: [None; KID_COUNT],
            goal: None,
            blender: None,
            walls: Vec::new(),
            platforms: Vec::new(),
            spikes: Vec::new(),
            jellos: Vec::new(),
            cups: Vec::new(),
            switches: Vec::new(),
            kids_remaining: 0,
            failed: false,
            pending_removal: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Register an obstacle with the physics world and insert its visual and
    /// debug nodes at `z_order`.
    ///
    /// Panics on a second avatar, goal or blender, or on a companion index that
    /// is out of range or already taken: levels are populated once by the loader.
    pub fn add_obstacle(
        &mut self,
        mut obstacle: Obstacle,
        z_order: i32,
        world: &mut dyn PhysicsWorld,
        scene: &mut dyn SceneGraph,
    ) -> ObstacleId {
        let id = self.allocate();

        match &obstacle.kind {
            ObstacleKind::Avatar(_) => {
                assert!(self.avatar.is_none(), "level {} already has an avatar", self.name);
                self.avatar = Some(id);
            }
            ObstacleKind::Kid(kid) => {
                assert!(
                    kid.index < KID_COUNT,
                    "companion index {} exceeds the {KID_COUNT} slots",
                    kid.index
                );
                assert!(
                    self.kids[kid.index].is_none(),
                    "companion slot {} is already taken",
                    kid.index
                );
                self.kids[kid.index] = Some(id);
                self.kids_remaining += 1;
            }
            ObstacleKind::Goal => {
                assert!(self.goal.is_none(), "level {} already has a goal", self.name);
                self.goal = Some(id);
            }
            ObstacleKind::Blender(_) => {
                assert!(self.blender.is_none(), "level {} already has a blender", self.name);
                self.blender = Some(id);
            }
            ObstacleKind::Wall => self.walls.push(id),
            ObstacleKind::Platform(_) => self.platforms.push(id),
            ObstacleKind::Spikes => self.spikes.push(id),
            ObstacleKind::Jello(_) => self.jellos.push(id),
            ObstacleKind::Cup(_) => self.cups.push(id),
            ObstacleKind::ButtonSwitch(_) => self.switches.push(id),
        }

        obstacle.id = id;
        obstacle.z_order = z_order;
        obstacle.removed = false;

        world.add_body(id, &obstacle.body);
        if obstacle.has_visual() {
            scene.insert(&obstacle, Layer::World, z_order);
        }
        scene.insert(&obstacle, Layer::Debug, z_order);

        log::trace!("Added {} as {id} at z={z_order}", obstacle.name);
        self.slots[id.index as usize].obstacle = Some(obstacle);
        id
    }

    fn allocate(&mut self) -> ObstacleId {
        if let Some(index) = self.free.pop() {
            let slot = &self.slots[index as usize];
            return ObstacleId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::default());
        ObstacleId {
            index,
            generation: 0,
        }
    }

    /// Resolve a handle, including obstacles killed but not yet collected
    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.obstacle.as_ref())
    }

    pub fn get_mut(&mut self, id: ObstacleId) -> Option<&mut Obstacle> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.obstacle.as_mut())
    }

    /// Resolve a handle to an obstacle that is still in play
    pub fn live(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.get(id).filter(|obstacle| !obstacle.removed)
    }

    pub fn live_mut(&mut self, id: ObstacleId) -> Option<&mut Obstacle> {
        self.get_mut(id).filter(|obstacle| !obstacle.removed)
    }

    pub fn class_of(&self, id: ObstacleId) -> Option<CollisionClass> {
        self.live(id).map(Obstacle::class)
    }

    /// Every obstacle still in play, in slot order
    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.slots
            .iter()
            .filter_map(|slot| slot.obstacle.as_ref())
            .filter(|obstacle| !obstacle.removed)
    }

    pub fn avatar(&self) -> Option<ObstacleId> {
        self.avatar
    }

    pub fn avatar_model(&self) -> Option<&Avatar> {
        self.avatar
            .and_then(|id| self.live(id))
            .and_then(Obstacle::as_avatar)
    }

    pub fn kid(&self, index: usize) -> Option<ObstacleId> {
        self.kids.get(index).copied().flatten()
    }

    pub fn kid_model(&self, index: usize) -> Option<&Kid> {
        self.kid(index)
            .and_then(|id| self.live(id))
            .and_then(Obstacle::as_kid)
    }

    /// Handles of the companions still in the level
    pub fn kids(&self) -> impl Iterator<Item = ObstacleId> + '_ {
        self.kids.iter().flatten().copied()
    }

    pub fn goal(&self) -> Option<ObstacleId> {
        self.goal
    }

    pub fn blender(&self) -> Option<ObstacleId> {
        self.blender
    }

    pub fn walls(&self) -> &[ObstacleId] {
        &self.walls
    }

    pub fn platforms(&self) -> &[ObstacleId] {
        &self.platforms
    }

    pub fn spikes(&self) -> &[ObstacleId] {
        &self.spikes
    }

    pub fn jellos(&self) -> &[ObstacleId] {
        &self.jellos
    }

    pub fn cups(&self) -> &[ObstacleId] {
        &self.cups
    }

    pub fn switches(&self) -> &[ObstacleId] {
        &self.switches
    }

    pub fn num_kids_remaining(&self) -> usize {
        self.kids_remaining
    }

    pub fn have_failed(&self) -> bool {
        self.failed
    }

    /// Number of obstacles waiting for garbage collection
    pub fn pending_removals(&self) -> usize {
        self.pending_removal.len()
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn play(&mut self, sound: SoundEffect) {
        self.events.push(GameEvent::Sound(sound));
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take an obstacle out of play.
    ///
    /// Removes its scene nodes, clears the level's reference to it and queues
    /// the body for garbage collection. Killing the avatar fails the level;
    /// killing the last companion fails it too. Returns false if the obstacle
    /// was already gone.
    pub fn kill(&mut self, id: ObstacleId, scene: &mut dyn SceneGraph) -> bool {
        let Some(obstacle) = self.live_mut(id) else {
            log::debug!("Ignoring kill of {id}: already removed");
            return false;
        };

        obstacle.removed = true;
        match &mut obstacle.kind {
            ObstacleKind::Avatar(avatar) => avatar.dead = true,
            ObstacleKind::Kid(kid) => kid.dead = true,
            _ => {}
        }
        if obstacle.has_visual() {
            scene.remove(id, Layer::World);
        }
        scene.remove(id, Layer::Debug);

        let class = obstacle.class();
        let name = obstacle.name.clone();
        let kid_index = obstacle.as_kid().map(|kid| kid.index);
        self.pending_removal.push(id);

        match class {
            CollisionClass::Pineapple => {
                self.avatar = None;
                self.failed = true;
                log::info!("{name} died, level {} failed", self.name);
            }
            CollisionClass::Kid => {
                if let Some(index) = kid_index {
                    if self.kids[index] == Some(id) {
                        self.kids[index] = None;
                    }
                }
                self.kids_remaining = self.kids_remaining.saturating_sub(1);
                log::info!("{name} died, {} companions remaining", self.kids_remaining);
                if self.kids_remaining == 0 {
                    self.failed = true;
                    log::info!("No companions left, level {} failed", self.name);
                }
            }
            CollisionClass::Goal => self.goal = None,
            CollisionClass::Blender => self.blender = None,
            CollisionClass::Wall => {
                self.walls.retain(|other| *other != id);
                self.platforms.retain(|other| *other != id);
            }
            CollisionClass::Spikes => self.spikes.retain(|other| *other != id),
            CollisionClass::Jello => self.jellos.retain(|other| *other != id),
            CollisionClass::Cup => self.cups.retain(|other| *other != id),
            CollisionClass::ButtonSwitch => self.switches.retain(|other| *other != id),
            CollisionClass::Unassigned => {}
        }

        if class.is_character() {
            self.release_switches(id);
            self.push_event(GameEvent::Died { id, class });
        }
        true
    }

    /// End every switch touch held by `id`. The world only reports those
    /// contacts once the body is collected, when the handle no longer resolves.
    fn release_switches(&mut self, id: ObstacleId) {
        for switch_id in self.switches.clone() {
            let held: Vec<FixtureRef> = self
                .live(switch_id)
                .and_then(Obstacle::as_switch)
                .map(|switch| {
                    switch
                        .touching
                        .iter()
                        .filter(|toucher| toucher.obstacle == id)
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            for toucher in held {
                self.switch_end_contact(switch_id, toucher);
            }
        }
    }

    /// Spike death
    pub fn spike_and_kill(&mut self, id: ObstacleId, scene: &mut dyn SceneGraph) -> bool {
        let killed = self.kill(id, scene);
        if killed {
            self.play(SoundEffect::Impale);
        }
        killed
    }

    /// Blade death
    pub fn blend_and_kill(&mut self, id: ObstacleId, scene: &mut dyn SceneGraph) -> bool {
        let killed = self.kill(id, scene);
        if killed {
            self.play(SoundEffect::Splat);
        }
        killed
    }

    /// Commit a character to the blender spiral: it stops colliding with
    /// anything but hazards. Returns false if it was already blended.
    pub fn blend(&mut self, id: ObstacleId) -> bool {
        let Some(obstacle) = self.live_mut(id) else {
            return false;
        };
        let already = match &mut obstacle.kind {
            ObstacleKind::Avatar(avatar) => std::mem::replace(&mut avatar.blended, true),
            ObstacleKind::Kid(kid) => std::mem::replace(&mut kid.blended, true),
            _ => return false,
        };
        if already {
            return false;
        }
        obstacle.body.filter = obstacle.body.filter.blended();
        obstacle.body.gravity_scale = 0.0;
        log::info!("{} caught by the blender", obstacle.name);
        self.play(SoundEffect::Blend);
        self.push_event(GameEvent::Blended(id));
        true
    }

    /// Flip a moveable platform between opening and closing
    pub fn toggle_platform(&mut self, id: ObstacleId) {
        let Some(obstacle) = self.live_mut(id) else {
            log::debug!("Toggle of missing platform {id} ignored");
            return;
        };
        if let ObstacleKind::Platform(platform) = &mut obstacle.kind {
            platform.toggle();
            log::debug!("{} now {:?}", obstacle.name, platform.state);
            self.push_event(GameEvent::PlatformToggled(id));
        }
    }

    /// Resolve switch-to-platform links by color. Called once after loading.
    pub fn link_switches(&mut self) {
        let platforms: Vec<(ObstacleId, String)> = self
            .platforms
            .iter()
            .filter_map(|id| {
                self.live(*id)
                    .and_then(Obstacle::as_platform)
                    .map(|platform| (*id, platform.color.clone()))
            })
            .collect();

        for switch_id in self.switches.clone() {
            let Some(switch) = self.live_mut(switch_id).and_then(Obstacle::as_switch_mut) else {
                continue;
            };
            switch.linked = platforms
                .iter()
                .filter(|(_, color)| *color == switch.color)
                .map(|(id, _)| *id)
                .collect();
            if switch.linked.is_empty() {
                log::debug!("Switch {switch_id} ({}) has no linked platform", switch.color);
            }
        }
    }

    /// A character started touching a button/switch
    pub fn switch_start_contact(&mut self, switch_id: ObstacleId, toucher: FixtureRef) {
        let Some(switch) = self.live_mut(switch_id).and_then(Obstacle::as_switch_mut) else {
            return;
        };
        if !switch.start_contact(toucher) {
            return;
        }
        let linked = switch.linked.clone();
        log::debug!("Switch {switch_id} pressed={}", switch.pressed);
        self.play(SoundEffect::Click);
        for platform in linked {
            self.toggle_platform(platform);
        }
    }

    /// A character stopped touching a button/switch
    pub fn switch_end_contact(&mut self, switch_id: ObstacleId, toucher: FixtureRef) {
        let Some(switch) = self.live_mut(switch_id).and_then(Obstacle::as_switch_mut) else {
            return;
        };
        if !switch.end_contact(toucher) {
            return;
        }
        let linked = switch.linked.clone();
        log::debug!("Button {switch_id} released");
        self.play(SoundEffect::Click);
        for platform in linked {
            self.toggle_platform(platform);
        }
    }

    /// Let every cup stacked on `cup` fall
    pub fn drop_cups_above(&mut self, cup: &Cup) {
        for id in self.cups.clone() {
            let Some(obstacle) = self.live_mut(id) else {
                continue;
            };
            let Obstacle {
                body,
                kind: ObstacleKind::Cup(other),
                ..
            } = obstacle
            else {
                continue;
            };
            if cup.supports(other) {
                other.falling = true;
                body.body_type = BodyType::Dynamic;
                body.gravity_scale = 1.0;
            }
        }
    }

    /// Turn falling cups that came to rest on something solid back into
    /// static blocks. Runs after the physics step.
    pub fn settle_cups(&mut self) {
        let supports: Vec<(ObstacleId, Aabb)> = self
            .obstacles()
            .filter(|obstacle| obstacle.body.body_type != BodyType::Dynamic)
            .filter(|obstacle| {
                obstacle
                    .body
                    .fixture(FixtureKind::Main)
                    .is_some_and(|fixture| !fixture.sensor)
            })
            .map(|obstacle| (obstacle.id, obstacle.body.aabb()))
            .collect();

        for id in self.cups.clone() {
            let Some(Obstacle {
                body,
                kind: ObstacleKind::Cup(cup),
                name,
                ..
            }) = self.live_mut(id)
            else {
                continue;
            };
            if !cup.falling || body.vel.y > 0.0 {
                continue;
            }

            let aabb = body.aabb();
            let half_height = body.half_extents().y;
            let landed_on = supports
                .iter()
                .filter(|(other, _)| *other != id)
                .filter(|(_, below)| {
                    aabb.min.x < below.max.x - CONTACT_SLOP && aabb.max.x > below.min.x + CONTACT_SLOP
                })
                .filter(|(_, below)| {
                    below.max.y >= aabb.min.y - CONTACT_SLOP && below.max.y <= aabb.min.y + half_height
                })
                .map(|(_, below)| below.max.y)
                .reduce(f32::max);
            let Some(top) = landed_on else {
                continue;
            };

            body.pos.y = top + half_height;
            body.vel = Vec2::ZERO;
            body.body_type = BodyType::Static;
            cup.falling = false;
            cup.tile = (body.pos.x.floor() as i32, body.pos.y.floor() as i32);
            log::debug!("{name} landed at {}", body.pos);
        }
    }

    /// Release the bodies and slots of everything killed since the last call.
    /// Runs after the physics step.
    pub fn garbage_collect(&mut self, world: &mut dyn PhysicsWorld) {
        for id in std::mem::take(&mut self.pending_removal) {
            let Some(slot) = self.slots.get_mut(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation || slot.obstacle.is_none() {
                continue;
            }
            world.remove_body(id);
            slot.obstacle = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            log::trace!("Collected {id}");
        }
    }

    /// Tear the level down: every remaining obstacle leaves the physics world
    /// and both render layers. Safe to call more than once.
    pub fn dispose(&mut self, world: &mut dyn PhysicsWorld, scene: &mut dyn SceneGraph) {
        let mut released = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(obstacle) = slot.obstacle.take() else {
                continue;
            };
            if !obstacle.removed {
                if obstacle.has_visual() {
                    scene.remove(obstacle.id, Layer::World);
                }
                scene.remove(obstacle.id, Layer::Debug);
            }
            if world.contains(obstacle.id) {
                world.remove_body(obstacle.id);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
            released += 1;
        }

        self.avatar = None;
        self.kids = [None; KID_COUNT];
        self.goal = None;
        self.blender = None;
        self.walls.clear();
        self.platforms.clear();
        self.spikes.clear();
        self.jellos.clear();
        self.cups.clear();
        self.switches.clear();
        self.pending_removal.clear();
        self.kids_remaining = 0;
        self.failed = false;

        if released > 0 {
            log::debug!("Disposed level {} ({released} obstacles)", self.name);
        }
    }
}
