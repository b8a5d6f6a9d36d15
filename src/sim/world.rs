//! Physics world seam
//!
//! The game only needs three things from a physics engine: bodies can be
//! registered and unregistered, a step moves them, and the step reports
//! begin/end contacts between fixtures to a listener. [`KinematicWorld`] is a
//! small AABB implementation of that contract used for headless runs and tests.

use std::collections::BTreeSet;

use glam::Vec2;

use super::body::{Aabb, Body, BodyType, FixtureKind, FixtureRef, ObstacleId};
use super::class::Filter;
use super::level::Level;
use super::scene::SceneGraph;
use crate::consts::GRAVITY;

/// A pair of touching fixtures (stored in a canonical order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Contact {
    pub a: FixtureRef,
    pub b: FixtureRef,
}

impl Contact {
    pub fn new(a: FixtureRef, b: FixtureRef) -> Self {
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    pub fn involves(&self, id: ObstacleId) -> bool {
        self.a.obstacle == id || self.b.obstacle == id
    }
}

/// Receives contact callbacks from inside a physics step
///
/// Implementations must not panic or fail: the step is in progress and every
/// unexpected condition has to be reduced to a no-op.
pub trait ContactListener {
    fn begin_contact(&mut self, level: &mut Level, scene: &mut dyn SceneGraph, contact: &Contact);
    fn end_contact(&mut self, level: &mut Level, scene: &mut dyn SceneGraph, contact: &Contact);
}

/// External physics engine interface
pub trait PhysicsWorld {
    fn add_body(&mut self, id: ObstacleId, body: &Body);
    fn remove_body(&mut self, id: ObstacleId);
    fn contains(&self, id: ObstacleId) -> bool;
    /// Drop every body and contact without reporting anything
    fn clear(&mut self);
    /// Advance by `dt`, reporting contact changes to `listener`
    fn step(
        &mut self,
        level: &mut Level,
        scene: &mut dyn SceneGraph,
        listener: &mut dyn ContactListener,
        dt: f32,
    );
}

#[derive(Debug, Clone, Copy)]
struct FixtureProxy {
    fixture: FixtureRef,
    aabb: Aabb,
    filter: Filter,
    dynamic: bool,
}

/// Minimal AABB world: begin/end contact diffing, push-out against
/// static/kinematic solids, then gravity and velocity integration
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    pub gravity: Vec2,
    bodies: BTreeSet<ObstacleId>,
    touching: BTreeSet<Contact>,
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            bodies: BTreeSet::new(),
            touching: BTreeSet::new(),
        }
    }
}

impl KinematicWorld {
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Contacts reported as begun and not yet ended
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.touching.iter()
    }

    fn integrate(&self, level: &mut Level, dt: f32) {
        for &id in &self.bodies {
            let Some(obstacle) = level.live_mut(id) else {
                continue;
            };
            let body = &mut obstacle.body;
            match body.body_type {
                BodyType::Static => {}
                BodyType::Kinematic => body.pos += body.vel * dt,
                BodyType::Dynamic => {
                    body.vel += self.gravity * body.gravity_scale * dt;
                    body.pos += body.vel * dt;
                }
            }
        }
    }

    /// Push dynamic bodies out of the solids they sank into
    fn resolve(&self, level: &mut Level) {
        let solids: Vec<(ObstacleId, Aabb, Filter)> = self
            .bodies
            .iter()
            .filter_map(|&id| level.live(id).map(|obstacle| (id, obstacle)))
            .filter(|(_, obstacle)| obstacle.body.body_type != BodyType::Dynamic)
            .filter(|(_, obstacle)| {
                obstacle
                    .body
                    .fixture(FixtureKind::Main)
                    .is_some_and(|f| !f.sensor)
            })
            .map(|(id, obstacle)| (id, obstacle.body.aabb(), obstacle.body.filter))
            .collect();

        for &id in &self.bodies {
            let Some(obstacle) = level.live_mut(id) else {
                continue;
            };
            let body = &mut obstacle.body;
            let solid_body = body
                .fixture(FixtureKind::Main)
                .is_some_and(|f| !f.sensor);
            if body.body_type != BodyType::Dynamic || !solid_body {
                continue;
            }

            for (solid_id, solid, filter) in &solids {
                if *solid_id == id || !body.filter.should_collide(*filter) {
                    continue;
                }
                let Some(push) = body.aabb().penetration(solid) else {
                    continue;
                };
                body.pos += push;
                if push.y > 0.0 && body.vel.y < 0.0 || push.y < 0.0 && body.vel.y > 0.0 {
                    body.vel.y = 0.0;
                }
                if push.x > 0.0 && body.vel.x < 0.0 || push.x < 0.0 && body.vel.x > 0.0 {
                    body.vel.x = 0.0;
                }
            }
        }
    }

    fn overlaps(&self, level: &Level) -> BTreeSet<Contact> {
        let mut proxies = Vec::new();
        for &id in &self.bodies {
            let Some(obstacle) = level.live(id) else {
                continue;
            };
            let body = &obstacle.body;
            for fixture in &body.fixtures {
                proxies.push(FixtureProxy {
                    fixture: FixtureRef::new(id, fixture.kind),
                    aabb: Aabb::from_center(body.pos + fixture.offset, fixture.half_extents),
                    filter: body.filter,
                    dynamic: body.body_type == BodyType::Dynamic,
                });
            }
        }

        let mut contacts = BTreeSet::new();
        for (i, a) in proxies.iter().enumerate() {
            for b in &proxies[i + 1..] {
                if a.fixture.obstacle == b.fixture.obstacle {
                    continue;
                }
                if !(a.dynamic || b.dynamic) || !a.filter.should_collide(b.filter) {
                    continue;
                }
                if a.aabb.touches(&b.aabb) {
                    contacts.insert(Contact::new(a.fixture, b.fixture));
                }
            }
        }
        contacts
    }
}

impl PhysicsWorld for KinematicWorld {
    fn add_body(&mut self, id: ObstacleId, _body: &Body) {
        self.bodies.insert(id);
    }

    fn remove_body(&mut self, id: ObstacleId) {
        self.bodies.remove(&id);
    }

    fn contains(&self, id: ObstacleId) -> bool {
        self.bodies.contains(&id)
    }

    fn clear(&mut self) {
        self.bodies.clear();
        self.touching.clear();
    }

    fn step(
        &mut self,
        level: &mut Level,
        scene: &mut dyn SceneGraph,
        listener: &mut dyn ContactListener,
        dt: f32,
    ) {
        // Bodies removed since the last step end their contacts first
        let stale: Vec<Contact> = self
            .touching
            .iter()
            .filter(|c| !self.bodies.contains(&c.a.obstacle) || !self.bodies.contains(&c.b.obstacle))
            .copied()
            .collect();
        for contact in &stale {
            self.touching.remove(contact);
            listener.end_contact(level, scene, contact);
        }

        // Contacts are reported on the positions the last step left, before
        // the overlap is resolved, so listeners still see the impact velocity
        let current = self.overlaps(level);
        let ended: Vec<Contact> = self.touching.difference(&current).copied().collect();
        let begun: Vec<Contact> = current.difference(&self.touching).copied().collect();
        self.touching = current;

        for contact in &ended {
            listener.end_contact(level, scene, contact);
        }
        for contact in &begun {
            listener.begin_contact(level, scene, contact);
        }

        self.resolve(level);
        self.integrate(level, dt);
    }
}
