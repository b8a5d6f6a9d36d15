//! Physics bodies, fixtures and handles
//!
//! Shapes are axis-aligned boxes. A body owns one or more fixtures; each
//! fixture is addressed from contacts as a [`FixtureRef`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::class::Filter;
use crate::consts::CONTACT_SLOP;

/// Generation-tagged handle to an obstacle slot in a [`super::Level`]
///
/// A handle whose slot has been freed (or reused) resolves to nothing, so
/// contacts that outlive their obstacle are harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId {
    pub index: u32,
    pub generation: u32,
}

impl std::fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Named fixture roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FixtureKind {
    /// The body's main shape
    Main,
    /// Avatar foot sensor (thin strip under the body)
    Foot,
    /// Avatar torso sensor (switches)
    BodySensor,
    /// Blender blade sensor
    Blade,
}

/// One side of a contact: a fixture on an obstacle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixtureRef {
    pub obstacle: ObstacleId,
    pub fixture: FixtureKind,
}

impl FixtureRef {
    pub fn new(obstacle: ObstacleId, fixture: FixtureKind) -> Self {
        Self { obstacle, fixture }
    }

    pub fn main(obstacle: ObstacleId) -> Self {
        Self::new(obstacle, FixtureKind::Main)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Overlap test that counts resting contact (within slop) as touching
    pub fn touches(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x + CONTACT_SLOP
            && self.max.x > other.min.x - CONTACT_SLOP
            && self.min.y < other.max.y + CONTACT_SLOP
            && self.max.y > other.min.y - CONTACT_SLOP
    }

    /// Minimum translation that pushes `self` out of `other`, if they overlap
    pub fn penetration(&self, other: &Aabb) -> Option<Vec2> {
        let push_left = other.min.x - self.max.x;
        let push_right = other.max.x - self.min.x;
        let push_down = other.min.y - self.max.y;
        let push_up = other.max.y - self.min.y;

        if push_left >= 0.0 || push_right <= 0.0 || push_down >= 0.0 || push_up <= 0.0 {
            return None;
        }

        let x = if -push_left < push_right { push_left } else { push_right };
        let y = if -push_down < push_up { push_down } else { push_up };

        if x.abs() < y.abs() {
            Some(Vec2::new(x, 0.0))
        } else {
            Some(Vec2::new(0.0, y))
        }
    }
}

/// How the world moves a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves
    Static,
    /// Moves by its velocity, ignores gravity and contacts
    Kinematic,
    /// Integrated with gravity and pushed out of solids
    Dynamic,
}

/// A shape attached to a body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub kind: FixtureKind,
    /// Center offset from the body position
    pub offset: Vec2,
    pub half_extents: Vec2,
    /// Sensors report contacts but never push back
    pub sensor: bool,
}

impl Fixture {
    pub fn main(half_extents: Vec2) -> Self {
        Self {
            kind: FixtureKind::Main,
            offset: Vec2::ZERO,
            half_extents,
            sensor: false,
        }
    }

    pub fn sensor(kind: FixtureKind, offset: Vec2, half_extents: Vec2) -> Self {
        Self {
            kind,
            offset,
            half_extents,
            sensor: true,
        }
    }
}

/// Physics-backed state of an obstacle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub body_type: BodyType,
    pub pos: Vec2,
    pub vel: Vec2,
    pub gravity_scale: f32,
    pub filter: Filter,
    pub fixtures: Vec<Fixture>,
}

impl Body {
    pub fn new(body_type: BodyType, pos: Vec2, half_extents: Vec2) -> Self {
        Self {
            body_type,
            pos,
            vel: Vec2::ZERO,
            gravity_scale: if body_type == BodyType::Dynamic { 1.0 } else { 0.0 },
            filter: Filter::DEFAULT,
            fixtures: vec![Fixture::main(half_extents)],
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Turn the main fixture into a sensor
    pub fn as_sensor(mut self) -> Self {
        for fixture in &mut self.fixtures {
            if fixture.kind == FixtureKind::Main {
                fixture.sensor = true;
            }
        }
        self
    }

    pub fn fixture(&self, kind: FixtureKind) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.kind == kind)
    }

    pub fn fixture_aabb(&self, kind: FixtureKind) -> Option<Aabb> {
        self.fixture(kind)
            .map(|f| Aabb::from_center(self.pos + f.offset, f.half_extents))
    }

    /// Bounds of the main fixture
    pub fn aabb(&self) -> Aabb {
        self.fixture_aabb(FixtureKind::Main)
            .unwrap_or_else(|| Aabb::from_center(self.pos, Vec2::ZERO))
    }

    pub fn half_extents(&self) -> Vec2 {
        self.fixture(FixtureKind::Main)
            .map(|f| f.half_extents)
            .unwrap_or(Vec2::ZERO)
    }

    /// Scale every fixture around the body origin
    pub fn scale_fixtures(&mut self, factor: f32) {
        for fixture in &mut self.fixtures {
            fixture.offset *= factor;
            fixture.half_extents *= factor;
        }
    }

    /// Scale fixtures while keeping the bottom edge where it was
    pub fn rescale_standing(&mut self, factor: f32) {
        let old_half_height = self.half_extents().y;
        self.scale_fixtures(factor);
        self.pos.y += self.half_extents().y - old_half_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penetration_picks_shallow_axis() {
        let floor = Aabb::from_center(Vec2::new(0.0, -0.5), Vec2::new(5.0, 0.5));
        let sinking = Aabb::from_center(Vec2::new(0.0, 0.4), Vec2::new(0.4, 0.5));

        let push = sinking.penetration(&floor).unwrap();
        assert!(push.x.abs() < 1e-6);
        assert!((push.y - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_penetration_none_when_resting() {
        let floor = Aabb::from_center(Vec2::new(0.0, -0.5), Vec2::new(5.0, 0.5));
        let resting = Aabb::from_center(Vec2::new(0.0, 0.5), Vec2::new(0.4, 0.5));
        assert!(resting.penetration(&floor).is_none());
        assert!(resting.touches(&floor));
    }

    #[test]
    fn test_rescale_standing_keeps_feet() {
        let mut body = Body::new(BodyType::Dynamic, Vec2::new(0.0, 0.5), Vec2::new(0.4, 0.5));
        let bottom = body.aabb().min.y;
        body.rescale_standing(1.6);
        assert!((body.aabb().min.y - bottom).abs() < 1e-5);
        assert!((body.half_extents().y - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_sensor_fixture_lookup() {
        let body = Body::new(BodyType::Dynamic, Vec2::ZERO, Vec2::splat(0.5)).with_fixture(
            Fixture::sensor(FixtureKind::Foot, Vec2::new(0.0, -0.5), Vec2::new(0.3, 0.1)),
        );
        let foot = body.fixture_aabb(FixtureKind::Foot).unwrap();
        assert!((foot.center().y + 0.5).abs() < 1e-6);
        assert!(body.fixture(FixtureKind::Blade).is_none());
    }
}
