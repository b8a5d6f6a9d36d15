//! Level construction
//!
//! A [`LevelSpec`] is the single description of a level's geometry. It comes
//! from the built-in level or from a tile-map document, and [`LevelSpec::build`]
//! turns it into a populated [`Level`] with bodies, fixtures, filters and
//! z-orders assigned per obstacle kind.

use std::path::Path;

use anyhow::{Context, bail};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, BodyType, Fixture, FixtureKind};
use super::class::{CollisionClass, Filter};
use super::level::Level;
use super::models::{
    Avatar, Blender, ButtonSwitch, Cup, Jello, Kid, MoveablePlatform, Obstacle, ObstacleKind,
    PlatformState,
};
use super::scene::SceneGraph;
use super::world::PhysicsWorld;
use crate::consts::*;
use crate::tuning::Tuning;

/// Axis-aligned rectangle in world units (y up)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Rect {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Rectangle from its bottom-left corner and size
    pub fn from_corner(x: f32, y: f32, width: f32, height: f32) -> Self {
        let half_extents = Vec2::new(width, height) * 0.5;
        Self::new(Vec2::new(x, y) + half_extents, half_extents)
    }

    pub fn size(&self) -> Vec2 {
        self.half_extents * 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub rect: Rect,
    /// Sticky toggle (true) or momentary button (false)
    pub is_switch: bool,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSpec {
    /// Closed position
    pub rect: Rect,
    pub color: String,
    /// Travel distance when open
    pub length: f32,
    pub is_open: bool,
    pub is_vertical: bool,
}

/// Everything needed to build (and rebuild) a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub name: String,
    /// Extent along x, used for camera clamping
    pub length: f32,
    /// Avatar spawn (center)
    pub will: Vec2,
    /// Companion spawns (centers), at most [`KID_COUNT`]
    pub kids: Vec<Vec2>,
    pub goal: Rect,
    pub blender: Option<Rect>,
    pub walls: Vec<Rect>,
    pub jellos: Vec<Rect>,
    pub spikes: Vec<Rect>,
    pub cups: Vec<Rect>,
    pub switches: Vec<SwitchSpec>,
    pub bridges: Vec<BridgeSpec>,
}

impl LevelSpec {
    /// An empty level with just a floor, an avatar spawn and a goal
    pub fn empty(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
            will: Vec2::new(1.0, 0.5),
            kids: Vec::new(),
            goal: Rect::new(Vec2::new(length - 1.0, 1.0), Vec2::ONE),
            blender: None,
            walls: vec![Rect::from_corner(0.0, -1.0, length, 1.0)],
            jellos: Vec::new(),
            spikes: Vec::new(),
            cups: Vec::new(),
            switches: Vec::new(),
            bridges: Vec::new(),
        }
    }

    /// The level shipped inside the binary
    pub fn builtin() -> Self {
        let length = 44.0;
        Self {
            name: "kitchen".to_string(),
            length,
            will: Vec2::new(7.0, 0.5),
            kids: (0..KID_COUNT)
                .map(|i| Vec2::new(2.5 + i as f32, 0.35))
                .collect(),
            goal: Rect::new(Vec2::new(41.5, 1.0), Vec2::new(1.0, 1.0)),
            blender: Some(Rect::new(Vec2::new(-4.0, 2.0), Vec2::new(1.5, 2.0))),
            walls: vec![
                // Floor, back wall, end wall
                Rect::from_corner(-8.0, -1.0, length + 8.0, 1.0),
                Rect::from_corner(-9.0, -1.0, 1.0, 12.0),
                Rect::from_corner(length, -1.0, 1.0, 12.0),
                // Ledge
                Rect::from_corner(22.0, 0.0, 3.0, 1.0),
            ],
            jellos: vec![Rect::from_corner(13.0, 0.0, 2.0, 1.0)],
            spikes: vec![Rect::from_corner(19.0, 0.0, 2.0, 0.5)],
            cups: vec![
                Rect::from_corner(26.0, 0.0, 1.0, 1.0),
                Rect::from_corner(26.0, 1.0, 1.0, 1.0),
            ],
            switches: vec![SwitchSpec {
                rect: Rect::from_corner(30.0, 0.0, 1.0, 0.5),
                is_switch: true,
                color: "red".to_string(),
            }],
            bridges: vec![BridgeSpec {
                rect: Rect::from_corner(34.0, 0.0, 0.5, 3.0),
                color: "red".to_string(),
                length: 3.0,
                is_open: false,
                is_vertical: true,
            }],
        }
    }

    /// Load a tile-map level file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read level {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("level");
        let spec = Self::from_tilemap_json(name, &json)
            .with_context(|| format!("Failed to parse level {}", path.display()))?;
        log::info!(
            "Loaded level {} from {}: {} walls, {} companions, {} switches, {} bridges",
            spec.name,
            path.display(),
            spec.walls.len(),
            spec.kids.len(),
            spec.switches.len(),
            spec.bridges.len()
        );
        Ok(spec)
    }

    /// Parse a Tiled-style JSON map. A `name` map property overrides
    /// `fallback_name`.
    pub fn from_tilemap_json(fallback_name: &str, json: &str) -> anyhow::Result<Self> {
        let map: TileMap = serde_json::from_str(json).context("Invalid tile-map document")?;
        if map.tilewidth <= 0.0 || map.tileheight <= 0.0 {
            bail!("Tile size must be positive, got {}x{}", map.tilewidth, map.tileheight);
        }

        let name = find_property(&map.properties, "name")
            .and_then(|value| value.as_str())
            .unwrap_or(fallback_name)
            .to_string();
        let length = map.width as f32;
        let mut spec = Self {
            name,
            length,
            will: Vec2::ZERO,
            kids: Vec::new(),
            goal: Rect::new(Vec2::ZERO, Vec2::ZERO),
            blender: None,
            walls: Vec::new(),
            jellos: Vec::new(),
            spikes: Vec::new(),
            cups: Vec::new(),
            switches: Vec::new(),
            bridges: Vec::new(),
        };
        let mut will = None;
        let mut goal = None;

        for layer in map.layers.iter().filter(|layer| layer.kind == "objectgroup") {
            let objects = layer.objects.iter().map(|object| (object, map.to_world(object)));
            match layer.name.as_str() {
                "Walls" => spec.walls.extend(solid_rects(&layer.name, objects)),
                "Jello" => spec.jellos.extend(solid_rects(&layer.name, objects)),
                "Spikes" => spec.spikes.extend(solid_rects(&layer.name, objects)),
                "Cups" => spec.cups.extend(solid_rects(&layer.name, objects)),
                "Goal" => {
                    for (_, rect) in objects {
                        if goal.replace(rect).is_some() {
                            bail!("Layer Goal has more than one object");
                        }
                    }
                }
                "Will" => {
                    for (_, rect) in objects {
                        if will.replace(rect.center).is_some() {
                            bail!("Layer Will has more than one object");
                        }
                    }
                }
                "Kids" => spec.kids.extend(objects.map(|(_, rect)| rect.center)),
                "Blender" => {
                    for (_, rect) in objects {
                        if spec.blender.replace(rect).is_some() {
                            bail!("Layer Blender has more than one object");
                        }
                    }
                }
                "Switches" => {
                    for (object, rect) in objects {
                        spec.switches.push(SwitchSpec {
                            rect,
                            is_switch: object.bool_property("isSwitch", true),
                            color: object.color(),
                        });
                    }
                }
                "Bridges" => {
                    for (object, rect) in objects {
                        let is_vertical = object.bool_property("isVertical", false);
                        let default_length = if is_vertical {
                            rect.size().y
                        } else {
                            rect.size().x
                        };
                        spec.bridges.push(BridgeSpec {
                            rect,
                            color: object.color(),
                            length: object.f32_property("length", default_length),
                            is_open: object.bool_property("isOpen", false),
                            is_vertical,
                        });
                    }
                }
                other => log::warn!("Skipping unknown layer {other:?}"),
            }
        }

        spec.will = will.context("Level has no Will object")?;
        spec.goal = goal.context("Level has no Goal object")?;
        if spec.kids.len() > KID_COUNT {
            bail!(
                "Level has {} companions, at most {KID_COUNT} are supported",
                spec.kids.len()
            );
        }
        Ok(spec)
    }

    /// Populate a fresh level: every obstacle gets its body registered with
    /// `world` and its nodes inserted into `scene`.
    pub fn build(
        &self,
        tuning: &Tuning,
        world: &mut dyn PhysicsWorld,
        scene: &mut dyn SceneGraph,
    ) -> Level {
        let mut level = Level::new(self.name.clone(), self.length);
        let mut add = |level: &mut Level, obstacle: Obstacle, z_order: i32| {
            level.add_obstacle(obstacle, z_order, &mut *world, &mut *scene)
        };
        let solid = |rect: &Rect, class: CollisionClass| {
            Body::new(BodyType::Static, rect.center, rect.half_extents)
                .with_filter(Filter::for_class(class))
        };

        for (i, rect) in self.walls.iter().enumerate() {
            let body = solid(rect, CollisionClass::Wall);
            add(&mut level, Obstacle::new(format!("wall{i}"), body, ObstacleKind::Wall), Z_WALLS);
        }

        for (i, bridge) in self.bridges.iter().enumerate() {
            let mut platform = MoveablePlatform::new(
                bridge.color.clone(),
                bridge.rect.center,
                bridge.length,
                bridge.is_vertical,
            );
            let mut body = Body::new(
                BodyType::Kinematic,
                bridge.rect.center,
                bridge.rect.half_extents,
            );
            if bridge.is_open {
                platform.state = PlatformState::Open;
                body.pos = platform.open_position();
            }
            let obstacle = Obstacle::new(format!("bridge{i}"), body, ObstacleKind::Platform(platform))
                .with_texture(format!("bridge_{}", bridge.color));
            add(&mut level, obstacle, Z_WALLS);
        }

        let goal_body = solid(&self.goal, CollisionClass::Goal).as_sensor();
        add(
            &mut level,
            Obstacle::new("goal", goal_body, ObstacleKind::Goal).with_texture("goal"),
            Z_BEHIND_WALLS,
        );

        for (i, rect) in self.jellos.iter().enumerate() {
            let obstacle = Obstacle::new(
                format!("jello{i}"),
                solid(rect, CollisionClass::Jello),
                ObstacleKind::Jello(Jello::default()),
            )
            .with_texture("jello");
            add(&mut level, obstacle, Z_OBSTACLES);
        }

        for (i, rect) in self.spikes.iter().enumerate() {
            let obstacle = Obstacle::new(
                format!("spikes{i}"),
                solid(rect, CollisionClass::Spikes).as_sensor(),
                ObstacleKind::Spikes,
            )
            .with_texture("spikes");
            add(&mut level, obstacle, Z_OBSTACLES);
        }

        for (i, rect) in self.cups.iter().enumerate() {
            let tile = (rect.center.x.floor() as i32, rect.center.y.floor() as i32);
            let obstacle = Obstacle::new(
                format!("cup{i}"),
                solid(rect, CollisionClass::Cup),
                ObstacleKind::Cup(Cup::new(tile)),
            )
            .with_texture("cup");
            add(&mut level, obstacle, Z_OBSTACLES);
        }

        for (i, switch) in self.switches.iter().enumerate() {
            let texture = if switch.is_switch { "switch" } else { "button" };
            let obstacle = Obstacle::new(
                format!("{texture}{i}"),
                solid(&switch.rect, CollisionClass::ButtonSwitch).as_sensor(),
                ObstacleKind::ButtonSwitch(ButtonSwitch::new(switch.is_switch, switch.color.clone())),
            )
            .with_texture(format!("{texture}_{}", switch.color));
            add(&mut level, obstacle, Z_OBSTACLES);
        }

        if let Some(rect) = &self.blender {
            let blade = Fixture::sensor(
                FixtureKind::Blade,
                Vec2::new(rect.half_extents.x * 0.75, 0.0),
                rect.half_extents * Vec2::new(0.25, 0.8),
            );
            let mut body = Body::new(BodyType::Kinematic, rect.center, rect.half_extents)
                .with_filter(Filter::for_class(CollisionClass::Blender))
                .as_sensor()
                .with_fixture(blade);
            body.vel = Vec2::new(tuning.blender_speed, 0.0);
            let obstacle = Obstacle::new(
                "blender",
                body,
                ObstacleKind::Blender(Blender { running: true }),
            )
            .with_texture("blender");
            add(&mut level, obstacle, Z_CHARACTERS);
        }

        for (index, spawn) in self.kids.iter().enumerate() {
            let body = Body::new(BodyType::Dynamic, *spawn, tuning.kid_half_extents)
                .with_filter(Filter::for_class(CollisionClass::Kid));
            let obstacle = Obstacle::new(format!("kid{index}"), body, ObstacleKind::Kid(Kid::new(index)))
                .with_texture(format!("kid{index}"));
            add(&mut level, obstacle, Z_CHARACTERS);
        }

        add(&mut level, avatar_obstacle(self.will, tuning), Z_CHARACTERS);

        level.link_switches();
        log::info!(
            "Built level {}: {} obstacles, {} companions",
            level.name,
            level.obstacles().count(),
            level.num_kids_remaining()
        );
        level
    }
}

/// The avatar body: solid main box, a thin foot sensor under it and a
/// torso sensor for switches
fn avatar_obstacle(spawn: Vec2, tuning: &Tuning) -> Obstacle {
    let half = tuning.avatar_half_extents;
    let body = Body::new(BodyType::Dynamic, spawn, half)
        .with_filter(Filter::for_class(CollisionClass::Pineapple))
        .with_fixture(Fixture::sensor(
            FixtureKind::Foot,
            Vec2::new(0.0, -half.y),
            Vec2::new(half.x * 0.8, 0.05),
        ))
        .with_fixture(Fixture::sensor(
            FixtureKind::BodySensor,
            Vec2::ZERO,
            Vec2::new(half.x * 1.1, half.y * 0.5),
        ));
    Obstacle::new("will", body, ObstacleKind::Avatar(Avatar::default())).with_texture("will")
}

fn solid_rects<'a>(
    layer: &'a str,
    objects: impl Iterator<Item = (&'a MapObject, Rect)> + 'a,
) -> impl Iterator<Item = Rect> + 'a {
    objects.filter_map(move |(object, rect)| {
        if rect.half_extents.x > 0.0 && rect.half_extents.y > 0.0 {
            Some(rect)
        } else {
            log::warn!(
                "Skipping {layer} object {:?} with empty size {}x{}",
                object.name,
                object.width,
                object.height
            );
            None
        }
    })
}

fn find_property<'a>(properties: &'a [MapProperty], name: &str) -> Option<&'a serde_json::Value> {
    properties
        .iter()
        .find(|property| property.name == name)
        .map(|property| &property.value)
}

#[derive(Debug, Deserialize)]
struct TileMap {
    /// Size in tiles
    width: u32,
    height: u32,
    tilewidth: f32,
    tileheight: f32,
    layers: Vec<MapLayer>,
    #[serde(default)]
    properties: Vec<MapProperty>,
}

impl TileMap {
    /// Pixel rectangle (y down from the top of the map) to world units (y up)
    fn to_world(&self, object: &MapObject) -> Rect {
        let x = object.x / self.tilewidth;
        let width = object.width / self.tilewidth;
        let height = object.height / self.tileheight;
        let bottom = self.height as f32 - (object.y + object.height) / self.tileheight;
        Rect::from_corner(x, bottom, width, height)
    }
}

#[derive(Debug, Deserialize)]
struct MapLayer {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    objects: Vec<MapObject>,
}

#[derive(Debug, Deserialize)]
struct MapObject {
    #[serde(default)]
    name: String,
    x: f32,
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    properties: Vec<MapProperty>,
}

impl MapObject {
    fn property(&self, name: &str) -> Option<&serde_json::Value> {
        find_property(&self.properties, name)
    }

    fn bool_property(&self, name: &str, default: bool) -> bool {
        match self.property(name) {
            None => default,
            Some(value) => value.as_bool().unwrap_or_else(|| {
                log::warn!("Property {name} of {:?} is not a bool: {value}", self.name);
                default
            }),
        }
    }

    fn f32_property(&self, name: &str, default: f32) -> f32 {
        match self.property(name) {
            None => default,
            Some(value) => value.as_f64().map(|v| v as f32).unwrap_or_else(|| {
                log::warn!("Property {name} of {:?} is not a number: {value}", self.name);
                default
            }),
        }
    }

    /// Link color: `color`, falling back to `linkID`
    fn color(&self) -> String {
        match self.property("color").or_else(|| self.property("linkID")) {
            Some(serde_json::Value::String(color)) => color.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MapProperty {
    name: String,
    value: serde_json::Value,
}
