//! Scene-graph seam
//!
//! The renderer is external. The level only tells it which nodes exist, in
//! which layer, at which z-order.

use std::collections::BTreeMap;

use super::body::ObstacleId;
use super::models::Obstacle;

/// Render layer a node lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// Textured sprites
    World,
    /// Wireframe outlines of the physics fixtures
    Debug,
}

/// External renderer interface
pub trait SceneGraph {
    /// Insert the node representing `obstacle` in `layer` at `z_order`
    fn insert(&mut self, obstacle: &Obstacle, layer: Layer, z_order: i32);
    /// Remove the node for `id` from `layer`
    fn remove(&mut self, id: ObstacleId, layer: Layer);
}

/// Scene that draws nothing (headless runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScene;

impl SceneGraph for NullScene {
    fn insert(&mut self, _obstacle: &Obstacle, _layer: Layer, _z_order: i32) {}
    fn remove(&mut self, _id: ObstacleId, _layer: Layer) {}
}

/// Scene that records the node set it was asked to maintain
#[derive(Debug, Clone, Default)]
pub struct SceneLog {
    nodes: BTreeMap<(Layer, ObstacleId), i32>,
    /// Insertions of a node that was already present
    pub duplicate_inserts: u32,
    /// Removals of a node that was not present
    pub stray_removals: u32,
}

impl SceneLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ObstacleId, layer: Layer) -> bool {
        self.nodes.contains_key(&(layer, id))
    }

    pub fn z_order(&self, id: ObstacleId, layer: Layer) -> Option<i32> {
        self.nodes.get(&(layer, id)).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids of a layer in draw order (back to front)
    pub fn draw_order(&self, layer: Layer) -> Vec<ObstacleId> {
        let mut nodes: Vec<_> = self
            .nodes
            .iter()
            .filter(|((l, _), _)| *l == layer)
            .map(|((_, id), z)| (*z, *id))
            .collect();
        nodes.sort();
        nodes.into_iter().map(|(_, id)| id).collect()
    }
}

impl SceneGraph for SceneLog {
    fn insert(&mut self, obstacle: &Obstacle, layer: Layer, z_order: i32) {
        if self.nodes.insert((layer, obstacle.id), z_order).is_some() {
            log::warn!("Scene node for {} inserted twice", obstacle.name);
            self.duplicate_inserts += 1;
        }
    }

    fn remove(&mut self, id: ObstacleId, layer: Layer) {
        if self.nodes.remove(&(layer, id)).is_none() {
            self.stray_removals += 1;
        }
    }
}
