//! Collision classes and broad-phase filter bits
//!
//! The integer tags keep the level tools' numbering (solid classes carry even
//! tags), but dispatch never looks at the parity: ground-likeness is an
//! explicit property of the class.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Gameplay type of an obstacle, used for contact dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollisionClass {
    Unassigned,
    Wall,
    /// The avatar ("Will")
    Pineapple,
    Kid,
    Jello,
    Spikes,
    Cup,
    Blender,
    ButtonSwitch,
    Goal,
}

impl CollisionClass {
    pub const ALL: [CollisionClass; 10] = [
        CollisionClass::Unassigned,
        CollisionClass::Wall,
        CollisionClass::Pineapple,
        CollisionClass::Kid,
        CollisionClass::Jello,
        CollisionClass::Spikes,
        CollisionClass::Cup,
        CollisionClass::Blender,
        CollisionClass::ButtonSwitch,
        CollisionClass::Goal,
    ];

    /// Integer tag as stored in level data
    pub const fn tag(self) -> i32 {
        match self {
            CollisionClass::Unassigned => -1,
            CollisionClass::Wall => 0,
            CollisionClass::Pineapple => 1,
            CollisionClass::Kid => 3,
            CollisionClass::Jello => 4,
            CollisionClass::Spikes => 5,
            CollisionClass::Cup => 6,
            CollisionClass::Blender => 7,
            CollisionClass::ButtonSwitch => 8,
            CollisionClass::Goal => 9,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.tag() == tag)
    }

    /// Whether standing on this class grounds a character
    pub const fn is_ground_like(self) -> bool {
        match self {
            CollisionClass::Wall
            | CollisionClass::Jello
            | CollisionClass::Cup
            | CollisionClass::ButtonSwitch => true,
            CollisionClass::Unassigned
            | CollisionClass::Pineapple
            | CollisionClass::Kid
            | CollisionClass::Spikes
            | CollisionClass::Blender
            | CollisionClass::Goal => false,
        }
    }

    /// Whether this class is a character driven by the simulation
    pub const fn is_character(self) -> bool {
        matches!(self, CollisionClass::Pineapple | CollisionClass::Kid)
    }
}

/// Broad-phase collision filter (category/mask pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub category: u16,
    pub mask: u16,
}

impl Default for Filter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Filter {
    /// Walls, props, goal, switches
    pub const DEFAULT: Filter = Filter {
        category: CATEGORY_DEFAULT,
        mask: MASK_ALL,
    };
    pub const AVATAR: Filter = Filter {
        category: CATEGORY_AVATAR,
        mask: MASK_ALL,
    };
    pub const KID: Filter = Filter {
        category: CATEGORY_KID,
        mask: MASK_KID,
    };
    /// Blender and spikes
    pub const HAZARD: Filter = Filter {
        category: CATEGORY_HAZARD,
        mask: MASK_HAZARD,
    };

    /// Filter bits for the given class as assigned at level load
    pub fn for_class(class: CollisionClass) -> Filter {
        match class {
            CollisionClass::Pineapple => Filter::AVATAR,
            CollisionClass::Kid => Filter::KID,
            CollisionClass::Blender | CollisionClass::Spikes => Filter::HAZARD,
            CollisionClass::Unassigned
            | CollisionClass::Wall
            | CollisionClass::Jello
            | CollisionClass::Cup
            | CollisionClass::ButtonSwitch
            | CollisionClass::Goal => Filter::DEFAULT,
        }
    }

    /// The same filter restricted to hazards (used once a character is blended)
    pub fn blended(self) -> Filter {
        Filter {
            category: self.category,
            mask: MASK_BLENDED,
        }
    }

    /// Both sides must accept each other's category
    pub fn should_collide(self, other: Filter) -> bool {
        (self.mask & other.category) != 0 && (other.mask & self.category) != 0
    }
}
