use bevy::prelude::{IVec3, Vec3};

use crate::control::ControlSource;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_array(v: [f32; 6]) -> Self {
        Self::new(Vec3::new(v[0], v[1], v[2]), Vec3::new(v[3], v[4], v[5]))
    }

    pub fn unit() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE)
    }

    pub fn offset(self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    pub fn expanded_by_motion(self, motion: Vec3) -> Self {
        Self {
            min: self.min.min(self.min + motion),
            max: self.max.max(self.max + motion),
        }
    }

    pub fn grow(self, amount: Vec3) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    pub fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }
}

pub fn default_player_box() -> Aabb {
    Aabb::new(Vec3::new(-0.3, 0.0, -0.3), Vec3::new(0.3, 1.77, 0.3))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollisionAxis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl CollisionAxis {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactSource {
    Node(IVec3),
    Object(u32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionInfo {
    pub source: ContactSource,
    pub axis: CollisionAxis,
    pub old_speed: Vec3,
    pub new_speed: Vec3,
    /// `bouncy` group value of the contacted node or object, 0 when absent.
    pub bouncy: i32,
}

impl CollisionInfo {
    pub fn node_pos(&self) -> Option<IVec3> {
        match self.source {
            ContactSource::Node(p) => Some(p),
            ContactSource::Object(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionOutcome {
    pub position: Vec3,
    pub velocity: Vec3,
    pub collisions: Vec<CollisionInfo>,
    pub collides: bool,
    pub touching_ground: bool,
    pub standing_on_object: bool,
}

impl CollisionOutcome {
    pub fn unresolved(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            ..Default::default()
        }
    }

    pub fn horizontal_node_collision(&self) -> bool {
        self.collisions.iter().any(|c| {
            c.axis != CollisionAxis::Y && matches!(c.source, ContactSource::Node(_))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SneakAnchor {
    pub node: IVec3,
    /// Node-local bounding box of the anchor's collision geometry.
    pub top_box: Aabb,
}

impl SneakAnchor {
    pub fn world_box(&self) -> Aabb {
        self.top_box.offset(self.node.as_vec3())
    }
}

/// The legit (server-visible) movement record of the local player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerKinematicState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,

    pub touching_ground: bool,
    pub in_liquid: bool,
    pub in_liquid_stable: bool,
    pub is_climbing: bool,
    pub swimming_vertical: bool,
    pub swimming_pitch: bool,
    pub move_resistance: u8,

    pub standing_node: IVec3,
    pub sneak_anchor: Option<SneakAnchor>,
    pub sneak_ladder_detected: bool,

    pub can_jump: bool,
    pub disable_jump: bool,
    pub disable_descend: bool,

    pub autojump: Option<f32>,
    pub camera_impact: f32,
}

/// Locally rendered camera record, detached from the legit one while freecam runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisualState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MovementEvent {
    RegainGround { impact: f32 },
    Jump,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stance {
    Airborne,
    Normal,
    SneakingOnNode,
    Climbing,
    InLiquid { stable: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub state: PlayerKinematicState,
    pub visual: VisualState,
    pub outcome: CollisionOutcome,
    /// Collision contacts of the tick, including synthetic ones appended
    /// after resolution (sneak-node fall reporting).
    pub contacts: Vec<CollisionInfo>,
    pub stance: Stance,
    pub events: Vec<MovementEvent>,
    pub control_source: ControlSource,
}

impl TickReport {
    pub fn jumped(&self) -> bool {
        self.events.contains(&MovementEvent::Jump)
    }

    pub fn regained_ground(&self) -> Option<f32> {
        self.events.iter().find_map(|e| match e {
            MovementEvent::RegainGround { impact } => Some(*impact),
            MovementEvent::Jump => None,
        })
    }
}
