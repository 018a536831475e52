use bevy::prelude::{IVec3, Vec3};
use tracing::trace;

use crate::types::{
    Aabb, CollisionAxis, CollisionOutcome, ContactSource, PlayerKinematicState, SneakAnchor,
    Stance,
};
use crate::world::{WorldView, floor_to_node};

/// Lateral distance from a node centre within which it can hold a sneaking player.
pub const SNEAK_ALLOWED_RANGE: f32 = 0.55;

const SNEAK_FOOT_OFFSET: f32 = 0.02;
const LADDER_SNEAK_MAX: Vec3 = Vec3::new(0.4, 0.0, 0.4);

// Own column first, then the four sides, then the diagonals.
const SNEAK_SEARCH: [IVec3; 9] = [
    IVec3::new(0, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
    IVec3::new(1, 0, 1),
    IVec3::new(-1, 0, 1),
    IVec3::new(1, 0, -1),
    IVec3::new(-1, 0, -1),
];

const LATERAL_NEIGHBOURS: [IVec3; 4] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidState {
    pub in_liquid: bool,
    pub move_resistance: Option<u8>,
}

/// Oscillating liquid check. While already in liquid the sample sits at
/// feet+0.1 so the body stays in until fully out, otherwise it sits at
/// feet+0.5 so entry needs half the body submerged.
pub fn liquid_at_feet(world: &WorldView, position: Vec3, was_in_liquid: bool) -> LiquidState {
    let sample = if was_in_liquid { 0.1 } else { 0.5 };
    let p = floor_to_node(position + Vec3::new(0.0, sample, 0.0));
    match world.def_at(p) {
        Some(def) if def.liquid_move_physics => LiquidState {
            in_liquid: true,
            move_resistance: Some(def.move_resistance),
        },
        Some(def) => LiquidState {
            in_liquid: false,
            move_resistance: Some(def.move_resistance),
        },
        None => LiquidState {
            in_liquid: false,
            move_resistance: None,
        },
    }
}

pub fn liquid_stable(world: &WorldView, position: Vec3) -> bool {
    world
        .def_at(floor_to_node(position))
        .is_some_and(|def| def.liquid_move_physics)
}

pub fn detect_climbing(world: &WorldView, position: Vec3, free_move: bool, spider: bool) -> bool {
    if free_move {
        return false;
    }
    let head = floor_to_node(position + Vec3::new(0.0, 0.5, 0.0));
    let feet = floor_to_node(position + Vec3::new(0.0, -0.2, 0.0));
    let (Some(head_def), Some(feet_def)) = (world.def_at(head), world.def_at(feet)) else {
        return false;
    };
    if head_def.climbable || feet_def.climbable {
        return true;
    }
    if spider {
        let at = floor_to_node(position);
        return LATERAL_NEIGHBOURS
            .iter()
            .any(|d| world.walkable_at(at + *d));
    }
    false
}

pub fn sneak_max(collision_box: &Aabb, ladder_detected: bool) -> Vec3 {
    if ladder_detected {
        LADDER_SNEAK_MAX
    } else {
        collision_box.extent() * 0.49
    }
}

/// Keeps the current sneak anchor while it still supports the player or
/// searches the 3×3 columns below the feet for a new one.
pub fn update_sneak_node(
    world: &WorldView,
    anchor: Option<SneakAnchor>,
    ladder_detected: &mut bool,
    position: Vec3,
    sneak_max: Vec3,
    body_height: f32,
    sneak_glitch: bool,
) -> Option<SneakAnchor> {
    let y_mod = match &anchor {
        Some(a) => a.top_box.max.y - SNEAK_FOOT_OFFSET,
        None => SNEAK_FOOT_OFFSET,
    };
    let current = floor_to_node(position - Vec3::new(0.0, y_mod, 0.0));

    if let Some(a) = anchor
        && a.node == current
        && world.walkable_at(current)
    {
        return Some(a);
    }

    *ladder_detected = false;

    let clear_height = body_height.ceil() as i32;
    let mut min_distance_sq = f32::MAX;
    let mut chosen: Option<(IVec3, Aabb)> = None;
    for d in SNEAK_SEARCH {
        let p = current + d;
        let Some(def) = world.def_at(p) else {
            continue;
        };
        if !def.walkable {
            continue;
        }
        let bb = def.bounding_box();
        let centre = p.as_vec3() + bb.center();
        let dx = position.x - centre.x;
        let dz = position.z - centre.z;
        let distance_sq = dx * dx + dz * dz;
        if distance_sq > min_distance_sq
            || dx.abs() > SNEAK_ALLOWED_RANGE + sneak_max.x
            || dz.abs() > SNEAK_ALLOWED_RANGE + sneak_max.z
        {
            continue;
        }

        let column_clear = if sneak_glitch {
            world
                .def_at(p + IVec3::Y)
                .is_some_and(|above| !above.walkable)
        } else {
            (1..=clear_height).all(|dy| {
                world
                    .def_at(p + IVec3::new(0, dy, 0))
                    .is_some_and(|above| !above.walkable)
            })
        };
        if !column_clear {
            continue;
        }

        min_distance_sq = distance_sq;
        chosen = Some((p, bb));
    }

    let (node, top_box) = chosen?;
    if sneak_glitch {
        let ladder_base = world.walkable_at(node + IVec3::new(0, 2, 0));
        let ladder_top = world
            .def_at(node + IVec3::new(0, 3, 0))
            .is_some_and(|def| !def.walkable);
        *ladder_detected = ladder_base && ladder_top;
    }
    if anchor.map(|a| a.node) != Some(node) {
        trace!(?node, ladder = *ladder_detected, "sneak anchor changed");
    }
    Some(SneakAnchor { node, top_box })
}

/// Nearest Y-axis node contact to the feet, starting from `current`.
pub fn nearest_standing_node(outcome: &CollisionOutcome, position: Vec3, current: IVec3) -> IVec3 {
    let mut standing = current;
    let mut best: Option<f32> = None;
    for info in &outcome.collisions {
        if info.axis != CollisionAxis::Y {
            continue;
        }
        let ContactSource::Node(p) = info.source else {
            continue;
        };
        let distance = (p.as_vec3() + Vec3::splat(0.5) - position).length();
        if best.is_none_or(|d| distance < d) {
            best = Some(distance);
            standing = p;
        }
    }
    standing
}

/// First Y-axis node contact carrying a bouncy group, only when the
/// resolved vertical velocity points up.
pub fn bouncy_contact(outcome: &CollisionOutcome) -> i32 {
    if !outcome.collides || outcome.velocity.y <= 0.0 {
        return 0;
    }
    outcome
        .collisions
        .iter()
        .filter(|c| c.axis == CollisionAxis::Y && matches!(c.source, ContactSource::Node(_)))
        .map(|c| c.bouncy)
        .find(|b| *b != 0)
        .unwrap_or(0)
}

pub fn classify(state: &PlayerKinematicState, sneaking: bool) -> Stance {
    if state.in_liquid || state.in_liquid_stable {
        Stance::InLiquid {
            stable: state.in_liquid_stable,
        }
    } else if state.is_climbing {
        Stance::Climbing
    } else if sneaking && state.sneak_anchor.is_some() {
        Stance::SneakingOnNode
    } else if state.touching_ground {
        Stance::Normal
    } else {
        Stance::Airborne
    }
}

pub fn footstep_node_pos(state: &PlayerKinematicState) -> IVec3 {
    let drop = if state.in_liquid_stable {
        0.0
    } else if state.touching_ground {
        0.05
    } else {
        0.5
    };
    floor_to_node(state.position - Vec3::new(0.0, drop, 0.0))
}
