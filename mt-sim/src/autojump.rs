use bevy::prelude::{IVec3, Vec3};
use tracing::debug;

use crate::collision::collision_move_simple;
use crate::config::TickConfig;
use crate::control::EffectiveControl;
use crate::types::{Aabb, CollisionOutcome, PlayerKinematicState};
use crate::world::{CONTENT_IGNORE, WorldView, floor_to_node};

/// How long the synthetic jump intent stays active once committed.
pub const AUTOJUMP_WINDOW: f32 = 0.1;

const HEAD_BOX_SCALE: f32 = 0.99;
const JUMP_GAIN_MARGIN: f32 = 1.01;

/// Commits an autojump window on `state` when jumping this tick would have
/// carried the player further than the move that just happened. Runs after
/// the tick's collision pass; `initial_position` and `initial_velocity`
/// are the pre-collision values of the same tick.
#[allow(clippy::too_many_arguments)]
pub fn handle_autojump(
    world: &WorldView,
    cfg: &TickConfig,
    control: &EffectiveControl,
    state: &mut PlayerKinematicState,
    outcome: &CollisionOutcome,
    collision_box: &Aabb,
    initial_position: Vec3,
    initial_velocity: Vec3,
    dtime: f32,
) -> bool {
    if !cfg.settings.autojump || state.autojump.is_some() {
        return false;
    }
    if !state.can_jump || control.jump || control.sneak || !control.is_moving() {
        return false;
    }
    if !outcome.horizontal_node_collision() {
        return false;
    }
    if head_blocked(world, collision_box, state.position) {
        return false;
    }

    let jump_speed = cfg.jump_speed();
    let gravity = cfg.gravity();
    if jump_speed <= 0.0 || gravity <= 0.0 {
        return false;
    }
    let t = jump_speed / gravity;
    let jump_height = (jump_speed - 0.5 * gravity * t) * t;

    let trial = collision_move_simple(
        world,
        collision_box,
        0.0,
        dtime,
        initial_position + Vec3::new(0.0, jump_height, 0.0),
        initial_velocity,
        Vec3::ZERO,
    );

    let run = state.position - initial_position;
    let jump = trial.position - initial_position;
    let run_distance_sq = run.x * run.x + run.z * run.z;
    let jump_distance_sq = jump.x * jump.x + jump.z * jump.z;
    if jump_distance_sq > run_distance_sq * JUMP_GAIN_MARGIN {
        debug!(jump_height, "autojump committed");
        state.autojump = Some(AUTOJUMP_WINDOW);
        return true;
    }
    false
}

// Row of nodes right above the head: an unloaded column ends the row scan,
// ignore content or a walkable node blocks the jump.
fn head_blocked(world: &WorldView, collision_box: &Aabb, position: Vec3) -> bool {
    let head = collision_box.scaled(HEAD_BOX_SCALE).offset(position);
    let ceil_min = floor_to_node(Vec3::new(head.min.x, head.max.y, head.min.z)) + IVec3::Y;
    let ceil_max = floor_to_node(head.max) + IVec3::Y;
    for z in ceil_min.z..=ceil_max.z {
        for x in ceil_min.x..=ceil_max.x {
            match world.node(IVec3::new(x, ceil_max.y, z)) {
                None => break,
                Some((CONTENT_IGNORE, _)) => return true,
                Some((_, def)) if def.walkable => return true,
                Some(_) => {}
            }
        }
    }
    false
}
