use bevy::prelude::{IVec3, Vec3};

use crate::collision::collision_check_intersection;
use crate::config::TickConfig;
use crate::control::{EffectiveControl, PlayerControl};
use crate::types::{
    Aabb, CollisionAxis, CollisionInfo, ContactSource, PlayerKinematicState, SneakAnchor,
    VisualState,
};
use crate::world::WorldView;

const JUMP_MIN_VERTICAL_SPEED: f32 = -0.5;
const BOUNCE_BOOST_FALLOFF: f32 = 2.8;
const SNEAK_LEDGE_MAX_RISE: f32 = 0.6;
const SNEAK_LEDGE_CLIMB_RATE: f32 = 22.0;
const SNEAK_FALL_REPORT_SPEED: f32 = 1.0;
const SWIM_PITCH_MIN_TARGET: f32 = 0.01;
const RESISTANCE_SCALE: f32 = 0.3;
const RESISTANCE_BASE: f32 = 0.7;
const RESISTANCE_RATE: f32 = 10.0;
// Drag tuning is expressed in tenths of a node.
const FLUIDITY_SMOOTH_SCALE: f32 = 10.0;

pub fn rotate_xz(v: Vec3, angle: f32) -> Vec3 {
    let (sn, cs) = angle.sin_cos();
    Vec3::new(v.x * cs - v.z * sn, v.y, v.x * sn + v.z * cs)
}

pub fn rotate_yz(v: Vec3, angle: f32) -> Vec3 {
    let (sn, cs) = angle.sin_cos();
    Vec3::new(v.x, v.y * cs - v.z * sn, v.y * sn + v.z * cs)
}

/// Moves `velocity` towards `target` (look-relative) by at most `max_h`
/// horizontally and `max_v` vertically. The horizontal pair is clamped by
/// length, the vertical component on its own.
pub fn accelerate(
    velocity: Vec3,
    target: Vec3,
    max_h: f32,
    max_v: f32,
    yaw: f32,
    pitch: f32,
    use_pitch: bool,
) -> Vec3 {
    let mut flat = rotate_xz(velocity, -yaw);
    if use_pitch {
        flat = rotate_yz(flat, -pitch);
    }
    let wanted = target - flat;

    let mut d = Vec3::ZERO;
    if max_h > 0.0 {
        let wanted_h = Vec3::new(wanted.x, 0.0, wanted.z);
        d += if wanted_h.length() > max_h {
            wanted_h.normalize_or_zero() * max_h
        } else {
            wanted_h
        };
    }
    if max_v > 0.0 {
        d.y += wanted.y.clamp(-max_v, max_v);
    }

    if use_pitch {
        d = rotate_yz(d, pitch);
    }
    velocity + rotate_xz(d, yaw)
}

pub fn slip_factor(world: &WorldView, state: &PlayerKinematicState, antislip: bool) -> f32 {
    if antislip {
        return 1.0;
    }
    let standing = state
        .sneak_anchor
        .map_or(state.standing_node, |anchor| anchor.node);
    let Some(def) = world.def_at(standing) else {
        return 1.0;
    };
    if !def.walkable {
        return 1.0;
    }
    let mut slippery = def.group("slippery");
    if slippery < 1 {
        return 1.0;
    }
    if state.velocity.x == 0.0 && state.velocity.z == 0.0 {
        slippery *= 2;
    }
    (1.0 / (slippery as f32 + 1.0)).clamp(0.001, 1.0)
}

/// Grounded control step on the legit record. Returns `true` when a jump
/// impulse was applied.
pub fn apply_control(
    state: &mut PlayerKinematicState,
    control: &EffectiveControl,
    cfg: &TickConfig,
    world: &WorldView,
    dtime: f32,
) -> bool {
    state.swimming_vertical = false;
    state.swimming_pitch = false;

    let settings = &cfg.settings;
    let overrides = cfg.overrides();
    let free_move = cfg.free_move();
    let fast_move = cfg.fast_move();
    let pitch_move = (free_move || state.in_liquid) && settings.pitch_move;
    let fast_climb = fast_move && control.aux1 && !settings.aux1_descends;
    let always_fly_fast = settings.always_fly_fast;
    let in_any_liquid = state.in_liquid || state.in_liquid_stable;

    let speed_walk = cfg.speed_walk();
    let speed_fast = cfg.speed_fast();
    let speed_climb = cfg.speed_climb();

    let mut superspeed = always_fly_fast && free_move && fast_move;
    let mut speed_v = 0.0;

    if settings.aux1_descends {
        if free_move && fast_move {
            superspeed = true;
        }
        if control.aux1 {
            if free_move {
                speed_v = -if fast_move { speed_fast } else { speed_walk };
            } else if in_any_liquid && !state.disable_descend {
                speed_v = -speed_walk;
                state.swimming_vertical = true;
            } else if state.is_climbing && !state.disable_descend {
                speed_v = -speed_climb;
            } else if fast_move {
                superspeed = true;
            }
        }
    } else {
        if control.aux1 && !state.is_climbing && fast_move {
            superspeed = true;
        }
        if control.sneak && !control.jump {
            if free_move {
                speed_v = -if fast_move && (control.aux1 || always_fly_fast) {
                    speed_fast
                } else {
                    speed_walk
                };
            } else if in_any_liquid && !state.disable_descend {
                speed_v = -if fast_climb { speed_fast } else { speed_walk };
                state.swimming_vertical = true;
            } else if state.is_climbing && !state.disable_descend {
                speed_v = -if fast_climb { speed_fast } else { speed_climb };
            }
        }
    }

    let mut jumped = false;
    if control.jump {
        if free_move {
            if !control.sneak {
                let fast_up = if settings.aux1_descends || always_fly_fast {
                    fast_move
                } else {
                    fast_move && control.aux1
                };
                speed_v = if fast_up { speed_fast } else { speed_walk };
            }
        } else if state.can_jump || overrides.jetpack {
            if state.velocity.y >= JUMP_MIN_VERTICAL_SPEED || overrides.jetpack {
                state.velocity.y = cfg.jump_speed();
                jumped = true;
            }
        } else if state.in_liquid && !state.disable_jump && !control.sneak {
            speed_v = if fast_climb { speed_fast } else { speed_walk };
            state.swimming_vertical = true;
        } else if state.is_climbing && !state.disable_jump && !control.sneak {
            speed_v = if fast_climb { speed_fast } else { speed_climb };
        }
    }

    let fast_regime =
        superspeed || (state.is_climbing && fast_climb) || (in_any_liquid && fast_climb);
    let magnitude = if fast_regime {
        speed_fast
    } else if control.sneak && !free_move && !in_any_liquid && !overrides.no_slow {
        cfg.speed_crouch()
    } else {
        speed_walk
    };
    let speed_h = Vec3::new(
        control.movement_direction.sin(),
        0.0,
        control.movement_direction.cos(),
    ) * magnitude
        * control.movement_speed;

    let bhop = &overrides.bhop;
    let airborne = !state.touching_ground && !free_move && !state.is_climbing && !state.in_liquid;
    let jump_initiating = !free_move && state.can_jump && control.jump;
    let (inc_h, inc_v) = if airborne || jump_initiating {
        let h = if superspeed || (fast_move && control.aux1) {
            cfg.acceleration_fast()
        } else if bhop.enabled {
            cfg.params.acceleration_air
                * bhop.accel_multiplier
                * cfg.physics.acceleration_air
                * bhop.accel_multiplier
        } else {
            cfg.acceleration_air()
        };
        (h * dtime, 0.0)
    } else if fast_regime {
        let f = cfg.acceleration_fast() * dtime;
        (f, f)
    } else {
        let d = if bhop.enabled {
            cfg.params.acceleration_default
                * bhop.accel_multiplier
                * cfg.physics.acceleration_default
                * bhop.accel_multiplier
        } else {
            cfg.acceleration_default()
        } * dtime;
        (d, d)
    };

    let slip = if !free_move && !in_any_liquid {
        slip_factor(world, state, overrides.antislip)
    } else {
        1.0
    };

    let mut target = speed_h + Vec3::new(0.0, speed_v, 0.0);
    if pitch_move && state.in_liquid && target.length() > SWIM_PITCH_MIN_TARGET {
        state.swimming_pitch = true;
    }
    target *= cfg.physics.speed;
    if bhop.enabled && bhop.speed && control.jump {
        target *= bhop.speed_multiplier;
    }

    state.velocity = accelerate(
        state.velocity,
        target,
        inc_h * cfg.physics.speed * slip,
        inc_v * cfg.physics.speed,
        state.yaw,
        state.pitch,
        pitch_move,
    );
    jumped
}

/// Gravity for the collision pass, after applying movement-resistance drag
/// to the legit velocity.
pub fn environment_forces(state: &mut PlayerKinematicState, cfg: &TickConfig, dtime: f32) -> f32 {
    if cfg.free_move() || state.is_climbing {
        return 0.0;
    }

    if state.move_resistance > 0 {
        let fluidity = cfg.liquid_fluidity().max(0.001);
        let smooth = cfg.liquid_fluidity_smooth();
        let in_liquid = state.in_liquid || state.in_liquid_stable;
        let wanted = if in_liquid {
            -state.velocity / fluidity
        } else {
            -state.velocity
        };
        let mut strength = wanted.length();
        if in_liquid {
            strength = strength.min(smooth * FLUIDITY_SMOOTH_SCALE);
        }
        strength *= f32::from(state.move_resistance) * RESISTANCE_SCALE + RESISTANCE_BASE;
        let change = (strength * dtime * RESISTANCE_RATE).min(state.velocity.length());
        state.velocity += wanted.normalize_or_zero() * change;
    }

    if state.in_liquid {
        if state.swimming_vertical || state.swimming_pitch {
            0.0
        } else {
            cfg.liquid_sink()
        }
    } else {
        cfg.gravity()
    }
}

pub fn apply_freecam_control(
    visual: &mut VisualState,
    control: &PlayerControl,
    legit: &PlayerKinematicState,
    cfg: &TickConfig,
    dtime: f32,
) {
    let settings = &cfg.settings;
    let speed_fast = cfg.speed_fast();
    let speed_walk = cfg.speed_walk();
    let fast_climb = control.aux1 && !settings.aux1_descends;
    let superspeed = settings.always_fly_fast
        || settings.aux1_descends
        || (control.aux1 && !legit.is_climbing);

    let mut speed_v = 0.0;
    if control.sneak && !control.jump && !settings.aux1_descends {
        speed_v = -if control.aux1 || settings.always_fly_fast {
            speed_fast
        } else {
            speed_walk
        };
    }
    // Sneak held with jump keeps the camera level.
    if control.jump && !control.sneak {
        speed_v = if settings.aux1_descends || settings.always_fly_fast || control.aux1 {
            speed_fast
        } else {
            speed_walk
        };
    }

    let speed_h = Vec3::new(
        control.movement_direction.sin(),
        0.0,
        control.movement_direction.cos(),
    ) * speed_fast
        * control.movement_speed;

    let fast = superspeed
        || (legit.is_climbing && fast_climb)
        || ((legit.in_liquid || legit.in_liquid_stable) && fast_climb);
    let inc = if fast {
        cfg.acceleration_fast()
    } else {
        cfg.acceleration_default()
    } * dtime;

    let target = (speed_h + Vec3::new(0.0, speed_v, 0.0)) * cfg.physics.speed;
    visual.velocity = accelerate(
        visual.velocity,
        target,
        inc * cfg.physics.speed,
        inc * cfg.physics.speed,
        visual.yaw,
        visual.pitch,
        settings.pitch_move,
    );
}

pub fn move_freecam(visual: &mut VisualState, dtime: f32) {
    visual.position += visual.velocity * dtime;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SneakRetention {
    pub can_jump: bool,
    pub fall_contact: Option<CollisionInfo>,
}

/// Keeps a sneaking player on `anchor`: clamps the horizontal position to
/// the anchor's box widened by `sneak_max` and lifts the feet onto ledges
/// lower than 0.6 nodes.
#[allow(clippy::too_many_arguments)]
pub fn retain_on_sneak_node(
    world: &WorldView,
    anchor: &SneakAnchor,
    collision_box: &Aabb,
    position: &mut Vec3,
    velocity: &mut Vec3,
    sneak_max: Vec3,
    ladder_detected: bool,
    sneak_glitch: bool,
    dtime: f32,
) -> SneakRetention {
    let bb = anchor.world_box();
    let old_position = *position;
    let old_velocity = *velocity;
    let y_diff = bb.max.y - position.y;

    if y_diff < SNEAK_LEDGE_MAX_RISE {
        position.x = position.x.clamp(bb.min.x - sneak_max.x, bb.max.x + sneak_max.x);
        position.z = position.z.clamp(bb.min.z - sneak_max.z, bb.max.z + sneak_max.z);
        if position.x != old_position.x {
            velocity.x = 0.0;
        }
        if position.z != old_position.z {
            velocity.z = 0.0;
        }
    }

    if y_diff > 0.0 && velocity.y <= 0.0 {
        let mut check = *position;
        check.y += y_diff * dtime * SNEAK_LEDGE_CLIMB_RATE + 0.01;
        if y_diff < SNEAK_LEDGE_MAX_RISE
            || (sneak_glitch && !collision_check_intersection(world, collision_box, check))
        {
            position.y = check.y.min(bb.max.y);
            velocity.y = 0.0;
        }
    }

    let can_jump = velocity.y.abs() <= f32::EPSILON || ladder_detected;
    let fall_contact = (velocity.y - old_velocity.y > SNEAK_FALL_REPORT_SPEED).then(|| {
        CollisionInfo {
            source: ContactSource::Node(anchor.node),
            axis: CollisionAxis::Y,
            old_speed: old_velocity,
            new_speed: *velocity,
            bouncy: 0,
        }
    });
    SneakRetention {
        can_jump,
        fall_contact,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JumpEligibility {
    pub can_jump: bool,
    pub disable_jump: bool,
    pub disable_descend: bool,
}

/// Derives jump eligibility after collision and applies the bouncy-node
/// vertical response to `velocity`.
pub fn resolve_jump_eligibility(
    world: &WorldView,
    state: &PlayerKinematicState,
    control: &EffectiveControl,
    cfg: &TickConfig,
    sneak_can_jump: bool,
    bouncy: i32,
    velocity: &mut Vec3,
) -> JumpEligibility {
    let standing = state.standing_node;
    let above = standing + IVec3::Y;
    let disable_jump =
        world.group_at(standing, "disable_jump") != 0 || world.group_at(above, "disable_jump") != 0;
    let disable_descend = world.group_at(standing, "disable_descend") != 0
        || world.group_at(above, "disable_descend") != 0;

    let mut can_jump = ((state.touching_ground && !state.is_climbing)
        || sneak_can_jump
        || bouncy != 0)
        && !disable_jump;

    let base_jump = cfg.jump_speed();
    if can_jump && (control.jump || control.sneak) && bouncy > 0 {
        let impulse = if !control.jump {
            -velocity.y / 3.0
        } else if base_jump == 0.0 {
            0.0
        } else if cfg.overrides().bhop.enabled {
            base_jump
        } else {
            base_jump / (1.0 + velocity.y * BOUNCE_BOOST_FALLOFF / base_jump)
        };
        velocity.y += impulse;
        can_jump = false;
    } else if velocity.y > base_jump && bouncy < 0 {
        can_jump = false;
    }

    if base_jump == 0.0 {
        can_jump = false;
    }

    JumpEligibility {
        can_jump,
        disable_jump,
        disable_descend,
    }
}
