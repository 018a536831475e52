use bevy::prelude::{IVec3, Vec3};

use crate::types::{Aabb, CollisionAxis, CollisionInfo, CollisionOutcome, ContactSource};
use crate::world::WorldView;

const COLLISION_EPS: f32 = 1e-5;
const GROUND_REACH: f32 = 0.05;
const BOUNCE_MIN_SPEED: f32 = 3.0;

#[derive(Clone, Copy, Debug)]
struct CollisionBox {
    aabb: Aabb,
    source: ContactSource,
    bouncy: i32,
    at_rest: bool,
}

#[derive(Clone, Copy, Debug)]
struct Sweep {
    bb: Aabb,
    applied: Vec3,
    hits: [Option<usize>; 3],
    landed: bool,
}

impl Sweep {
    fn horizontal_distance_sq(&self) -> f32 {
        self.applied.x * self.applied.x + self.applied.z * self.applied.z
    }

    fn blocked_horizontally(&self) -> bool {
        self.hits[CollisionAxis::X.index()].is_some()
            || self.hits[CollisionAxis::Z.index()].is_some()
    }
}

/// Moves `collision_box` (feet-relative) from `position` for `dtime`
/// seconds, resolving contacts against walkable node geometry and the
/// dynamic objects of `world`.
pub fn collision_move_simple(
    world: &WorldView,
    collision_box: &Aabb,
    step_height: f32,
    dtime: f32,
    position: Vec3,
    velocity: Vec3,
    acceleration: Vec3,
) -> CollisionOutcome {
    let mut speed = velocity + acceleration * dtime;
    let motion = speed * dtime;
    let step_height = step_height.max(0.0);

    let start = collision_box.offset(position);
    let query = start
        .expanded_by_motion(motion)
        .expanded_by_motion(Vec3::new(0.0, step_height, 0.0))
        .expanded_by_motion(Vec3::new(0.0, -GROUND_REACH, 0.0));
    let boxes = collect_collision_boxes(world, &query);

    let mut sweep = sweep_axes(&boxes, start, motion);
    if step_height > 0.0 && sweep.blocked_horizontally() && motion.y <= 0.0 {
        let stepped = step_up(&boxes, start, motion, step_height);
        if stepped.horizontal_distance_sq() > sweep.horizontal_distance_sq() {
            sweep = stepped;
        }
    }

    let mut collisions = Vec::new();
    let mut touching_ground = false;
    let mut standing_on_object = false;
    for axis in [CollisionAxis::Y, CollisionAxis::X, CollisionAxis::Z] {
        let Some(idx) = sweep.hits[axis.index()] else {
            continue;
        };
        let hit = &boxes[idx];
        let old_speed = speed;
        let v = speed[axis.index()];
        speed[axis.index()] = if hit.bouncy != 0 && v.abs() > BOUNCE_MIN_SPEED {
            -v * hit.bouncy.abs() as f32 / 100.0
        } else {
            0.0
        };
        if axis == CollisionAxis::Y && sweep.landed {
            touching_ground = true;
            if matches!(hit.source, ContactSource::Object(_)) {
                standing_on_object = true;
            }
        }
        collisions.push(CollisionInfo {
            source: hit.source,
            axis,
            old_speed,
            new_speed: speed,
            bouncy: hit.bouncy,
        });
    }

    if speed.y <= 0.0 {
        for b in &boxes {
            let is_object = matches!(b.source, ContactSource::Object(_));
            if is_object && !b.at_rest {
                continue;
            }
            let gap = sweep.bb.min.y - b.aabb.max.y;
            if overlap_xz(&sweep.bb, &b.aabb) && gap > -COLLISION_EPS && gap < GROUND_REACH {
                touching_ground = true;
                standing_on_object |= is_object;
            }
        }
    }

    CollisionOutcome {
        position: position + sweep.applied,
        velocity: speed,
        collides: !collisions.is_empty(),
        collisions,
        touching_ground,
        standing_on_object,
    }
}

/// Whether a body with `collision_box` placed at `position` overlaps any
/// walkable node geometry.
pub fn collision_check_intersection(world: &WorldView, collision_box: &Aabb, position: Vec3) -> bool {
    let bb = collision_box.offset(position);
    collect_collision_boxes(world, &bb)
        .iter()
        .any(|b| matches!(b.source, ContactSource::Node(_)) && bb.intersects(&b.aabb))
}

fn collect_collision_boxes(world: &WorldView, query: &Aabb) -> Vec<CollisionBox> {
    let (min_x, max_x) = block_range(query.min.x, query.max.x);
    let (min_y, max_y) = block_range(query.min.y, query.max.y);
    let (min_z, max_z) = block_range(query.min.z, query.max.z);
    let mut out = Vec::new();
    for y in min_y..=max_y {
        for z in min_z..=max_z {
            for x in min_x..=max_x {
                let p = IVec3::new(x, y, z);
                let Some(def) = world.def_at(p) else {
                    continue;
                };
                if !def.walkable {
                    continue;
                }
                let bouncy = def.group("bouncy");
                let origin = p.as_vec3();
                for local in def.collision_boxes() {
                    out.push(CollisionBox {
                        aabb: local.offset(origin),
                        source: ContactSource::Node(p),
                        bouncy,
                        at_rest: true,
                    });
                }
            }
        }
    }
    for object in world.objects() {
        if object.collision_box.intersects(query) {
            out.push(CollisionBox {
                aabb: object.collision_box,
                source: ContactSource::Object(object.id),
                bouncy: object.bouncy,
                at_rest: object.at_rest(),
            });
        }
    }
    out
}

fn sweep_axes(boxes: &[CollisionBox], bb: Aabb, motion: Vec3) -> Sweep {
    let mut sweep = Sweep {
        bb,
        applied: Vec3::ZERO,
        hits: [None; 3],
        landed: false,
    };
    for axis in [CollisionAxis::Y, CollisionAxis::X, CollisionAxis::Z] {
        sweep_axis(boxes, &mut sweep, axis, motion[axis.index()]);
    }
    sweep.landed = sweep.hits[CollisionAxis::Y.index()].is_some() && motion.y < 0.0;
    sweep
}

fn sweep_axis(boxes: &[CollisionBox], sweep: &mut Sweep, axis: CollisionAxis, delta: f32) {
    let (clipped, hit) = clip_axis(boxes, &sweep.bb, axis, delta);
    let mut offset = Vec3::ZERO;
    offset[axis.index()] = clipped;
    sweep.bb = sweep.bb.offset(offset);
    sweep.applied[axis.index()] += clipped;
    if hit.is_some() {
        sweep.hits[axis.index()] = hit;
    }
}

// Raise by the step height, move horizontally, then settle back down.
fn step_up(boxes: &[CollisionBox], start: Aabb, motion: Vec3, step_height: f32) -> Sweep {
    let mut sweep = Sweep {
        bb: start,
        applied: Vec3::ZERO,
        hits: [None; 3],
        landed: false,
    };
    let (raise, _) = clip_axis(boxes, &sweep.bb, CollisionAxis::Y, step_height);
    sweep.bb = sweep.bb.offset(Vec3::new(0.0, raise, 0.0));
    sweep.applied.y = raise;

    sweep_axis(boxes, &mut sweep, CollisionAxis::X, motion.x);
    sweep_axis(boxes, &mut sweep, CollisionAxis::Z, motion.z);

    let settle = motion.y - raise;
    sweep_axis(boxes, &mut sweep, CollisionAxis::Y, settle);
    sweep.landed = sweep.hits[CollisionAxis::Y.index()].is_some() && settle < 0.0;
    sweep
}

fn clip_axis(
    boxes: &[CollisionBox],
    bb: &Aabb,
    axis: CollisionAxis,
    delta: f32,
) -> (f32, Option<usize>) {
    let centre = bb.center();
    // Equal limits go to the box closest to the body across the axis.
    let lateral = |b: &Aabb| {
        let mut d = b.center() - centre;
        d[axis.index()] = 0.0;
        d.length_squared()
    };
    let mut clipped = delta;
    let mut hit: Option<usize> = None;
    for (idx, b) in boxes.iter().enumerate() {
        let limited = axis_offset(bb, &b.aabb, axis, delta);
        if limited == delta {
            continue;
        }
        let tighter = if delta > 0.0 {
            limited < clipped
        } else {
            limited > clipped
        };
        let closer = limited == clipped
            && hit.is_some_and(|h| lateral(&b.aabb) < lateral(&boxes[h].aabb));
        if tighter || closer {
            clipped = limited;
            hit = Some(idx);
        }
    }
    (clipped, hit)
}

fn axis_offset(entity: &Aabb, block: &Aabb, axis: CollisionAxis, mut d: f32) -> f32 {
    let overlaps = match axis {
        CollisionAxis::X => overlap_yz(entity, block),
        CollisionAxis::Y => overlap_xz(entity, block),
        CollisionAxis::Z => overlap_xy(entity, block),
    };
    if !overlaps {
        return d;
    }
    let a = axis.index();
    if d > 0.0 && entity.max[a] <= block.min[a] + COLLISION_EPS {
        d = d.min(block.min[a] - entity.max[a]);
    } else if d < 0.0 && entity.min[a] >= block.max[a] - COLLISION_EPS {
        d = d.max(block.max[a] - entity.min[a]);
    }
    d
}

fn overlap_xz(a: &Aabb, b: &Aabb) -> bool {
    a.max.x > b.min.x + COLLISION_EPS
        && a.min.x < b.max.x - COLLISION_EPS
        && a.max.z > b.min.z + COLLISION_EPS
        && a.min.z < b.max.z - COLLISION_EPS
}

fn overlap_yz(a: &Aabb, b: &Aabb) -> bool {
    a.max.y > b.min.y + COLLISION_EPS
        && a.min.y < b.max.y - COLLISION_EPS
        && a.max.z > b.min.z + COLLISION_EPS
        && a.min.z < b.max.z - COLLISION_EPS
}

fn overlap_xy(a: &Aabb, b: &Aabb) -> bool {
    a.max.x > b.min.x + COLLISION_EPS
        && a.min.x < b.max.x - COLLISION_EPS
        && a.max.y > b.min.y + COLLISION_EPS
        && a.min.y < b.max.y - COLLISION_EPS
}

fn block_range(min: f32, max: f32) -> (i32, i32) {
    let min_i = (min + COLLISION_EPS).floor() as i32;
    let max_i = (max - COLLISION_EPS).floor() as i32;
    if min_i <= max_i {
        (min_i, max_i)
    } else {
        (max_i, min_i)
    }
}
