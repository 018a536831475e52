use bevy::prelude::{IVec3, Vec3};
use serde_json::json;

use super::autojump::AUTOJUMP_WINDOW;
use super::collision::collision_move_simple;
use super::config::{
    AllPrivileges, MovementParams, MovementSettings, NoPrivileges, PhysicsOverride,
    PhysicsOverridePatch, TickConfig,
};
use super::control::{ControlSource, PlayerControl, ScriptControlInput, apply_bhop, resolve_control};
use super::history::{PredictionBuffer, RecordedTick, replay};
use super::kinematics::{apply_control, apply_freecam_control, slip_factor};
use super::player::LocalPlayer;
use super::stance::{detect_climbing, footstep_node_pos, liquid_at_feet, sneak_max, update_sneak_node};
use super::types::{
    Aabb, CollisionAxis, ContactSource, MovementEvent, PlayerKinematicState, Stance, VisualState,
    default_player_box,
};
use super::world::{ContentId, NodeDef, NodeRegistry, VoxelMap, WorldView};

const DT: f32 = 0.05;

struct TestNodes {
    registry: NodeRegistry,
    stone: ContentId,
    ice: ContentId,
    water: ContentId,
    ladder: ContentId,
    slab: ContentId,
    trampoline: ContentId,
    nojump: ContentId,
}

fn nodes() -> TestNodes {
    let mut registry = NodeRegistry::new();
    let stone = registry.register(NodeDef::solid("stone"));
    let ice = registry.register(NodeDef::solid("ice").with_group("slippery", 3));
    let water = registry.register(NodeDef::liquid("water", 1));
    let ladder = registry.register(NodeDef::passable("ladder").climbable());
    let slab = registry.register(
        NodeDef::solid("slab").with_boxes(vec![[0.0, 0.0, 0.0, 1.0, 0.5, 1.0]]),
    );
    let trampoline = registry.register(NodeDef::solid("trampoline").with_group("bouncy", 60));
    let nojump = registry.register(NodeDef::solid("nojump").with_group("disable_jump", 1));
    TestNodes {
        registry,
        stone,
        ice,
        water,
        ladder,
        slab,
        trampoline,
        nojump,
    }
}

fn loaded_map() -> VoxelMap {
    let mut map = VoxelMap::new();
    map.load_region(IVec3::splat(-16), IVec3::splat(15));
    map
}

fn flat_map(floor: ContentId) -> VoxelMap {
    let mut map = loaded_map();
    map.fill(IVec3::new(-8, 0, -8), IVec3::new(8, 0, 8), floor);
    map
}

fn forward() -> PlayerControl {
    PlayerControl::from_keys(true, false, false, false)
}

fn right() -> PlayerControl {
    PlayerControl::from_keys(false, false, false, true)
}

fn settled_player(world: &WorldView, settings: &MovementSettings) -> LocalPlayer {
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));
    for _ in 0..4 {
        player.step(DT, world, PlayerControl::default(), settings, &AllPrivileges);
    }
    player
}

fn input_sequence(len: usize) -> Vec<PlayerControl> {
    let mut inputs = Vec::with_capacity(len);
    for i in 0..len {
        let mut control = PlayerControl {
            movement_speed: if i % 2 == 0 { 0.6 } else { 0.3 },
            movement_direction: (i as f32 * 0.03) % 6.28,
            jump: i % 30 == 0,
            aux1: i % 20 < 10,
            sneak: i % 50 > 40,
            ..Default::default()
        };
        control.yaw = (i as f32 * 0.01) % 6.28;
        control.pitch = (i as f32 * 0.005) % 1.5;
        inputs.push(control);
    }
    inputs
}

#[test]
fn resting_on_floor_keeps_vertical_speed_at_zero() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));

    let report = player.step(0.1, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!(report.state.touching_ground);
    assert_eq!(report.state.velocity.y, 0.0);
    assert!((report.state.position.y - 1.0).abs() < 1e-4);

    for _ in 0..40 {
        player.step(0.1, &world, PlayerControl::default(), &settings, &AllPrivileges);
    }
    assert!(player.legit.touching_ground);
    assert!((player.position().y - 1.0).abs() < 1e-4);
    assert_eq!(player.velocity().y, 0.0);
    assert_eq!(player.legit.standing_node, IVec3::new(0, 0, 0));
}

#[test]
fn jump_sets_jump_speed_and_clears_can_jump() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let player = settled_player(&world, &settings);
    assert!(player.legit.can_jump);

    let cfg = TickConfig::capture(
        &settings,
        &player.params,
        &player.physics_override,
        &AllPrivileges,
    );
    let jump = PlayerControl {
        jump: true,
        ..Default::default()
    };
    let control = resolve_control(&jump, &PlayerControl::default(), false, false);
    let mut state = player.legit.clone();
    assert!(apply_control(&mut state, &control, &cfg, &world, DT));
    assert_eq!(state.velocity.y, 6.5);

    let mut player = player;
    let report = player.step(DT, &world, jump, &settings, &AllPrivileges);
    assert!(report.jumped());
    assert!(!report.state.can_jump);
    assert!(report.state.position.y > 1.0);

    let mut regrounded = false;
    for _ in 0..60 {
        let report = player.step(DT, &world, jump, &settings, &AllPrivileges);
        if !report.state.touching_ground {
            assert!(!report.state.can_jump);
        } else {
            regrounded = true;
            break;
        }
    }
    assert!(regrounded);
}

#[test]
fn slippery_floor_scales_acceleration_and_doubles_at_rest() {
    let n = nodes();
    let map = flat_map(n.ice);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let player = settled_player(&world, &settings);
    assert_eq!(player.legit.standing_node, IVec3::new(0, 0, 0));
    assert_eq!(player.legit.velocity, Vec3::ZERO);

    let slip = slip_factor(&world, &player.legit, false);
    assert!((slip - 1.0 / 7.0).abs() < 1e-6);
    assert_eq!(slip_factor(&world, &player.legit, true), 1.0);

    let mut moving = player.legit.clone();
    moving.velocity.x = 1.0;
    assert!((slip_factor(&world, &moving, false) - 0.25).abs() < 1e-6);

    let cfg = TickConfig::capture(
        &settings,
        &player.params,
        &player.physics_override,
        &AllPrivileges,
    );
    let control = resolve_control(&forward(), &PlayerControl::default(), false, false);
    let mut state = player.legit.clone();
    apply_control(&mut state, &control, &cfg, &world, 0.1);
    assert!((state.velocity.z - 0.3 / 7.0).abs() < 1e-5);
    assert!(state.velocity.x.abs() < 1e-6);
}

#[test]
fn freecam_flight_ignores_walls() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(-8, 1, 3), IVec3::new(8, 3, 3), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let mut settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    let legit_before = player.position();

    settings.freecam = true;
    for _ in 0..20 {
        let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
        assert_eq!(report.control_source, ControlSource::Neutral);
    }
    assert!(player.visual.position.z > 4.0);
    assert!((player.position() - legit_before).length() < 1e-4);

    settings.freecam = false;
    player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert_eq!(player.visual.position, player.position());
}

#[test]
fn noclip_free_move_bypasses_collision() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(-8, 1, 3), IVec3::new(8, 3, 3), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings {
        free_move: true,
        noclip: true,
        ..Default::default()
    };
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.5, 2.5));
    player.set_velocity(Vec3::new(0.0, 0.0, 10.0));

    for _ in 0..5 {
        let before = player.position();
        let report = player.step(0.1, &world, forward(), &settings, &AllPrivileges);
        assert_eq!(report.state.position, before + report.state.velocity * 0.1);
        assert!(report.contacts.is_empty());
        assert!(!report.outcome.collides);
        assert!(!report.state.touching_ground);
    }
    assert!(player.position().z > 3.0);
}

#[test]
fn free_move_without_noclip_still_collides() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(-8, 1, 3), IVec3::new(8, 3, 3), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings {
        free_move: true,
        ..Default::default()
    };
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.5, 2.5));
    player.set_velocity(Vec3::new(0.0, 0.0, 10.0));
    for _ in 0..5 {
        player.step(0.1, &world, forward(), &settings, &AllPrivileges);
    }
    assert!(player.position().z <= 2.7 + 1e-4);
}

#[test]
fn noclip_needs_privilege() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(-8, 1, 3), IVec3::new(8, 3, 3), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings {
        free_move: true,
        noclip: true,
        ..Default::default()
    };
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 2.5));
    player.set_velocity(Vec3::new(0.0, 0.0, 10.0));
    for _ in 0..5 {
        player.step(0.1, &world, forward(), &settings, &NoPrivileges);
    }
    assert!(player.position().z <= 2.7 + 1e-4);
}

fn wall_course(n: &TestNodes) -> VoxelMap {
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(0, 1, 2), n.stone);
    map
}

#[test]
fn autojump_disabled_never_commits() {
    let n = nodes();
    let map = wall_course(&n);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);

    for _ in 0..80 {
        let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
        assert!(report.state.autojump.is_none());
        assert!(!report.jumped());
    }
    assert!(player.position().z <= 1.7 + 1e-4);
    assert!((player.position().y - 1.0).abs() < 1e-4);
}

#[test]
fn autojump_hops_onto_one_node_wall() {
    let n = nodes();
    let map = wall_course(&n);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings {
        autojump: true,
        ..Default::default()
    };
    let mut player = settled_player(&world, &settings);

    let mut committed = false;
    let mut jumped = false;
    for _ in 0..80 {
        let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
        if let Some(window) = report.state.autojump {
            assert!(window <= AUTOJUMP_WINDOW);
            committed = true;
        }
        if report.jumped() {
            jumped = true;
            break;
        }
    }
    assert!(committed);
    assert!(jumped);
}

#[test]
fn autojump_blocked_by_ceiling() {
    let n = nodes();
    let mut map = wall_course(&n);
    map.fill(IVec3::new(-2, 3, -2), IVec3::new(2, 3, 2), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings {
        autojump: true,
        ..Default::default()
    };
    let mut player = settled_player(&world, &settings);
    for _ in 0..80 {
        let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
        assert!(report.state.autojump.is_none());
    }
}

#[test]
fn can_jump_false_blocks_impulse() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 5.0, 0.5));
    player.set_velocity(Vec3::new(0.0, -2.0, 0.0));
    let cfg = TickConfig::capture(
        &settings,
        &player.params,
        &player.physics_override,
        &AllPrivileges,
    );
    let jump = PlayerControl {
        jump: true,
        ..Default::default()
    };
    let control = resolve_control(&jump, &PlayerControl::default(), false, false);
    assert!(!player.legit.can_jump);
    let before = player.legit.velocity.y;
    assert!(!apply_control(&mut player.legit, &control, &cfg, &world, DT));
    assert!(player.legit.velocity.y <= before);
}

#[test]
fn disable_jump_group_blocks_jumping() {
    let n = nodes();
    let map = flat_map(n.nojump);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    assert!(player.legit.touching_ground);
    assert!(player.legit.disable_jump);
    assert!(!player.legit.can_jump);

    let jump = PlayerControl {
        jump: true,
        ..Default::default()
    };
    for _ in 0..10 {
        let report = player.step(DT, &world, jump, &settings, &AllPrivileges);
        assert!(!report.jumped());
    }
    assert!((player.position().y - 1.0).abs() < 1e-4);
}

#[test]
fn zero_jump_speed_forces_can_jump_false() {
    let n = nodes();
    for floor in [n.stone, n.trampoline, n.ice] {
        let map = flat_map(floor);
        let world = WorldView::new(&map, &n.registry);
        let settings = MovementSettings::default();
        let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));
        player.params.speed_jump = 0.0;
        let sneak = PlayerControl {
            sneak: true,
            ..Default::default()
        };
        for control in [PlayerControl::default(), sneak] {
            for _ in 0..6 {
                let report = player.step(DT, &world, control, &settings, &AllPrivileges);
                assert!(!report.state.can_jump);
            }
        }
    }
}

#[test]
fn sneak_retention_holds_standing_node_inside_tolerance() {
    let n = nodes();
    let mut map = loaded_map();
    map.set_node(IVec3::new(0, 0, 0), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));

    let mut sneak_right = right();
    sneak_right.sneak = true;
    let mut sneak_idle = PlayerControl::default();
    sneak_idle.sneak = true;

    let report = player.step(DT, &world, sneak_idle, &settings, &AllPrivileges);
    assert_eq!(report.state.sneak_anchor.map(|a| a.node), Some(IVec3::ZERO));

    let slack = default_player_box().extent().x * 0.49;
    for _ in 0..60 {
        let report = player.step(DT, &world, sneak_right, &settings, &AllPrivileges);
        assert_eq!(report.state.standing_node, IVec3::ZERO);
        assert_eq!(report.stance, Stance::SneakingOnNode);
        assert!(report.state.position.x <= 1.0 + slack + 1e-4);
        assert!((report.state.position.y - 1.0).abs() < 1e-3);
    }
    assert!(player.position().x > 1.0);
}

#[test]
fn sneak_anchor_moves_to_neighbour_and_drops_when_removed() {
    let n = nodes();
    let mut map = loaded_map();
    map.set_node(IVec3::new(0, 0, 0), n.stone);
    map.set_node(IVec3::new(1, 0, 0), n.stone);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));

    let mut sneak_right = right();
    sneak_right.sneak = true;
    {
        let world = WorldView::new(&map, &n.registry);
        for _ in 0..100 {
            player.step(DT, &world, sneak_right, &settings, &AllPrivileges);
        }
    }
    assert_eq!(
        player.legit.sneak_anchor.map(|a| a.node),
        Some(IVec3::new(1, 0, 0))
    );
    assert!(player.position().x > 2.0);

    map.set_node(IVec3::new(0, 0, 0), super::world::CONTENT_AIR);
    map.set_node(IVec3::new(1, 0, 0), super::world::CONTENT_AIR);
    let world = WorldView::new(&map, &n.registry);
    let mut sneak_idle = PlayerControl::default();
    sneak_idle.sneak = true;
    let report = player.step(DT, &world, sneak_idle, &settings, &AllPrivileges);
    assert!(report.state.sneak_anchor.is_none());
}

#[test]
fn releasing_sneak_clears_anchor() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));
    let mut sneak = PlayerControl::default();
    sneak.sneak = true;
    player.step(DT, &world, sneak, &settings, &AllPrivileges);
    assert!(player.legit.sneak_anchor.is_some());
    player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!(player.legit.sneak_anchor.is_none());
}

#[test]
fn sneak_anchor_is_replaced_once_player_leaves_its_reach() {
    let n = nodes();
    let mut map = loaded_map();
    map.set_node(IVec3::new(0, 0, 0), n.stone);
    map.set_node(IVec3::new(4, -2, 0), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));
    let mut sneak = PlayerControl::default();
    sneak.sneak = true;

    player.step(DT, &world, sneak, &settings, &AllPrivileges);
    assert_eq!(player.legit.sneak_anchor.map(|a| a.node), Some(IVec3::ZERO));

    player.set_position(Vec3::new(4.5, -1.0, 0.5));
    let report = player.step(DT, &world, sneak, &settings, &AllPrivileges);
    assert_eq!(report.state.sneak_anchor.map(|a| a.node), Some(IVec3::new(4, -2, 0)));
    assert_eq!(player.standing_node_pos(), IVec3::new(4, -2, 0));

    player.set_position(Vec3::new(10.5, -5.0, 0.5));
    let report = player.step(DT, &world, sneak, &settings, &AllPrivileges);
    assert!(report.state.sneak_anchor.is_none());
}

#[test]
fn sneak_search_prefers_later_side_on_equal_distance() {
    let n = nodes();
    let mut map = loaded_map();
    map.set_node(IVec3::new(0, 0, 1), n.stone);
    map.set_node(IVec3::new(1, 0, 0), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let bb = default_player_box();
    let mut ladder = false;
    let anchor = update_sneak_node(
        &world,
        None,
        &mut ladder,
        Vec3::new(1.0, 1.0, 1.0),
        sneak_max(&bb, false),
        bb.extent().y,
        false,
    );
    assert_eq!(anchor.map(|a| a.node), Some(IVec3::new(1, 0, 0)));
}

#[test]
fn collision_is_idempotent() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(0, 1, 1), n.slab);
    let world = WorldView::new(&map, &n.registry);
    let bb = default_player_box();
    let start = Vec3::new(0.5, 1.2, 0.4);
    let velocity = Vec3::new(0.7, -3.0, 4.0);
    let a = collision_move_simple(&world, &bb, 0.6, DT, start, velocity, Vec3::new(0.0, -9.81, 0.0));
    let b = collision_move_simple(&world, &bb, 0.6, DT, start, velocity, Vec3::new(0.0, -9.81, 0.0));
    assert_eq!(a, b);
}

#[test]
fn steps_onto_half_node() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(0, 1, 1), n.slab);
    let world = WorldView::new(&map, &n.registry);
    let bb = default_player_box();

    let out = collision_move_simple(
        &world,
        &bb,
        0.6,
        DT,
        Vec3::new(0.5, 1.0, 0.65),
        Vec3::new(0.0, 0.0, 4.0),
        Vec3::ZERO,
    );
    assert!((out.position.y - 1.5).abs() < 1e-4);
    assert!((out.position.z - 0.85).abs() < 1e-4);
    assert!(out.touching_ground);

    let blocked = collision_move_simple(
        &world,
        &bb,
        0.0,
        DT,
        Vec3::new(0.5, 1.0, 0.65),
        Vec3::new(0.0, 0.0, 4.0),
        Vec3::ZERO,
    );
    assert!((blocked.position.y - 1.0).abs() < 1e-4);
    assert!((blocked.position.z - 0.7).abs() < 1e-4);
    assert_eq!(blocked.velocity.z, 0.0);
    assert!(blocked.collisions.iter().any(|c| c.axis == CollisionAxis::Z
        && c.source == ContactSource::Node(IVec3::new(0, 1, 1))));
}

#[test]
fn full_wall_is_not_stepped() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(0, 1, 1), n.stone);
    let world = WorldView::new(&map, &n.registry);
    let out = collision_move_simple(
        &world,
        &default_player_box(),
        0.6,
        DT,
        Vec3::new(0.5, 1.0, 0.65),
        Vec3::new(0.0, 0.0, 4.0),
        Vec3::ZERO,
    );
    assert!((out.position.y - 1.0).abs() < 1e-4);
    assert!((out.position.z - 0.7).abs() < 1e-4);
}

#[test]
fn unloaded_space_does_not_block() {
    let n = nodes();
    let map = VoxelMap::new();
    let world = WorldView::new(&map, &n.registry);
    let out = collision_move_simple(
        &world,
        &default_player_box(),
        0.6,
        DT,
        Vec3::new(0.5, 1.0, 0.5),
        Vec3::new(1.0, -2.0, 0.0),
        Vec3::ZERO,
    );
    assert!(!out.collides);
    assert!(!out.touching_ground);
    assert_eq!(out.position, Vec3::new(0.5, 1.0, 0.5) + Vec3::new(1.0, -2.0, 0.0) * DT);
}

#[test]
fn unloading_a_block_removes_its_collision() {
    let n = nodes();
    let mut map = loaded_map();
    map.set_node(IVec3::ZERO, n.stone);
    assert!(map.is_loaded(IVec3::ZERO));

    map.unload_block(IVec3::ZERO);
    assert!(!map.is_loaded(IVec3::ZERO));
    assert!(!map.is_loaded(IVec3::new(15, 15, 15)));
    assert!(map.is_loaded(IVec3::new(-1, 0, 0)));

    let world = WorldView::new(&map, &n.registry);
    let out = collision_move_simple(
        &world,
        &default_player_box(),
        0.6,
        DT,
        Vec3::new(0.5, 1.0, 0.5),
        Vec3::new(0.0, -2.0, 0.0),
        Vec3::ZERO,
    );
    assert!(!out.collides);
    assert!(out.position.y < 1.0);
}

#[test]
fn bouncy_floor_reflects_fast_impacts() {
    let n = nodes();
    let map = flat_map(n.trampoline);
    let world = WorldView::new(&map, &n.registry);
    let out = collision_move_simple(
        &world,
        &default_player_box(),
        0.0,
        DT,
        Vec3::new(0.5, 1.2, 0.5),
        Vec3::new(0.0, -10.0, 0.0),
        Vec3::ZERO,
    );
    assert!((out.velocity.y - 6.0).abs() < 1e-4);
    let contact = out.collisions[0];
    assert_eq!(contact.axis, CollisionAxis::Y);
    assert_eq!(contact.bouncy, 60);

    let slow = collision_move_simple(
        &world,
        &default_player_box(),
        0.0,
        DT,
        Vec3::new(0.5, 1.05, 0.5),
        Vec3::new(0.0, -2.0, 0.0),
        Vec3::ZERO,
    );
    assert_eq!(slow.velocity.y, 0.0);
}

#[test]
fn bouncy_soft_catch_while_sneaking() {
    let n = nodes();
    let map = flat_map(n.trampoline);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.3, 0.5));
    player.set_velocity(Vec3::new(0.0, -10.0, 0.0));
    let mut sneak = PlayerControl::default();
    sneak.sneak = true;

    let report = player.step(DT, &world, sneak, &settings, &AllPrivileges);
    let bounced = report.outcome.velocity.y;
    assert!(bounced > 0.0);
    assert!((report.state.velocity.y - bounced * 2.0 / 3.0).abs() < 1e-4);
    assert!(!report.state.can_jump);
}

#[test]
fn liquid_entry_and_exit_use_different_sample_heights() {
    let n = nodes();
    let mut map = loaded_map();
    map.fill(IVec3::new(-2, 1, -2), IVec3::new(2, 2, 2), n.water);
    let world = WorldView::new(&map, &n.registry);
    let pos = Vec3::new(0.5, 2.6, 0.5);

    assert!(liquid_at_feet(&world, pos, true).in_liquid);
    assert!(!liquid_at_feet(&world, pos, false).in_liquid);
    let submerged = liquid_at_feet(&world, Vec3::new(0.5, 1.3, 0.5), false);
    assert!(submerged.in_liquid);
    assert_eq!(submerged.move_resistance, Some(1));
}

#[test]
fn player_sinks_slower_in_water_and_swims_up() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(-4, 1, -4), IVec3::new(4, 4, 4), n.water);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 3.0, 0.5));

    let report = player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!(report.state.in_liquid);
    assert!(matches!(report.stance, Stance::InLiquid { .. }));

    let jump = PlayerControl {
        jump: true,
        ..Default::default()
    };
    let start = player.position().y;
    for _ in 0..30 {
        let report = player.step(DT, &world, jump, &settings, &AllPrivileges);
        assert!(report.state.swimming_vertical || !report.state.in_liquid);
    }
    assert!(player.position().y > start);
}

#[test]
fn climbing_detection() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(0, 1, 0), n.ladder);
    map.set_node(IVec3::new(3, 1, 0), n.stone);
    let world = WorldView::new(&map, &n.registry);

    assert!(detect_climbing(&world, Vec3::new(0.5, 1.0, 0.5), false, false));
    assert!(!detect_climbing(&world, Vec3::new(0.5, 1.0, 0.5), true, false));
    assert!(!detect_climbing(&world, Vec3::new(2.5, 1.0, 0.5), false, false));
    assert!(detect_climbing(&world, Vec3::new(2.5, 1.0, 0.5), false, true));

    let empty = VoxelMap::new();
    let unloaded = WorldView::new(&empty, &n.registry);
    assert!(!detect_climbing(&unloaded, Vec3::new(0.5, 1.0, 0.5), false, true));
}

#[test]
fn ladder_climb_moves_player_up() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.fill(IVec3::new(0, 1, 0), IVec3::new(0, 6, 0), n.ladder);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    let jump = PlayerControl {
        jump: true,
        ..Default::default()
    };
    let mut climbed = false;
    for _ in 0..20 {
        let report = player.step(DT, &world, jump, &settings, &AllPrivileges);
        climbed |= report.stance == Stance::Climbing;
    }
    assert!(climbed);
    assert!(player.position().y > 1.5);
}

#[test]
fn regain_ground_fires_once_on_landing() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = LocalPlayer::new(Vec3::new(0.5, 4.0, 0.5));

    let mut impacts = Vec::new();
    for _ in 0..60 {
        let report = player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
        let kinds = report
            .events
            .iter()
            .filter(|e| matches!(e, MovementEvent::RegainGround { .. }))
            .count();
        assert!(kinds <= 1);
        impacts.extend(report.regained_ground());
    }
    assert_eq!(impacts.len(), 1);
    assert!(impacts[0] > 0.0);
}

#[test]
fn control_precedence() {
    let direct = forward().with_look(1.0, 0.2);
    let script = ScriptControlInput {
        jump: true,
        ..Default::default()
    }
    .into_control();

    let c = resolve_control(&direct, &script, false, false);
    assert_eq!(c.source, ControlSource::Direct);
    assert!(c.is_moving());

    let c = resolve_control(&direct, &script, true, false);
    assert_eq!(c.source, ControlSource::Neutral);
    assert!(!c.is_moving());
    assert!(!c.jump);
    assert_eq!(c.yaw, 1.0);

    let c = resolve_control(&direct, &script, true, true);
    assert_eq!(c.source, ControlSource::Script);
    assert!(c.jump);
    assert!(!c.is_moving());
    assert_eq!(c.pitch, 0.2);
}

#[test]
fn script_control_defaults_missing_fields() {
    let input = ScriptControlInput::from_json(&json!({
        "up": true,
        "jump": "yes",
        "sneak": 1,
    }));
    assert!(input.up);
    assert!(!input.jump);
    assert!(!input.sneak);
    assert!(!input.aux1);

    assert_eq!(ScriptControlInput::from_json(&json!([1, 2])), ScriptControlInput::default());
    let parsed: ScriptControlInput = serde_json::from_str(r#"{"left": true}"#).unwrap();
    assert!(parsed.left);
    assert!(!parsed.right);
}

#[test]
fn script_control_drives_legit_while_freecam_flies() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let mut settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    settings.freecam = true;
    settings.lua_control = true;
    player.set_lua_control(ScriptControlInput::from_json(&json!({ "right": true })));

    for _ in 0..20 {
        let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
        assert_eq!(report.control_source, ControlSource::Script);
    }
    assert!(player.position().x > 0.6);
    assert!(player.visual.position.z > player.position().z + 0.5);
}

#[test]
fn bhop_forces_jump_and_sprint_when_moving() {
    let mut settings = MovementSettings::default();
    settings.overrides.bhop.enabled = true;
    let cfg = TickConfig::capture(
        &settings,
        &Default::default(),
        &Default::default(),
        &AllPrivileges,
    );

    let mut moving = forward();
    apply_bhop(&mut moving, &cfg);
    assert!(moving.jump);
    assert!(moving.aux1);

    let mut idle = PlayerControl::default();
    apply_bhop(&mut idle, &cfg);
    assert!(!idle.jump);
}

#[test]
fn attached_player_follows_parent() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    player.attach(Vec3::new(3.0, 5.0, 3.0));
    let report = player.step(DT, &world, forward(), &settings, &AllPrivileges);
    assert_eq!(report.state.position, Vec3::new(3.0, 5.0, 3.0));
    assert_eq!(report.state.velocity, Vec3::ZERO);
    player.detach();
    assert!(!player.is_attached());
}

#[test]
fn entity_speed_lets_attached_player_walk() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let start = Vec3::new(5.5, 1.0, 5.5);
    let mut player = LocalPlayer::new(start);
    player.attach(start);

    let settings = MovementSettings {
        entity_speed: true,
        ..Default::default()
    };
    for _ in 0..20 {
        player.step(DT, &world, forward(), &settings, &AllPrivileges);
    }
    assert!(player.position().z > start.z + 1e-3);
    assert!(player.is_attached());

    let pinned = player.position();
    player.attach(pinned);
    player.step(DT, &world, forward(), &MovementSettings::default(), &AllPrivileges);
    assert_eq!(player.position(), pinned);
}

#[test]
fn server_push_is_applied_once() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);

    player.add_velocity(Vec3::new(0.0, 6.0, 0.0));
    let report = player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!(report.state.velocity.y > 5.0);
    assert!(report.state.position.y > 1.0);
    assert_eq!(player.pending_velocity(), Vec3::ZERO);

    let report = player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!(report.state.velocity.y < 5.5);
}

#[test]
fn server_push_dropped_by_antiknockback_attachment_and_noclip() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let mut settings = MovementSettings::default();
    settings.overrides.antiknockback = true;
    let mut player = settled_player(&world, &settings);

    player.add_velocity(Vec3::new(0.0, 6.0, 0.0));
    let report = player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert!((report.state.position.y - 1.0).abs() < 1e-4);
    assert_eq!(player.pending_velocity(), Vec3::ZERO);

    let settings = MovementSettings::default();
    player.attach(Vec3::new(2.0, 4.0, 2.0));
    player.add_velocity(Vec3::new(0.0, 6.0, 0.0));
    player.step(DT, &world, PlayerControl::default(), &settings, &AllPrivileges);
    assert_eq!(player.pending_velocity(), Vec3::ZERO);
    player.detach();

    let flying = MovementSettings {
        free_move: true,
        noclip: true,
        ..Default::default()
    };
    player.set_velocity(Vec3::ZERO);
    let before = player.position();
    player.add_velocity(Vec3::new(0.0, 6.0, 0.0));
    player.step(DT, &world, PlayerControl::default(), &flying, &AllPrivileges);
    assert_eq!(player.pending_velocity(), Vec3::ZERO);
    assert!((player.position().y - before.y).abs() < 1e-4);
}

#[test]
fn movement_tables_follow_params_and_overrides() {
    let mut player = LocalPlayer::new(Vec3::ZERO);
    let speeds = player.movement_speeds();
    assert_eq!(speeds.walk, 4.0);
    assert_eq!(speeds.fast, 20.0);
    assert_eq!(speeds.jump, 6.5);
    let accel = player.movement_accelerations();
    assert_eq!((accel.default, accel.air, accel.fast), (3.0, 2.0, 10.0));
    let liquid = player.liquid_movement();
    assert_eq!(liquid.fluidity, 1.0);
    assert_eq!(liquid.fluidity_smooth, 0.5);
    assert_eq!(liquid.sink, 10.0);
    assert_eq!(liquid.gravity, 9.81);

    player.params.speed_walk = 2.0;
    assert_eq!(player.movement_speeds().walk, 2.0);
    assert_eq!(player.eye_offset(), Vec3::new(0.0, player.eye_height, 0.0));
}

#[test]
fn legit_look_is_separate_from_camera() {
    let mut player = LocalPlayer::new(Vec3::ZERO);
    player.set_legit_look(1.25, -0.5);
    assert_eq!(player.legit_yaw(), 1.25);
    assert_eq!(player.legit_pitch(), -0.5);
    assert_eq!(player.yaw(), 0.0);
}

#[test]
fn physics_override_patch_keeps_absent_fields() {
    let mut player = LocalPlayer::default();
    player.patch_physics_override(&PhysicsOverridePatch {
        jump: Some(2.0),
        sneak: Some(false),
        ..Default::default()
    });
    assert_eq!(player.physics_override.jump, 2.0);
    assert!(!player.physics_override.sneak);
    assert_eq!(player.physics_override.speed, 1.0);
}

#[test]
fn footstep_and_standing_node_accessors() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let player = settled_player(&world, &settings);
    assert_eq!(player.standing_node_pos(), IVec3::new(0, 0, 0));
    assert_eq!(player.footstep_node_pos(), IVec3::new(0, 0, 0));

    let airborne = LocalPlayer::new(Vec3::new(0.5, 3.2, 0.5));
    assert_eq!(airborne.footstep_node_pos(), IVec3::new(0, 2, 0));
}

#[test]
fn resolver_passes_analog_magnitude_through() {
    let direct = PlayerControl {
        movement_speed: 1.5,
        ..Default::default()
    };
    let effective = resolve_control(&direct, &PlayerControl::default(), false, false);
    assert_eq!(effective.movement_speed, 1.5);
}

#[test]
fn script_control_never_zooms() {
    let input = ScriptControlInput::from_json(&json!({ "zoom": true, "up": true }));
    let control = input.into_control();
    assert!(control.up);
    assert!(!control.zoom);
}

#[test]
fn freecam_holds_height_while_sneak_and_jump_are_held() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let mut settings = MovementSettings::default();
    let mut player = settled_player(&world, &settings);
    settings.freecam = true;

    let mut both = PlayerControl::default();
    both.jump = true;
    both.sneak = true;
    let start_y = player.position().y;
    for _ in 0..20 {
        player.step(DT, &world, both, &settings, &AllPrivileges);
    }
    assert_eq!(player.visual.position.y, start_y);

    let mut jump = PlayerControl::default();
    jump.jump = true;
    for _ in 0..5 {
        player.step(DT, &world, jump, &settings, &AllPrivileges);
    }
    assert!(player.visual.position.y > start_y);
}

#[test]
fn freecam_fast_climb_uses_fast_acceleration() {
    let settings = MovementSettings {
        freecam: true,
        always_fly_fast: false,
        ..Default::default()
    };
    let cfg = TickConfig::capture(
        &settings,
        &MovementParams::default(),
        &PhysicsOverride::default(),
        &AllPrivileges,
    );
    let mut control = forward();
    control.aux1 = true;
    let legit = PlayerKinematicState {
        is_climbing: true,
        ..Default::default()
    };
    let mut visual = VisualState::default();
    apply_freecam_control(&mut visual, &control, &legit, &cfg, DT);
    let expected = cfg.acceleration_fast() * DT;
    assert!((visual.velocity.length() - expected).abs() < 1e-4);

    let mut visual = VisualState::default();
    let walking = PlayerKinematicState::default();
    control.aux1 = false;
    apply_freecam_control(&mut visual, &control, &walking, &cfg, DT);
    assert!((visual.velocity.length() - cfg.acceleration_default() * DT).abs() < 1e-4);
}

#[test]
fn footstep_uses_stable_liquid_flag() {
    let mut state = PlayerKinematicState {
        position: Vec3::new(0.5, 3.2, 0.5),
        in_liquid: true,
        ..Default::default()
    };
    assert_eq!(footstep_node_pos(&state), IVec3::new(0, 2, 0));
    state.in_liquid_stable = true;
    assert_eq!(footstep_node_pos(&state), IVec3::new(0, 3, 0));
}

#[test]
fn node_box_union_and_registry_fallback() {
    let n = nodes();
    let slab = n.registry.get(n.slab);
    assert_eq!(slab.bounding_box(), Aabb::from_array([0.0, 0.0, 0.0, 1.0, 0.5, 1.0]));
    assert!(!n.registry.get(9000).walkable);
    assert_eq!(n.registry.id_of("water"), Some(n.water));
}

#[test]
fn determinism() {
    let n = nodes();
    let map = flat_map(n.stone);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let inputs = input_sequence(200);

    let run = || {
        let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));
        for input in &inputs {
            player.step(DT, &world, *input, &settings, &AllPrivileges);
        }
        player
    };
    let a = run();
    let b = run();
    assert_eq!(a.legit, b.legit);
    assert_eq!(a.visual, b.visual);
}

#[test]
fn replay_equivalence() {
    let n = nodes();
    let mut map = flat_map(n.stone);
    map.set_node(IVec3::new(2, 1, 2), n.slab);
    let world = WorldView::new(&map, &n.registry);
    let settings = MovementSettings::default();
    let inputs = input_sequence(200);
    let mut buffer = PredictionBuffer::new(256);
    let mut player = LocalPlayer::new(Vec3::new(0.5, 1.0, 0.5));

    for (tick, input) in inputs.iter().enumerate() {
        if tick == 150 {
            player.add_velocity(Vec3::new(2.0, 4.0, 0.0));
        }
        let added_velocity = player.pending_velocity();
        player.step(DT, &world, *input, &settings, &AllPrivileges);
        buffer.push(RecordedTick {
            tick: tick as u32,
            dtime: DT,
            direct: *input,
            script: *player.script_control(),
            settings,
            added_velocity,
            player: player.clone(),
        });
    }

    let latest = buffer.latest_tick().unwrap();
    let replayed = replay(&buffer, 120, latest, &world, &AllPrivileges).unwrap();
    assert_eq!(replayed.legit, player.legit);
    assert_eq!(replayed.visual, player.visual);
}

#[test]
fn ring_buffer_integrity() {
    let mut buffer = PredictionBuffer::new(8);
    let player = LocalPlayer::default();
    for tick in 0..20u32 {
        buffer.push(RecordedTick {
            tick,
            dtime: DT,
            direct: PlayerControl::default(),
            script: PlayerControl::default(),
            settings: MovementSettings::default(),
            added_velocity: Vec3::ZERO,
            player: player.clone(),
        });
    }

    assert!(buffer.get_by_tick(11).is_none());
    assert!(buffer.get_by_tick(12).is_some());
    assert!(buffer.get_by_tick(19).is_some());
    assert_eq!(buffer.latest_tick(), Some(19));

    buffer.truncate_older_than(16);
    assert!(buffer.get_by_tick(15).is_none());
    assert!(buffer.get_by_tick(16).is_some());

    if let Some(frame) = buffer.get_by_tick_mut(17) {
        frame.dtime = 0.1;
    }
    assert_eq!(buffer.get_by_tick(17).map(|f| f.dtime), Some(0.1));
    assert!(replay(&buffer, 3, 19, &WorldView::new(&VoxelMap::new(), &NodeRegistry::new()), &AllPrivileges).is_none());
}
