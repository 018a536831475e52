use bevy::prelude::{IVec3, Vec3};
use tracing::{debug, trace};

use crate::autojump::handle_autojump;
use crate::collision::collision_move_simple;
use crate::config::{
    MovementParams, MovementSettings, PhysicsOverride, PhysicsOverridePatch, Privileges,
    TickConfig,
};
use crate::control::{
    ControlSource, EffectiveControl, PlayerControl, ScriptControlInput, apply_bhop,
    resolve_control,
};
use crate::kinematics::{
    apply_control, apply_freecam_control, environment_forces, move_freecam,
    resolve_jump_eligibility, retain_on_sneak_node,
};
use crate::stance::{
    bouncy_contact, classify, detect_climbing, footstep_node_pos, liquid_at_feet, liquid_stable,
    nearest_standing_node, sneak_max, update_sneak_node,
};
use crate::types::{
    Aabb, CollisionInfo, CollisionOutcome, MovementEvent, PlayerKinematicState, TickReport,
    VisualState, default_player_box,
};
use crate::world::{WorldView, floor_to_node};

pub const DEFAULT_STEP_HEIGHT: f32 = 0.6;
pub const AIRBORNE_STEP_HEIGHT: f32 = 0.2;
pub const DEFAULT_EYE_HEIGHT: f32 = 1.625;

const SCAFFOLD_STEP_MULT: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementSpeeds {
    pub walk: f32,
    pub crouch: f32,
    pub fast: f32,
    pub climb: f32,
    pub jump: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementAccelerations {
    pub default: f32,
    pub air: f32,
    pub fast: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidMovement {
    pub fluidity: f32,
    pub fluidity_smooth: f32,
    pub sink: f32,
    pub gravity: f32,
}

/// The local player: the legit kinematic record, the visual record and the
/// per-session movement tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalPlayer {
    pub legit: PlayerKinematicState,
    pub visual: VisualState,
    pub collision_box: Aabb,
    pub step_height: f32,
    pub eye_height: f32,
    pub params: MovementParams,
    pub physics_override: PhysicsOverride,
    script_control: PlayerControl,
    control: PlayerControl,
    parent: Option<Vec3>,
    added_velocity: Vec3,
    freecam_active: bool,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl LocalPlayer {
    pub fn new(position: Vec3) -> Self {
        let legit = PlayerKinematicState {
            position,
            standing_node: floor_to_node(position),
            ..Default::default()
        };
        Self {
            visual: VisualState {
                position,
                ..Default::default()
            },
            legit,
            collision_box: default_player_box(),
            step_height: DEFAULT_STEP_HEIGHT,
            eye_height: DEFAULT_EYE_HEIGHT,
            params: MovementParams::default(),
            physics_override: PhysicsOverride::default(),
            script_control: PlayerControl::default(),
            control: PlayerControl::default(),
            parent: None,
            added_velocity: Vec3::ZERO,
            freecam_active: false,
        }
    }

    pub fn with_collision_box(mut self, collision_box: Aabb) -> Self {
        self.collision_box = collision_box;
        self
    }

    /// Runs one simulation tick. `settings` and `privileges` are read once
    /// at the start and hold for the whole tick.
    pub fn step(
        &mut self,
        dtime: f32,
        world: &WorldView,
        direct: PlayerControl,
        settings: &MovementSettings,
        privileges: &dyn Privileges,
    ) -> TickReport {
        let cfg = TickConfig::capture(
            settings,
            &self.params,
            &self.physics_override,
            privileges,
        );
        let freecam = cfg.settings.freecam;

        let mut direct = direct;
        apply_bhop(&mut direct, &cfg);
        self.control = direct;
        let autojumping = self.legit.autojump.is_some();
        self.tick_autojump_window(dtime);

        self.visual.yaw = direct.yaw;
        self.visual.pitch = direct.pitch;
        if !freecam && !cfg.settings.detached_camera {
            self.legit.yaw = direct.yaw;
            self.legit.pitch = direct.pitch;
        }

        let mut control = resolve_control(
            &direct,
            &self.script_control,
            freecam,
            cfg.settings.lua_control,
        );
        if autojumping && control.source != ControlSource::Neutral {
            control.jump = true;
        }

        let mut events = Vec::new();
        // entity_speed detaches the body from its parent.
        let parent = self.parent.filter(|_| !cfg.settings.entity_speed);
        let (outcome, contacts) = if let Some(parent) = parent {
            self.legit.position = parent;
            self.legit.velocity = Vec3::ZERO;
            self.added_velocity = Vec3::ZERO;
            (CollisionOutcome::unresolved(parent, Vec3::ZERO), Vec::new())
        } else {
            if apply_control(&mut self.legit, &control, &cfg, world, dtime) {
                events.push(MovementEvent::Jump);
            }
            let gravity = environment_forces(&mut self.legit, &cfg, dtime);
            self.move_legit(dtime, world, &control, &cfg, gravity, &mut events)
        };

        if freecam {
            if !self.freecam_active {
                debug!(position = ?self.legit.position, "freecam detached");
                self.visual.position = self.legit.position;
                self.visual.velocity = Vec3::ZERO;
            }
            apply_freecam_control(
                &mut self.visual,
                &direct,
                &self.legit,
                &cfg,
                dtime,
            );
            move_freecam(&mut self.visual, dtime);
        } else {
            self.visual.position = self.legit.position;
            self.visual.velocity = self.legit.velocity;
        }
        self.freecam_active = freecam;

        TickReport {
            stance: classify(&self.legit, control.sneak),
            state: self.legit.clone(),
            visual: self.visual,
            outcome,
            contacts,
            events,
            control_source: control.source,
        }
    }

    fn tick_autojump_window(&mut self, dtime: f32) {
        if let Some(remaining) = self.legit.autojump {
            let remaining = remaining - dtime;
            self.legit.autojump = (remaining > 0.0).then_some(remaining);
        }
    }

    fn effective_step_height(&self, touching_ground: bool, cfg: &TickConfig) -> f32 {
        let base = if touching_ground {
            self.step_height
        } else {
            AIRBORNE_STEP_HEIGHT
        };
        let overrides = cfg.overrides();
        let mult = if overrides.step {
            overrides.step_mult
        } else if overrides.scaffold {
            SCAFFOLD_STEP_MULT
        } else {
            1.0
        };
        base * mult
    }

    fn move_legit(
        &mut self,
        dtime: f32,
        world: &WorldView,
        control: &EffectiveControl,
        cfg: &TickConfig,
        gravity: f32,
        events: &mut Vec<MovementEvent>,
    ) -> (CollisionOutcome, Vec<CollisionInfo>) {
        let overrides = *cfg.overrides();
        let free_move = cfg.free_move();
        let collision_box = self.collision_box;
        let step_height = self.effective_step_height(self.legit.touching_ground, cfg);
        let added_velocity = std::mem::take(&mut self.added_velocity);
        let state = &mut self.legit;

        let initial_position = state.position;
        state.standing_node = floor_to_node(initial_position);

        if cfg.noclip() && free_move {
            state.position += state.velocity * dtime;
            state.touching_ground = false;
            let outcome = CollisionOutcome::unresolved(state.position, state.velocity);
            return (outcome, Vec::new());
        }

        if !overrides.antiknockback {
            state.velocity += added_velocity;
        }
        let initial_velocity = state.velocity;

        let liquid = liquid_at_feet(world, initial_position, state.in_liquid);
        state.in_liquid = liquid.in_liquid;
        if let Some(resistance) = liquid.move_resistance {
            state.move_resistance = resistance;
        }
        state.in_liquid_stable = liquid_stable(world, initial_position);
        let was_climbing = state.is_climbing;
        state.is_climbing =
            detect_climbing(world, initial_position, free_move, overrides.spider);
        if was_climbing != state.is_climbing {
            trace!(climbing = state.is_climbing, "climb state changed");
        }

        let outcome = collision_move_simple(
            world,
            &collision_box,
            step_height,
            dtime,
            initial_position,
            initial_velocity,
            Vec3::new(0.0, -gravity, 0.0),
        );
        let mut position = outcome.position;
        let mut velocity = outcome.velocity;
        let mut contacts = outcome.collisions.clone();

        let could_sneak = control.sneak
            && !free_move
            && !state.in_liquid
            && !state.is_climbing
            && cfg.physics.sneak;

        if !free_move && !(could_sneak && state.sneak_anchor.is_some()) {
            state.standing_node = nearest_standing_node(&outcome, position, state.standing_node);
        }

        let touching_ground_was = state.touching_ground;
        state.touching_ground = outcome.touching_ground || (overrides.airjump && !control.sneak);

        let max_slack = sneak_max(&collision_box, state.sneak_ladder_detected);
        let mut sneak_can_jump = false;
        if could_sneak
            && !overrides.autosneak
            && let Some(anchor) = state.sneak_anchor
        {
            state.standing_node = anchor.node;
            let retention = retain_on_sneak_node(
                world,
                &anchor,
                &collision_box,
                &mut position,
                &mut velocity,
                max_slack,
                state.sneak_ladder_detected,
                cfg.physics.sneak_glitch,
                dtime,
            );
            sneak_can_jump = retention.can_jump;
            contacts.extend(retention.fall_contact);
        }

        state.sneak_anchor = if could_sneak {
            update_sneak_node(
                world,
                state.sneak_anchor,
                &mut state.sneak_ladder_detected,
                position,
                max_slack,
                collision_box.extent().y,
                cfg.physics.sneak_glitch,
            )
        } else {
            None
        };

        if !outcome.standing_on_object && !touching_ground_was && state.touching_ground {
            state.camera_impact = -initial_velocity.y;
            events.push(MovementEvent::RegainGround {
                impact: state.camera_impact,
            });
        }

        let bouncy = bouncy_contact(&outcome);
        let eligibility = resolve_jump_eligibility(
            world,
            state,
            control,
            cfg,
            sneak_can_jump,
            bouncy,
            &mut velocity,
        );
        state.can_jump = eligibility.can_jump;
        state.disable_jump = eligibility.disable_jump;
        state.disable_descend = eligibility.disable_descend;

        state.position = position;
        state.velocity = velocity;

        handle_autojump(
            world,
            cfg,
            control,
            state,
            &outcome,
            &collision_box,
            initial_position,
            initial_velocity,
            dtime,
        );

        (outcome, contacts)
    }

    pub fn position(&self) -> Vec3 {
        self.legit.position
    }

    /// Teleports both records.
    pub fn set_position(&mut self, position: Vec3) {
        self.legit.position = position;
        self.visual.position = position;
    }

    pub fn velocity(&self) -> Vec3 {
        self.legit.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.legit.velocity = velocity;
    }

    pub fn yaw(&self) -> f32 {
        self.visual.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.visual.pitch
    }

    pub fn legit_yaw(&self) -> f32 {
        self.legit.yaw
    }

    pub fn legit_pitch(&self) -> f32 {
        self.legit.pitch
    }

    pub fn set_legit_look(&mut self, yaw: f32, pitch: f32) {
        self.legit.yaw = yaw;
        self.legit.pitch = pitch;
    }

    pub fn control(&self) -> &PlayerControl {
        &self.control
    }

    pub fn script_control(&self) -> &PlayerControl {
        &self.script_control
    }

    pub fn set_lua_control(&mut self, input: ScriptControlInput) {
        self.script_control = input.into_control();
    }

    pub fn set_script_control(&mut self, control: PlayerControl) {
        self.script_control = control;
    }

    /// Queues a server push, applied to the next tick's collision move.
    pub fn add_velocity(&mut self, velocity: Vec3) {
        self.added_velocity += velocity;
    }

    pub fn pending_velocity(&self) -> Vec3 {
        self.added_velocity
    }

    pub fn attach(&mut self, parent_position: Vec3) {
        self.parent = Some(parent_position);
    }

    pub fn detach(&mut self) {
        self.parent = None;
    }

    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    pub fn patch_physics_override(&mut self, patch: &PhysicsOverridePatch) {
        self.physics_override.apply(patch);
    }

    pub fn movement_speeds(&self) -> MovementSpeeds {
        MovementSpeeds {
            walk: self.params.speed_walk,
            crouch: self.params.speed_crouch,
            fast: self.params.speed_fast,
            climb: self.params.speed_climb,
            jump: self.params.speed_jump,
        }
    }

    pub fn movement_accelerations(&self) -> MovementAccelerations {
        MovementAccelerations {
            default: self.params.acceleration_default,
            air: self.params.acceleration_air,
            fast: self.params.acceleration_fast,
        }
    }

    pub fn liquid_movement(&self) -> LiquidMovement {
        LiquidMovement {
            fluidity: self.params.liquid_fluidity,
            fluidity_smooth: self.params.liquid_fluidity_smooth,
            sink: self.params.liquid_sink,
            gravity: self.params.gravity,
        }
    }

    /// The retained sneak node while one exists, else the standing node.
    pub fn standing_node_pos(&self) -> IVec3 {
        self.legit
            .sneak_anchor
            .map_or(self.legit.standing_node, |anchor| anchor.node)
    }

    pub fn footstep_node_pos(&self) -> IVec3 {
        footstep_node_pos(&self.legit)
    }

    pub fn eye_offset(&self) -> Vec3 {
        Vec3::new(0.0, self.eye_height, 0.0)
    }
}
