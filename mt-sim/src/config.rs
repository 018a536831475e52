use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Tuning of the bunny-hop override.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BhopSettings {
    pub enabled: bool,
    pub speed: bool,
    pub sprint: bool,
    pub jump: bool,
    pub accel_multiplier: f32,
    pub speed_multiplier: f32,
}

impl Default for BhopSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            speed: true,
            sprint: true,
            jump: true,
            accel_multiplier: 100.0,
            speed_multiplier: 1.2,
        }
    }
}

/// Cheat toggles. Each one intentionally changes the legit trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementOverrides {
    pub airjump: bool,
    pub spider: bool,
    pub jetpack: bool,
    pub antislip: bool,
    pub no_slow: bool,
    pub autosneak: bool,
    pub step: bool,
    pub step_mult: f32,
    pub scaffold: bool,
    /// Ignores velocity pushed by the server.
    pub antiknockback: bool,
    pub bhop: BhopSettings,
}

impl Default for MovementOverrides {
    fn default() -> Self {
        Self {
            airjump: false,
            spider: false,
            jetpack: false,
            antislip: false,
            no_slow: false,
            autosneak: false,
            step: false,
            step_mult: 2.0,
            scaffold: false,
            antiknockback: false,
            bhop: BhopSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    pub freecam: bool,
    pub free_move: bool,
    pub pitch_move: bool,
    pub fast_move: bool,
    pub noclip: bool,
    pub autojump: bool,
    pub aux1_descends: bool,
    pub always_fly_fast: bool,
    pub lua_control: bool,
    pub detached_camera: bool,
    pub entity_speed: bool,
    pub overrides: MovementOverrides,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            freecam: false,
            free_move: false,
            pitch_move: false,
            fast_move: false,
            noclip: false,
            autojump: false,
            aux1_descends: false,
            always_fly_fast: true,
            lua_control: false,
            detached_camera: false,
            entity_speed: false,
            overrides: MovementOverrides::default(),
        }
    }
}

/// Movement constants sent by the server.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    pub acceleration_default: f32,
    pub acceleration_air: f32,
    pub acceleration_fast: f32,
    pub speed_walk: f32,
    pub speed_crouch: f32,
    pub speed_fast: f32,
    pub speed_climb: f32,
    pub speed_jump: f32,
    pub liquid_fluidity: f32,
    pub liquid_fluidity_smooth: f32,
    pub liquid_sink: f32,
    pub gravity: f32,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            acceleration_default: 3.0,
            acceleration_air: 2.0,
            acceleration_fast: 10.0,
            speed_walk: 4.0,
            speed_crouch: 1.35,
            speed_fast: 20.0,
            speed_climb: 3.0,
            speed_jump: 6.5,
            liquid_fluidity: 1.0,
            liquid_fluidity_smooth: 0.5,
            liquid_sink: 10.0,
            gravity: 9.81,
        }
    }
}

/// Per-player multipliers set by server scripts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsOverride {
    pub speed: f32,
    pub jump: f32,
    pub gravity: f32,
    pub sneak: bool,
    pub sneak_glitch: bool,
    pub speed_climb: f32,
    pub speed_crouch: f32,
    pub liquid_fluidity: f32,
    pub liquid_fluidity_smooth: f32,
    pub liquid_sink: f32,
    pub acceleration_default: f32,
    pub acceleration_air: f32,
    pub speed_fast: f32,
    pub acceleration_fast: f32,
    pub speed_walk: f32,
}

impl Default for PhysicsOverride {
    fn default() -> Self {
        Self {
            speed: 1.0,
            jump: 1.0,
            gravity: 1.0,
            sneak: true,
            sneak_glitch: false,
            speed_climb: 1.0,
            speed_crouch: 1.0,
            liquid_fluidity: 1.0,
            liquid_fluidity_smooth: 1.0,
            liquid_sink: 1.0,
            acceleration_default: 1.0,
            acceleration_air: 1.0,
            speed_fast: 1.0,
            acceleration_fast: 1.0,
            speed_walk: 1.0,
        }
    }
}

/// Partial update of a [`PhysicsOverride`]; absent fields keep their value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsOverridePatch {
    pub speed: Option<f32>,
    pub jump: Option<f32>,
    pub gravity: Option<f32>,
    pub sneak: Option<bool>,
    pub sneak_glitch: Option<bool>,
    pub speed_climb: Option<f32>,
    pub speed_crouch: Option<f32>,
    pub liquid_fluidity: Option<f32>,
    pub liquid_fluidity_smooth: Option<f32>,
    pub liquid_sink: Option<f32>,
    pub acceleration_default: Option<f32>,
    pub acceleration_air: Option<f32>,
    pub speed_fast: Option<f32>,
    pub acceleration_fast: Option<f32>,
    pub speed_walk: Option<f32>,
}

impl PhysicsOverride {
    pub fn apply(&mut self, patch: &PhysicsOverridePatch) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = patch.$field { self.$field = v; })*
            };
        }
        take!(
            speed,
            jump,
            gravity,
            sneak,
            sneak_glitch,
            speed_climb,
            speed_crouch,
            liquid_fluidity,
            liquid_fluidity_smooth,
            liquid_sink,
            acceleration_default,
            acceleration_air,
            speed_fast,
            acceleration_fast,
            speed_walk
        );
    }
}

pub trait Privileges {
    fn has_privilege(&self, name: &str) -> bool;
}

impl Privileges for HashSet<String> {
    fn has_privilege(&self, name: &str) -> bool {
        self.contains(name)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AllPrivileges;

impl Privileges for AllPrivileges {
    fn has_privilege(&self, _name: &str) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrivileges;

impl Privileges for NoPrivileges {
    fn has_privilege(&self, _name: &str) -> bool {
        false
    }
}

/// Configuration captured once at the start of a tick. Nothing inside a
/// tick reads live settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickConfig {
    pub settings: MovementSettings,
    pub params: MovementParams,
    pub physics: PhysicsOverride,
    pub fly_allowed: bool,
    pub fast_allowed: bool,
    pub noclip_allowed: bool,
}

impl TickConfig {
    pub fn capture(
        settings: &MovementSettings,
        params: &MovementParams,
        physics: &PhysicsOverride,
        privileges: &dyn Privileges,
    ) -> Self {
        Self {
            settings: *settings,
            params: *params,
            physics: *physics,
            fly_allowed: privileges.has_privilege("fly"),
            fast_allowed: privileges.has_privilege("fast"),
            noclip_allowed: privileges.has_privilege("noclip"),
        }
    }

    pub fn free_move(&self) -> bool {
        self.settings.free_move && self.fly_allowed
    }

    pub fn fast_move(&self) -> bool {
        self.settings.fast_move && self.fast_allowed
    }

    pub fn noclip(&self) -> bool {
        self.settings.noclip && self.noclip_allowed
    }

    pub fn overrides(&self) -> &MovementOverrides {
        &self.settings.overrides
    }

    pub fn jump_speed(&self) -> f32 {
        self.params.speed_jump * self.physics.jump
    }

    pub fn gravity(&self) -> f32 {
        self.params.gravity * self.physics.gravity
    }

    pub fn speed_walk(&self) -> f32 {
        self.params.speed_walk * self.physics.speed_walk
    }

    pub fn speed_fast(&self) -> f32 {
        self.params.speed_fast * self.physics.speed_fast
    }

    pub fn speed_climb(&self) -> f32 {
        self.params.speed_climb * self.physics.speed_climb
    }

    pub fn speed_crouch(&self) -> f32 {
        self.params.speed_crouch * self.physics.speed_crouch
    }

    pub fn acceleration_default(&self) -> f32 {
        self.params.acceleration_default * self.physics.acceleration_default
    }

    pub fn acceleration_air(&self) -> f32 {
        self.params.acceleration_air * self.physics.acceleration_air
    }

    pub fn acceleration_fast(&self) -> f32 {
        self.params.acceleration_fast * self.physics.acceleration_fast
    }

    pub fn liquid_fluidity(&self) -> f32 {
        self.params.liquid_fluidity * self.physics.liquid_fluidity
    }

    pub fn liquid_fluidity_smooth(&self) -> f32 {
        self.params.liquid_fluidity_smooth * self.physics.liquid_fluidity_smooth
    }

    pub fn liquid_sink(&self) -> f32 {
        self.params.liquid_sink * self.physics.liquid_sink
    }
}
