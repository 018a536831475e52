use bevy::prelude::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TickConfig;

/// Raw per-tick player intent. Analog axes are taken as given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerControl {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub aux1: bool,
    pub sneak: bool,
    pub zoom: bool,
    pub dig: bool,
    pub place: bool,
    pub pitch: f32,
    pub yaw: f32,
    /// Analog magnitude, `1` for a pressed direction key.
    pub movement_speed: f32,
    /// Direction relative to the look yaw, radians, 0 is forward.
    pub movement_direction: f32,
}

impl PlayerControl {
    pub fn from_keys(up: bool, down: bool, left: bool, right: bool) -> Self {
        let mut control = Self {
            up,
            down,
            left,
            right,
            ..Default::default()
        };
        control.derive_movement_from_keys();
        control
    }

    pub fn with_look(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    pub fn derive_movement_from_keys(&mut self) {
        let x = f32::from(self.right as u8) - f32::from(self.left as u8);
        let z = f32::from(self.up as u8) - f32::from(self.down as u8);
        if x == 0.0 && z == 0.0 {
            self.movement_speed = 0.0;
            self.movement_direction = 0.0;
        } else {
            self.movement_speed = 1.0;
            self.movement_direction = x.atan2(z);
        }
    }

    pub fn is_moving(&self) -> bool {
        self.movement_speed > 0.001
    }

    pub fn movement(&self) -> Vec2 {
        Vec2::new(
            self.movement_direction.sin(),
            self.movement_direction.cos(),
        ) * self.movement_speed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSource {
    Script,
    Neutral,
    Direct,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveControl {
    pub source: ControlSource,
    pub movement_direction: f32,
    pub movement_speed: f32,
    pub jump: bool,
    pub sneak: bool,
    pub aux1: bool,
    pub dig: bool,
    pub place: bool,
    pub yaw: f32,
    pub pitch: f32,
}

impl EffectiveControl {
    fn from_control(source: ControlSource, c: &PlayerControl, yaw: f32, pitch: f32) -> Self {
        Self {
            source,
            movement_direction: c.movement_direction,
            movement_speed: c.movement_speed,
            jump: c.jump,
            sneak: c.sneak,
            aux1: c.aux1,
            dig: c.dig,
            place: c.place,
            yaw,
            pitch,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.movement_speed > 0.001
    }
}

/// Script override when `lua_control` is on, neutral while freecam owns
/// the real input, direct input otherwise. Look angles always come from
/// the direct record.
pub fn resolve_control(
    direct: &PlayerControl,
    script: &PlayerControl,
    freecam: bool,
    lua_control: bool,
) -> EffectiveControl {
    let (source, chosen) = if lua_control {
        (ControlSource::Script, *script)
    } else if freecam {
        (ControlSource::Neutral, PlayerControl::default())
    } else {
        (ControlSource::Direct, *direct)
    };
    EffectiveControl::from_control(source, &chosen, direct.yaw, direct.pitch)
}

/// Forces jump and sprint on the direct record while the bunny-hop
/// override is active.
pub fn apply_bhop(direct: &mut PlayerControl, cfg: &TickConfig) {
    let bhop = &cfg.overrides().bhop;
    if !bhop.enabled || !direct.is_moving() || cfg.settings.freecam || cfg.settings.free_move {
        return;
    }
    if bhop.jump {
        direct.jump = true;
    }
    if bhop.sprint {
        direct.aux1 = true;
    }
}

/// Control table handed over by automation scripts. Every field defaults
/// to false. Scripts cannot zoom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptControlInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub aux1: bool,
    pub sneak: bool,
    pub dig: bool,
    pub place: bool,
}

impl ScriptControlInput {
    /// Reads a loosely typed table. Missing and non-boolean fields are false,
    /// a non-object value yields the all-false record.
    pub fn from_json(value: &Value) -> Self {
        let flag = |name: &str| value.get(name).and_then(Value::as_bool).unwrap_or(false);
        Self {
            up: flag("up"),
            down: flag("down"),
            left: flag("left"),
            right: flag("right"),
            jump: flag("jump"),
            aux1: flag("aux1"),
            sneak: flag("sneak"),
            dig: flag("dig"),
            place: flag("place"),
        }
    }

    pub fn into_control(self) -> PlayerControl {
        let mut control = PlayerControl::from_keys(self.up, self.down, self.left, self.right);
        control.jump = self.jump;
        control.aux1 = self.aux1;
        control.sneak = self.sneak;
        control.dig = self.dig;
        control.place = self.place;
        control
    }
}
