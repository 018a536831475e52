use std::collections::HashSet;

use bevy::{ecs::resource::Resource, prelude::Vec3};
use crossbeam::channel::{Receiver, Sender};
use mt_sim::config::PhysicsOverridePatch;
use mt_sim::{MovementSettings, PlayerControl, Privileges, ScriptControlInput};

pub mod config;
pub use config::{ClientConfig, ConfigError, load_config, save_config};

#[derive(Resource)]
pub struct AppState(pub ApplicationState);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    Loading,
    Running,
    Finished,
}

/// Outbound position/velocity contract of the local player.
#[derive(Debug, Clone, PartialEq)]
pub enum ToNetMessage {
    PlayerMove {
        position: Vec3,
        velocity: Vec3,
        yaw: f32,
        pitch: f32,
        keys: u32,
        touching_ground: bool,
    },
    Disconnect,
}

#[derive(Resource)]
pub struct ToNet(pub Sender<ToNetMessage>);

#[derive(Resource)]
pub struct FromClient(pub Receiver<ToNetMessage>);

/// Live edits from menus, chat commands and scripts. Drained once per
/// tick before the simulation runs.
#[derive(Debug, Clone)]
pub enum SettingsUpdate {
    Replace(MovementSettings),
    Freecam(bool),
    FreeMove(bool),
    Noclip(bool),
    Autojump(bool),
    LuaControl(bool),
    GrantPrivilege(String),
    RevokePrivilege(String),
    PhysicsOverride(PhysicsOverridePatch),
    ScriptControl(ScriptControlInput),
    /// Velocity pushed by the server, added on the next tick.
    AddVelocity(Vec3),
}

#[derive(Resource)]
pub struct SettingsUpdates(pub Receiver<SettingsUpdate>);

#[derive(Resource)]
pub struct SettingsSender(pub Sender<SettingsUpdate>);

/// Settings as seen by the next tick.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct SettingsSnapshot(pub MovementSettings);

#[derive(Resource, Debug, Default, Clone)]
pub struct PlayerPrivileges(pub HashSet<String>);

impl PlayerPrivileges {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }
}

impl Privileges for PlayerPrivileges {
    fn has_privilege(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct PerfTimings {
    pub frame_delta_ms: f32,
    pub main_thread_ms: f32,
    pub update_ms: f32,
    pub fixed_update_ms: f32,
    pub fixed_tick_ms: f32,
}

const KEY_UP: u32 = 1 << 0;
const KEY_DOWN: u32 = 1 << 1;
const KEY_LEFT: u32 = 1 << 2;
const KEY_RIGHT: u32 = 1 << 3;
const KEY_JUMP: u32 = 1 << 4;
const KEY_AUX1: u32 = 1 << 5;
const KEY_SNEAK: u32 = 1 << 6;
const KEY_DIG: u32 = 1 << 7;
const KEY_PLACE: u32 = 1 << 8;
const KEY_ZOOM: u32 = 1 << 9;

/// Packs the pressed keys the way the server expects them in a move packet.
pub fn control_key_bits(control: &PlayerControl) -> u32 {
    [
        (control.up, KEY_UP),
        (control.down, KEY_DOWN),
        (control.left, KEY_LEFT),
        (control.right, KEY_RIGHT),
        (control.jump, KEY_JUMP),
        (control.aux1, KEY_AUX1),
        (control.sneak, KEY_SNEAK),
        (control.dig, KEY_DIG),
        (control.place, KEY_PLACE),
        (control.zoom, KEY_ZOOM),
    ]
    .into_iter()
    .filter(|(pressed, _)| *pressed)
    .fold(0, |bits, (_, bit)| bits | bit)
}
