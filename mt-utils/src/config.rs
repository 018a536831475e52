use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bevy::ecs::resource::Resource;
use bevy::prelude::Vec3;
use mt_sim::world::NodeDef;
use mt_sim::{Aabb, MovementParams, MovementSettings, NodeRegistry, PhysicsOverride};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Fixed simulation step in seconds.
    pub tick_interval: f32,
    /// Minimum spacing of outbound move messages in seconds.
    pub send_interval: f32,
    pub history_len: usize,
    pub spawn: [f32; 3],
    pub player_box: [f32; 6],
    pub step_height: f32,
    pub eye_height: f32,
    pub privileges: Vec<String>,
    pub settings: MovementSettings,
    pub params: MovementParams,
    pub physics: PhysicsOverride,
    pub nodes: Vec<NodeDef>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_interval: 0.05,
            send_interval: 0.1,
            history_len: 256,
            spawn: [0.5, 1.0, 0.5],
            player_box: [-0.3, 0.0, -0.3, 0.3, 1.77, 0.3],
            step_height: 0.6,
            eye_height: 1.625,
            privileges: vec!["interact".to_string(), "shout".to_string()],
            settings: MovementSettings::default(),
            params: MovementParams::default(),
            physics: PhysicsOverride::default(),
            nodes: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_interval > 0.0 && self.tick_interval <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tick_interval must be in (0, 1], got {}",
                self.tick_interval
            )));
        }
        if self.send_interval < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "send_interval must not be negative, got {}",
                self.send_interval
            )));
        }
        let bb = self.player_box();
        if bb.min.cmpge(bb.max).any() {
            return Err(ConfigError::Invalid(format!(
                "player_box min must be below max, got {:?}",
                self.player_box
            )));
        }
        if self.history_len == 0 {
            return Err(ConfigError::Invalid("history_len must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for def in &self.nodes {
            if def.name.is_empty() {
                return Err(ConfigError::Invalid("node without a name".into()));
            }
            if !seen.insert(def.name.as_str()) {
                warn!(name = %def.name, "node registered twice, later entry wins");
            }
        }
        Ok(())
    }

    pub fn player_box(&self) -> Aabb {
        Aabb::from_array(self.player_box)
    }

    pub fn spawn(&self) -> Vec3 {
        Vec3::from_array(self.spawn)
    }

    pub fn registry(&self) -> NodeRegistry {
        NodeRegistry::from_defs(self.nodes.iter().cloned())
    }

    pub fn privilege_set(&self) -> HashSet<String> {
        self.privileges.iter().cloned().collect()
    }
}

pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ClientConfig::from_toml_str(&text)?;
    debug!(path = %path.display(), nodes = config.nodes.len(), "loaded client config");
    Ok(config)
}

pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
