//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "composition": "rotation_aware",
//!   "world_shown": false,
//!   "recreate_anchor_on_move": true,
//!   "anchor_move_tolerance": 0.01,
//!   "anchor_turn_tolerance": 0.01,
//!   "log_filter": "info"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How anchor-chain resolution combines an anchor's transform with the
/// entity's own start transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// `position = anchor.position + anchor.rotation * start_position`,
    /// `rotation = anchor.rotation * start_rotation`,
    /// `scale = anchor.scale * start_scale`.
    #[default]
    RotationAware,
    /// `position = anchor.position + start_position`. Rotation and scale
    /// compose as in [`RotationAware`](Self::RotationAware). Kept for scenes
    /// authored against the older behavior.
    LegacySum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub composition: CompositionMode,
    /// Initial value of the session's "world shown" flag.
    pub world_shown: bool,
    /// Recreate a platform anchor when its entity's start pose drifts past
    /// the tolerances below.
    pub recreate_anchor_on_move: bool,
    /// Meters.
    pub anchor_move_tolerance: f32,
    /// Radians.
    pub anchor_turn_tolerance: f32,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            composition: CompositionMode::RotationAware,
            world_shown: false,
            recreate_anchor_on_move: true,
            anchor_move_tolerance: 0.01,
            anchor_turn_tolerance: 0.01,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("anchor_move_tolerance", self.anchor_move_tolerance),
            ("anchor_turn_tolerance", self.anchor_turn_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
