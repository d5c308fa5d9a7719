//! User-facing synchronization options.
//!
//! Options are read once when a session starts and never change afterwards.

use crate::error::ConfigError;
use crate::host::ChartIdentity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default debounce window for update storms, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Which sessions receive this session's drawings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Every other live session.
    #[default]
    All,
    /// Sessions on the same time frame.
    TimeFrame,
    /// Sessions on the same symbol.
    Symbol,
}

impl Mode {
    /// Check whether `target` is in scope for a session with identity `origin`.
    pub fn matches(&self, origin: &ChartIdentity, target: &ChartIdentity) -> bool {
        match self {
            Mode::All => true,
            Mode::TimeFrame => origin.time_frame == target.time_frame,
            Mode::Symbol => origin.symbol == target.symbol,
        }
    }
}

/// How vertical values are carried across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YAxisType {
    /// Copy prices as-is.
    Absolute,
    /// Keep the relative position inside the visible range when symbols differ.
    #[default]
    Relative,
}

/// Which locally changed objects are eligible for broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    Interactive,
    NonInteractive,
    All,
}

impl ObjectType {
    pub fn accepts(&self, is_interactive: bool) -> bool {
        match self {
            ObjectType::Interactive => is_interactive,
            ObjectType::NonInteractive => !is_interactive,
            ObjectType::All => true,
        }
    }
}

/// Per-session synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub mode: Mode,
    pub y_axis: YAxisType,
    pub object_type: ObjectType,
    /// Minimum spacing between two update broadcasts, in milliseconds.
    /// Zero disables debouncing.
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            y_axis: YAxisType::default(),
            object_type: ObjectType::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl SyncConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_y_axis(mut self, y_axis: YAxisType) -> Self {
        self.y_axis = y_axis;
        self
    }

    pub fn with_object_type(mut self, object_type: ObjectType) -> Self {
        self.object_type = object_type;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }
}
