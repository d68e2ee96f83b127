use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Parameters every new source starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDefaults {
    pub pitch: f32,
    pub gain: f32,
    pub reference_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
    pub priority: i32,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            gain: 1.0,
            reference_distance: 10.0,
            max_distance: 1000.0,
            rolloff: 1.0,
            priority: 1024,
        }
    }
}

/// Pool-wide settings, usually loaded from a RON file.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub defaults: SourceDefaults,
    /// Upper bound on voices the pool will ever hold, spares included.
    /// `None` keeps acquiring until the backend refuses.
    pub voice_limit: Option<usize>,
    pub start_muted: bool,
}

impl PoolConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, AudioError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pool config {}", path.display()))?;
        Self::from_ron_str(&text)
            .with_context(|| format!("failed to parse pool config {}", path.display()))
    }
}
