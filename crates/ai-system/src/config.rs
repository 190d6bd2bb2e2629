//! System configuration and definition file loading.

use std::path::Path;

use ai_goap::{DefinitionData, GoapConfig, DEFAULT_BINDING};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TICK_RATE_SECONDS: f32 = 0.5;

fn default_tick_rate() -> f32 {
    DEFAULT_TICK_RATE_SECONDS
}

fn default_blackboard_init() -> String {
    DEFAULT_BINDING.to_string()
}

/// Settings for an [`crate::AiSystem`], read from YAML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Simulated seconds between AI ticks.
    #[serde(default = "default_tick_rate")]
    pub ai_tick_rate_seconds: f32,

    /// Blackboard init binding used when an entity type has none of its own.
    #[serde(default = "default_blackboard_init")]
    pub default_blackboard_init: String,

    pub goap: GoapConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            ai_tick_rate_seconds: default_tick_rate(),
            default_blackboard_init: default_blackboard_init(),
            goap: GoapConfig::default(),
        }
    }
}

impl AiConfig {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        read_structured(path)
            .with_context(|| format!("Failed to load AI config from {}", path.display()))
    }

    /// Load from `path` if it exists, otherwise use the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no AI config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Load authored definition data (actions and entity types) from JSON or YAML.
pub fn load_definition_data(path: &Path) -> Result<DefinitionData> {
    let data: DefinitionData = read_structured(path)
        .with_context(|| format!("Failed to load definitions from {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        actions = data.actions.len(),
        entity_types = data.entity_types.len(),
        "definitions loaded"
    );
    Ok(data)
}

fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML in {}", path.display()))
    }
}
