//! Pipeline graph data model.
//!
//! A pipeline definition is a JSON document describing a directed graph of
//! operation nodes. [`PipelineConfig`] is the deserialized form handed to the
//! compiler; [`Node`] is one vertex. Node settings stay schemaless
//! ([`Settings`]) because each operation interprets its own keys — the
//! [`SettingsExt`] trait provides the typed accessors operations use.

use crate::error::{Result, ResultExt, TesseraError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schemaless per-operation settings.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// One vertex of the pipeline graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the pipeline definition
    pub id: String,
    /// Which operation this node performs
    pub operation_id: String,
    /// Human-readable label; falls back to `id` when empty
    #[serde(default)]
    pub name: String,
    /// Operation-specific settings
    #[serde(default)]
    pub settings: Settings,
    /// Ids of upstream nodes feeding this one
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Whether the operation's outputs are committed to the session
    #[serde(default = "default_true")]
    pub save_output: bool,
    /// Whether committed outputs stay visible
    #[serde(default = "default_true")]
    pub visible_output: bool,
}

fn default_true() -> bool {
    true
}

impl Node {
    /// Create a node with default settings, mainly for tests and builders.
    pub fn new(id: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation_id: operation_id.into(),
            name: String::new(),
            settings: Settings::new(),
            inputs: Vec::new(),
            save_output: true,
            visible_output: true,
        }
    }

    /// Label for display and group naming: `name` when set, otherwise `id`.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A complete pipeline definition as authored by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Definition format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Nodes in declaration order (the tie-break order for compilation)
    pub nodes: Vec<Node>,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl PipelineConfig {
    /// Parse a pipeline definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load a pipeline definition from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline definition {}", path.display()))?;
        Self::from_json(&text)
            .map_err(|e| e.with_context(format!("Failed to parse {}", path.display())))
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Typed accessors over schemaless [`Settings`].
pub trait SettingsExt {
    /// Float value for `key`, if present and numeric.
    fn get_f32(&self, key: &str) -> Option<f32>;

    /// Float value for `key`, or `default`.
    fn get_f32_or(&self, key: &str, default: f32) -> f32;

    /// Unsigned integer value for `key`, if present.
    fn get_usize(&self, key: &str) -> Option<usize>;

    /// String value for `key`, if present.
    fn get_str(&self, key: &str) -> Option<&str>;

    /// Boolean value for `key`, or `default`.
    fn get_bool_or(&self, key: &str, default: bool) -> bool;

    /// Three-component vector for `key`. A scalar broadcasts to all three
    /// components, matching how offsets are written in hand-edited configs.
    fn get_vec3(&self, key: &str) -> Option<[f32; 3]>;
}

impl SettingsExt for Settings {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key)?.as_f64().map(|v| v as f32)
    }

    fn get_f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_f32(key).unwrap_or(default)
    }

    fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key)?.as_u64().map(|v| v as usize)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn get_vec3(&self, key: &str) -> Option<[f32; 3]> {
        match self.get(key)? {
            serde_json::Value::Array(values) if values.len() == 3 => {
                let mut out = [0.0f32; 3];
                for (slot, value) in out.iter_mut().zip(values) {
                    *slot = value.as_f64()? as f32;
                }
                Some(out)
            }
            value => {
                let scalar = value.as_f64()? as f32;
                Some([scalar; 3])
            }
        }
    }
}

/// Parse a settings value into a concrete type, with an operation-tagged error.
pub fn settings_field<T: serde::de::DeserializeOwned>(
    settings: &Settings,
    operation: &str,
    key: &str,
) -> Result<Option<T>> {
    match settings.get(key) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| {
                TesseraError::from(crate::pipeline::PipelineError::InvalidSettings {
                    operation: operation.to_string(),
                    message: format!("key '{key}': {e}"),
                })
            }),
    }
}
