//! Compiled run model.
//!
//! The compiler lowers one [`PipelineConfig`](crate::pipeline::PipelineConfig)
//! plus a list of input files into per-file [`RunConfig`]s: a topologically
//! ordered operation sequence with the import step specialized for that file.
//! RunConfigs are plain serializable data so runs can be inspected, diffed,
//! and replayed.

use crate::pipeline::node::{Node, Settings, SettingsExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Normalization parameters applied when reading a source file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportParams {
    /// Coordinate offset subtracted before scaling
    pub offset: [f32; 3],
    /// Scale factor applied after the offset
    pub scale: f32,
    /// Target sampling rate of the imported items
    pub sampling_rate: f32,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self {
            offset: [0.0; 3],
            scale: 1.0,
            sampling_rate: 1.0,
        }
    }
}

impl ImportParams {
    /// Read normalization parameters from import-node settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            offset: settings.get_vec3("offset").unwrap_or([0.0; 3]),
            scale: settings.get_f32_or("scale", 1.0),
            sampling_rate: settings.get_f32_or("sampling_rate", 1.0),
        }
    }

    /// Overlay per-file overrides on top of these parameters. Only keys
    /// present in `overrides` replace the base values.
    pub fn overlaid(&self, overrides: &Settings) -> Self {
        Self {
            offset: overrides.get_vec3("offset").unwrap_or(self.offset),
            scale: overrides.get_f32_or("scale", self.scale),
            sampling_rate: overrides.get_f32_or("sampling_rate", self.sampling_rate),
        }
    }
}

/// One executable step of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Id of the graph node this step was lowered from
    pub node_id: String,
    /// Which operation to perform
    pub operation_id: String,
    /// Display label
    pub name: String,
    /// Settings, deep-copied from the node and specialized per run
    pub settings: Settings,
    /// Upstream node ids, kept for inspection and replay tooling
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Provenance group recorded when outputs are committed
    pub group_name: String,
    /// Whether outputs are committed to the session
    pub save_output: bool,
    /// Whether committed outputs stay visible
    pub visible_output: bool,
}

impl Operation {
    /// Lower a graph node into an operation step.
    pub fn from_node(node: &Node) -> Self {
        let group_name = node
            .settings
            .get_str("group_name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_out", node.display_name()));
        Self {
            node_id: node.id.clone(),
            operation_id: node.operation_id.clone(),
            name: node.display_name().to_string(),
            settings: node.settings.clone(),
            inputs: node.inputs.clone(),
            group_name,
            save_output: node.save_output,
            visible_output: node.visible_output,
        }
    }
}

/// Batch bookkeeping attached to every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Zero-based position of this run's input file in the batch
    pub file_index: usize,
    /// Total number of input files in the batch
    pub total_files: usize,
    /// Pipeline definition version the run was compiled from
    pub pipeline_version: String,
}

/// Everything needed to execute the pipeline against one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Identifier derived from the input file stem; names output artifacts
    pub run_id: String,
    /// Source file for the import step
    pub input_file: PathBuf,
    /// Normalization parameters for the import step
    pub input_params: ImportParams,
    /// Operation sequence in topological order, import first
    pub operations: Vec<Operation>,
    /// Batch bookkeeping
    pub metadata: RunMetadata,
}

/// Result of a successful run, delivered to completion callbacks.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// The run this summary belongs to
    pub run_id: String,
    /// How many operation steps executed
    pub steps_executed: usize,
    /// Files written by persist and export steps
    pub artifacts: Vec<PathBuf>,
}
