//! Test data builders for pipeline definitions and stub kernels

use serde_json::Value;
use std::sync::Arc;
use tessera::ops::{OpRegistry, IMPORT_OP};
use tessera::pipeline::{Node, PipelineConfig, Settings};
use tessera::types::Geometry;
use tessera::{GeometryKernel, Result, TesseraError};

/// Builder for creating graph nodes
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(id: &str, operation_id: &str) -> Self {
        Self {
            node: Node::new(id, operation_id),
        }
    }

    pub fn input(mut self, id: &str) -> Self {
        self.node.inputs.push(id.to_string());
        self
    }

    pub fn setting(mut self, key: &str, value: Value) -> Self {
        self.node.settings.insert(key.to_string(), value);
        self
    }

    pub fn save_output(mut self, save: bool) -> Self {
        self.node.save_output = save;
        self
    }

    pub fn visible_output(mut self, visible: bool) -> Self {
        self.node.visible_output = visible;
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

/// A pipeline definition from nodes in declaration order
pub fn pipeline(nodes: Vec<Node>) -> PipelineConfig {
    PipelineConfig {
        version: "2.0".to_string(),
        nodes,
    }
}

/// A linear `import -> ops...` chain, each node feeding the next
pub fn chain(ops: &[&str]) -> PipelineConfig {
    let mut nodes = vec![Node::new("load", IMPORT_OP)];
    let mut previous = "load".to_string();
    for (index, op) in ops.iter().enumerate() {
        let id = format!("n{index}");
        nodes.push(NodeBuilder::new(&id, op).input(&previous).build());
        previous = id;
    }
    pipeline(nodes)
}

/// Splits an item into one single-point item per vertex.
pub struct SplitPoints;

impl GeometryKernel for SplitPoints {
    fn apply(&self, item: Geometry, _settings: &Settings) -> Result<Vec<Geometry>> {
        Ok(item
            .points
            .iter()
            .map(|&point| Geometry::new(vec![point]))
            .collect())
    }
}

/// Consumes every item without producing output.
pub struct Vanish;

impl GeometryKernel for Vanish {
    fn apply(&self, _item: Geometry, _settings: &Settings) -> Result<Vec<Geometry>> {
        Ok(Vec::new())
    }
}

/// Always fails with an operation error.
pub struct AlwaysFail;

impl GeometryKernel for AlwaysFail {
    fn apply(&self, _item: Geometry, _settings: &Settings) -> Result<Vec<Geometry>> {
        Err(TesseraError::Operation {
            operation: "always_fail".to_string(),
            message: "synthetic kernel failure".to_string(),
        })
    }
}

/// Builtins plus the stub kernels above under test-only ids.
pub fn test_registry() -> OpRegistry {
    let mut registry = OpRegistry::with_builtins();
    registry.register("split_points", Arc::new(SplitPoints));
    registry.register("vanish", Arc::new(Vanish));
    registry.register("always_fail", Arc::new(AlwaysFail));
    registry
}
