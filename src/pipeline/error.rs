//! Pipeline-specific error types.

use thiserror::Error;

/// Errors that can occur while compiling or executing a pipeline.
///
/// Compilation is fail-fast: the first violation aborts the compile and no
/// run configurations are produced.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline graph is empty")]
    EmptyPipeline,

    #[error("Pipeline graph has no root node (every node is an input of another)")]
    NoRoot,

    #[error("Root node '{node_id}' is not an import operation (found '{operation_id}')")]
    RootNotImport {
        node_id: String,
        operation_id: String,
    },

    #[error("Pipeline graph has multiple import roots: '{first}' and '{second}'")]
    MultipleImportRoots { first: String, second: String },

    #[error("Node '{node_id}' references unknown input '{input}'")]
    UnknownInput { node_id: String, input: String },

    #[error("Duplicate node id '{node_id}' in pipeline graph")]
    DuplicateNodeId { node_id: String },

    #[error("Pipeline graph contains a cycle or nodes unreachable from the import root")]
    CycleOrUnreachable,

    #[error("No input files given for batch compilation")]
    NoInputFiles,

    #[error("Unknown operation '{operation_id}' on node '{node_id}'")]
    UnknownOperation {
        node_id: String,
        operation_id: String,
    },

    #[error("Run '{run_id}' does not start with an import operation")]
    PlanMissingImport { run_id: String },

    #[error("Invalid settings for operation '{operation}': {message}")]
    InvalidSettings { operation: String, message: String },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
