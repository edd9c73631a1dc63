//! Graph-based batch pipeline: definition, compilation, execution.
//!
//! A pipeline definition is a DAG of operation nodes rooted at a single
//! import. The compiler validates the graph and lowers it into one linear
//! [`RunConfig`] per input file; the executor drives each run against its
//! own [`crate::session::Session`].
//!
//! ```text
//! PipelineConfig ──compile──► [RunConfig; files] ──execute──► artifacts
//! ```
//!
//! # Design
//!
//! - **Compile once, run many** — validation and ordering happen before any
//!   file is touched; runs never re-inspect the graph.
//! - **Per-run isolation** — each run owns its session and batch outright,
//!   so runs execute in parallel without shared state.
//! - **Deterministic lowering** — Kahn's sort with declaration-order
//!   tie-breaking makes compiled runs reproducible byte for byte.

pub mod compiler;
pub mod error;
pub mod executor;
pub mod node;
pub mod plan;

pub use compiler::{run_id_for, PipelineCompiler};
pub use error::{PipelineError, PipelineResult};
pub use executor::execute_run;
pub use node::{Node, PipelineConfig, Settings, SettingsExt};
pub use plan::{ImportParams, Operation, RunConfig, RunMetadata, RunSummary};
