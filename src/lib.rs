//! # Tessera: Graph-Based Batch Processing for Point Clouds and Meshes
//!
//! A batch engine that compiles a JSON node graph into one run per input
//! file and executes those runs concurrently, each against its own isolated
//! session of geometry containers and provenance trees.
//!
//! ## Architecture
//!
//! - **Scheduler**: Thread-per-task execution with a FIFO overflow queue,
//!   completion handling marshaled to the owner thread, and per-task
//!   warning capture
//! - **Pipeline**: Compiler (graph validation plus topological lowering
//!   into per-file run configurations) and executor (import → transform →
//!   filter → persist → export state machine)
//! - **Session**: Cluster/model containers paired with provenance trees,
//!   archived as self-describing CBOR `.session` files
//! - **Ops**: Registry of pluggable geometry kernels with declared
//!   input/output classes
//!
//! ## Configuration
//!
//! Persistent settings live in the platform config directory under
//! `tessera`:
//!
//! - **Linux**: `~/.config/tessera/config.toml`
//! - **macOS**: `~/Library/Application Support/tessera/config.toml`
//! - **Windows**: `%APPDATA%\tessera\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera::{
//!     ops::OpRegistry,
//!     pipeline::{execute_run, PipelineCompiler, PipelineConfig},
//!     scheduler::TaskScheduler,
//! };
//!
//! fn main() -> tessera::Result<()> {
//!     let config = PipelineConfig::load("pipeline.json")?;
//!     let registry = Arc::new(OpRegistry::with_builtins());
//!     let runs = PipelineCompiler::compile_from_config(&config, &registry)?;
//!
//!     let mut scheduler = TaskScheduler::new();
//!     for run in runs {
//!         let registry = Arc::clone(&registry);
//!         scheduler.submit(
//!             run.run_id.clone(),
//!             move || Ok(execute_run(&run, &registry)?),
//!             |summary| println!("{}: {} steps", summary.run_id, summary.steps_executed),
//!         );
//!     }
//!     scheduler.run_until_idle();
//!     scheduler.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod formats;
pub mod ops;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, ResultExt, TesseraError};
pub use ops::{GeometryKernel, OpRegistry, OutputClass};
pub use pipeline::{execute_run, PipelineCompiler, PipelineConfig, RunConfig, RunSummary};
pub use scheduler::{TaskEvent, TaskScheduler};
pub use session::Session;
pub use types::{Geometry, ItemId, Representation};
