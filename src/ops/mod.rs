//! Operation registry.
//!
//! The engine never hardcodes geometry algorithms: transforms are
//! [`GeometryKernel`] implementations registered under an operation id,
//! each with a declared [`OpSpec`] saying which session container it reads
//! from, which it writes to, and whether its outputs are surfaces. The
//! compiler validates operation ids against the registry; the executor
//! resolves each id exactly once per run, before any step executes.
//!
//! Control operations (import, selection, persist, export) are interpreted
//! by the executor directly and carry no kernel.

pub mod builtin;

use crate::error::Result;
use crate::pipeline::node::Settings;
use crate::types::Geometry;
use std::collections::HashMap;
use std::sync::Arc;

/// Operation id of the import step (the unique pipeline root).
pub const IMPORT_OP: &str = "import_batch";

/// Operation id of the size-threshold selection step.
pub const CLUSTER_SELECT_OP: &str = "cluster_select";

/// Operation id of the session persist step.
pub const SAVE_SESSION_OP: &str = "save_session";

/// Operation id of the batch export step.
pub const EXPORT_DATA_OP: &str = "export_data";

/// Which session container an operation reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputClass {
    /// Point-cloud working data
    #[default]
    Clusters,
    /// Fitted/meshed model data
    Models,
}

impl std::fmt::Display for OutputClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputClass::Clusters => write!(f, "clusters"),
            OutputClass::Models => write!(f, "models"),
        }
    }
}

/// Declared data-flow contract of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpSpec {
    /// Container the operation consumes items from
    pub input_class: OutputClass,
    /// Container committed outputs land in
    pub output_class: OutputClass,
    /// Whether committed outputs switch to surface representation
    pub surface_output: bool,
}

impl OpSpec {
    /// Contract with explicit input and output classes.
    pub fn new(input_class: OutputClass, output_class: OutputClass) -> Self {
        Self {
            input_class,
            output_class,
            surface_output: false,
        }
    }

    /// Mark outputs as surfaces.
    pub fn with_surface(mut self) -> Self {
        self.surface_output = true;
        self
    }
}

/// Stock contract for the standard operation vocabulary. Unknown ids get the
/// cluster-to-cluster default.
pub fn default_spec(operation_id: &str) -> OpSpec {
    match operation_id {
        "cluster" | "downsample" | "skeletonize" | "sample" => {
            OpSpec::new(OutputClass::Clusters, OutputClass::Clusters)
        }
        "fit" => OpSpec::new(OutputClass::Clusters, OutputClass::Models).with_surface(),
        "remesh" | "smooth" => {
            OpSpec::new(OutputClass::Models, OutputClass::Models).with_surface()
        }
        _ => OpSpec::default(),
    }
}

/// True for operation ids the executor interprets without a kernel.
pub fn is_control_op(operation_id: &str) -> bool {
    matches!(
        operation_id,
        IMPORT_OP | CLUSTER_SELECT_OP | SAVE_SESSION_OP | EXPORT_DATA_OP
    )
}

/// One geometry transform, applied item-by-item to the current batch.
///
/// Implementations must be thread-safe: the executor runs on scheduler
/// worker threads and shares kernels through `Arc`.
pub trait GeometryKernel: Send + Sync {
    /// Transform one item into zero or more output items.
    fn apply(&self, geometry: Geometry, settings: &Settings) -> Result<Vec<Geometry>>;
}

/// A registered kernel plus its declared contract.
#[derive(Clone)]
struct KernelEntry {
    kernel: Arc<dyn GeometryKernel>,
    spec: OpSpec,
}

/// Kernel resolved for one run: the executor holds these for the whole run
/// instead of re-dispatching by operation id per item.
#[derive(Clone)]
pub struct ResolvedKernel {
    /// The transform implementation
    pub kernel: Arc<dyn GeometryKernel>,
    /// Declared data-flow contract
    pub spec: OpSpec,
}

/// Registry mapping operation ids to kernels and their contracts.
#[derive(Clone, Default)]
pub struct OpRegistry {
    kernels: HashMap<String, KernelEntry>,
}

impl OpRegistry {
    /// Create an empty registry (control operations are always known).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the reference kernels from [`builtin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("downsample", Arc::new(builtin::VoxelDownsample));
        registry.register("sample", Arc::new(builtin::StrideSample));
        registry.register("cluster", Arc::new(builtin::GridCluster));
        registry
    }

    /// Register a kernel under `operation_id` with the stock contract for
    /// that id (see [`default_spec`]).
    pub fn register(&mut self, operation_id: impl Into<String>, kernel: Arc<dyn GeometryKernel>) {
        let operation_id = operation_id.into();
        let spec = default_spec(&operation_id);
        self.register_with_spec(operation_id, kernel, spec);
    }

    /// Register a kernel with an explicit contract.
    pub fn register_with_spec(
        &mut self,
        operation_id: impl Into<String>,
        kernel: Arc<dyn GeometryKernel>,
        spec: OpSpec,
    ) {
        self.kernels
            .insert(operation_id.into(), KernelEntry { kernel, spec });
    }

    /// True if `operation_id` can appear in a pipeline: either a control
    /// operation or a registered kernel.
    pub fn is_known(&self, operation_id: &str) -> bool {
        is_control_op(operation_id) || self.kernels.contains_key(operation_id)
    }

    /// Resolve a transform kernel by id.
    pub fn resolve(&self, operation_id: &str) -> Option<ResolvedKernel> {
        self.kernels.get(operation_id).map(|entry| ResolvedKernel {
            kernel: Arc::clone(&entry.kernel),
            spec: entry.spec,
        })
    }

    /// Container an operation consumes from. Control operations and unknown
    /// ids read the cluster container.
    pub fn input_class(&self, operation_id: &str) -> OutputClass {
        self.kernels
            .get(operation_id)
            .map(|entry| entry.spec.input_class)
            .unwrap_or_default()
    }

    /// Registered transform ids, sorted for stable error messages.
    pub fn registered_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopKernel;

    impl GeometryKernel for NoopKernel {
        fn apply(&self, geometry: Geometry, _settings: &Settings) -> Result<Vec<Geometry>> {
            Ok(vec![geometry])
        }
    }

    #[test]
    fn test_default_spec_table() {
        for id in ["cluster", "downsample", "skeletonize", "sample"] {
            let spec = default_spec(id);
            assert_eq!(spec.input_class, OutputClass::Clusters, "{id}");
            assert_eq!(spec.output_class, OutputClass::Clusters, "{id}");
            assert!(!spec.surface_output, "{id}");
        }

        let fit = default_spec("fit");
        assert_eq!(fit.input_class, OutputClass::Clusters);
        assert_eq!(fit.output_class, OutputClass::Models);
        assert!(fit.surface_output);

        for id in ["remesh", "smooth"] {
            let spec = default_spec(id);
            assert_eq!(spec.input_class, OutputClass::Models, "{id}");
            assert_eq!(spec.output_class, OutputClass::Models, "{id}");
            assert!(spec.surface_output, "{id}");
        }
    }

    #[test]
    fn test_control_ops_always_known() {
        let registry = OpRegistry::new();
        assert!(registry.is_known(IMPORT_OP));
        assert!(registry.is_known(CLUSTER_SELECT_OP));
        assert!(registry.is_known(SAVE_SESSION_OP));
        assert!(registry.is_known(EXPORT_DATA_OP));
        assert!(!registry.is_known("cluster"));
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = OpRegistry::new();
        registry.register("smooth", Arc::new(NoopKernel));

        assert!(registry.is_known("smooth"));
        let resolved = registry.resolve("smooth").unwrap();
        assert_eq!(resolved.spec.input_class, OutputClass::Models);
        assert!(resolved.spec.surface_output);
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_input_class_defaults_to_clusters() {
        let registry = OpRegistry::with_builtins();
        assert_eq!(registry.input_class("cluster"), OutputClass::Clusters);
        assert_eq!(registry.input_class(SAVE_SESSION_OP), OutputClass::Clusters);
        assert_eq!(registry.input_class("nonexistent"), OutputClass::Clusters);
    }
}
