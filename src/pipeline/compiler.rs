//! Pipeline Compiler.
//!
//! Validates a user-authored [`PipelineConfig`] and lowers it into one
//! [`RunConfig`] per input file. Compilation is a pure function of the
//! definition, the file list, and the registry's known operation ids, so
//! compiling the same inputs twice yields byte-identical runs.

use crate::ops::{OpRegistry, IMPORT_OP};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{PipelineConfig, SettingsExt};
use crate::pipeline::plan::{ImportParams, Operation, RunConfig, RunMetadata};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Compiles a pipeline graph into per-file run configurations
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a pipeline definition against a batch of input files.
    ///
    /// Validation is fail-fast: the first violation aborts the compile and
    /// no runs are produced. The operation order is Kahn's BFS topological
    /// sort seeded at the import root, with ties broken by declaration
    /// order, so the result is deterministic.
    pub fn compile(
        config: &PipelineConfig,
        input_files: &[PathBuf],
        registry: &OpRegistry,
    ) -> PipelineResult<Vec<RunConfig>> {
        let start_time = std::time::Instant::now();

        if config.nodes.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }

        let index = Self::build_index(config)?;
        let (adjacency, in_degree) = Self::build_adjacency(config, &index)?;
        let root = Self::find_import_root(config, &in_degree)?;
        let order = Self::topological_sort(config, root, &adjacency, in_degree)?;

        for &node_index in &order {
            let node = &config.nodes[node_index];
            if !registry.is_known(&node.operation_id) {
                return Err(PipelineError::UnknownOperation {
                    node_id: node.id.clone(),
                    operation_id: node.operation_id.clone(),
                });
            }
        }

        if input_files.is_empty() {
            return Err(PipelineError::NoInputFiles);
        }

        let operations: Vec<Operation> = order
            .iter()
            .map(|&i| Operation::from_node(&config.nodes[i]))
            .collect();

        let runs: Vec<RunConfig> = input_files
            .iter()
            .enumerate()
            .map(|(file_index, input_file)| {
                Self::specialize(
                    &operations,
                    input_file,
                    RunMetadata {
                        file_index,
                        total_files: input_files.len(),
                        pipeline_version: config.version.clone(),
                    },
                )
            })
            .collect();

        tracing::debug!(
            nodes = config.nodes.len(),
            runs = runs.len(),
            compile_time_us = start_time.elapsed().as_micros() as u64,
            "compiled pipeline"
        );

        Ok(runs)
    }

    /// Compile using the input batch embedded in the pipeline definition:
    /// the `input_files` setting on the import node.
    pub fn compile_from_config(
        config: &PipelineConfig,
        registry: &OpRegistry,
    ) -> PipelineResult<Vec<RunConfig>> {
        let input_files: Vec<PathBuf> = config
            .nodes
            .iter()
            .find(|node| node.operation_id == IMPORT_OP)
            .and_then(|node| node.settings.get("input_files"))
            .and_then(|value| value.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        Self::compile(config, &input_files, registry)
    }

    /// Map node ids to declaration indices, rejecting duplicates.
    fn build_index(config: &PipelineConfig) -> PipelineResult<HashMap<&str, usize>> {
        let mut index = HashMap::with_capacity(config.nodes.len());
        for (i, node) in config.nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), i).is_some() {
                return Err(PipelineError::DuplicateNodeId {
                    node_id: node.id.clone(),
                });
            }
        }
        Ok(index)
    }

    /// Build forward adjacency and in-degrees from each node's `inputs`.
    ///
    /// Iterating nodes in declaration order keeps every adjacency list in
    /// declaration order, which is what makes the sort's tie-break stable.
    fn build_adjacency(
        config: &PipelineConfig,
        index: &HashMap<&str, usize>,
    ) -> PipelineResult<(Vec<Vec<usize>>, Vec<usize>)> {
        let n = config.nodes.len();
        let mut adjacency = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];

        for (to, node) in config.nodes.iter().enumerate() {
            for input in &node.inputs {
                let &from = index.get(input.as_str()).ok_or_else(|| {
                    PipelineError::UnknownInput {
                        node_id: node.id.clone(),
                        input: input.clone(),
                    }
                })?;
                adjacency[from].push(to);
                in_degree[to] += 1;
            }
        }

        Ok((adjacency, in_degree))
    }

    /// Locate the unique import root among in-degree-zero nodes.
    fn find_import_root(config: &PipelineConfig, in_degree: &[usize]) -> PipelineResult<usize> {
        let roots: Vec<usize> = (0..config.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();

        if roots.is_empty() {
            return Err(PipelineError::NoRoot);
        }

        let mut import_roots = roots
            .iter()
            .filter(|&&i| config.nodes[i].operation_id == IMPORT_OP);
        let root = match import_roots.next() {
            Some(&root) => root,
            None => {
                let first = &config.nodes[roots[0]];
                return Err(PipelineError::RootNotImport {
                    node_id: first.id.clone(),
                    operation_id: first.operation_id.clone(),
                });
            }
        };
        if let Some(&second) = import_roots.next() {
            return Err(PipelineError::MultipleImportRoots {
                first: config.nodes[root].id.clone(),
                second: config.nodes[second].id.clone(),
            });
        }

        Ok(root)
    }

    /// Kahn's algorithm seeded at the import root. An ordering that covers
    /// fewer nodes than the graph holds means a cycle or nodes unreachable
    /// from the root.
    fn topological_sort(
        config: &PipelineConfig,
        root: usize,
        adjacency: &[Vec<usize>],
        mut in_degree: Vec<usize>,
    ) -> PipelineResult<Vec<usize>> {
        let mut queue = VecDeque::from([root]);
        let mut order = Vec::with_capacity(config.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &adjacency[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != config.nodes.len() {
            return Err(PipelineError::CycleOrUnreachable);
        }
        Ok(order)
    }

    /// Produce one run for `input_file`: deep-copy the operation sequence
    /// and specialize the import step with the file path and its
    /// normalization parameters.
    fn specialize(operations: &[Operation], input_file: &Path, metadata: RunMetadata) -> RunConfig {
        let mut operations = operations.to_vec();
        let import = &mut operations[0];

        let base = ImportParams::from_settings(&import.settings);
        let file_key = input_file.to_string_lossy().into_owned();
        let input_params = match import
            .settings
            .get("file_parameters")
            .and_then(|v| v.as_object())
            .and_then(|m| m.get(&file_key))
            .and_then(|v| v.as_object())
        {
            Some(overrides) => base.overlaid(overrides),
            None => base,
        };

        import.settings.remove("file_parameters");
        import
            .settings
            .insert("input_file".to_string(), serde_json::json!(file_key));
        import.settings.insert(
            "sampling_rate".to_string(),
            serde_json::json!(input_params.sampling_rate),
        );

        RunConfig {
            run_id: run_id_for(input_file),
            input_file: input_file.to_path_buf(),
            input_params,
            operations,
            metadata,
        }
    }
}

/// Derive a run identifier from an input file's stem.
pub fn run_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
