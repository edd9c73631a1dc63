//! Run executor — drives one compiled run to completion.
//!
//! A run executes entirely on the calling thread (normally a scheduler
//! worker). Each run:
//! 1. Resolves every operation against the registry, before any step runs.
//! 2. Imports: loads or creates the session and seeds the working batch.
//! 3. Steps the remaining operations over the batch in plan order.
//! 4. Clears the session so no working data outlives the run.
//!
//! A failing step aborts the run; artifacts persisted by earlier steps stay
//! on disk.

use crate::error::{Result, ResultExt};
use crate::formats::{read_geometry_file, write_batch};
use crate::ops::{
    OpRegistry, OutputClass, ResolvedKernel, CLUSTER_SELECT_OP, EXPORT_DATA_OP, IMPORT_OP,
    SAVE_SESSION_OP,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::node::{Settings, SettingsExt};
use crate::pipeline::plan::{ImportParams, Operation, RunConfig, RunSummary};
use crate::session::{load_session, save_session, session_path, ContainerMetadata, Session};
use crate::types::{Geometry, Representation};
use std::path::{Path, PathBuf};

/// Interpreted form of one operation. Transforms carry their kernel so no
/// registry lookup happens after execution starts.
enum Step {
    Import,
    Transform(ResolvedKernel),
    ClusterSelect,
    SaveSession,
    Export,
}

/// Execute one compiled run against a fresh session.
///
/// Returns a summary of the steps that ran and the artifact paths written.
/// The batch going empty ends the run early without error; every remaining
/// operation, persistence included, is skipped.
pub fn execute_run(run: &RunConfig, registry: &OpRegistry) -> Result<RunSummary> {
    let steps = resolve_steps(run, registry)?;

    tracing::info!(
        "Executing run '{}': {} operations, file {} of {}",
        run.run_id,
        run.operations.len(),
        run.metadata.file_index + 1,
        run.metadata.total_files,
    );

    let mut session = Session::new();
    let mut batch: Vec<Geometry> = Vec::new();
    let mut summary = RunSummary {
        run_id: run.run_id.clone(),
        ..RunSummary::default()
    };

    for (index, (operation, step)) in run.operations.iter().zip(steps.iter()).enumerate() {
        if index > 0 && batch.is_empty() {
            tracing::warn!(
                "Run '{}': batch empty before '{}', ending early",
                run.run_id,
                operation.operation_id,
            );
            break;
        }

        match step {
            Step::Import => {
                session = open_session(run)?;
                batch = seed_batch(&mut session, steps.get(index + 1), operation);
            }
            Step::Transform(resolved) => {
                batch = apply_transform(&mut session, batch, operation, resolved)?;
            }
            Step::ClusterSelect => {
                batch = select_by_size(&mut session, batch, operation);
            }
            Step::SaveSession => {
                let path = persist_session(&session, run, operation)?;
                summary.artifacts.push(path);
            }
            Step::Export => {
                let path = export_batch(&session, &batch, run, operation)?;
                summary.artifacts.push(path);
            }
        }
        summary.steps_executed += 1;
    }

    session.clear();
    tracing::info!(
        "Run '{}' finished: {} of {} steps, {} artifact(s)",
        run.run_id,
        summary.steps_executed,
        run.operations.len(),
        summary.artifacts.len(),
    );
    Ok(summary)
}

// ── Resolution ──

fn resolve_steps(run: &RunConfig, registry: &OpRegistry) -> Result<Vec<Step>> {
    let starts_with_import = run
        .operations
        .first()
        .is_some_and(|op| op.operation_id == IMPORT_OP);
    if !starts_with_import {
        return Err(PipelineError::PlanMissingImport {
            run_id: run.run_id.clone(),
        }
        .into());
    }

    run.operations
        .iter()
        .map(|op| match op.operation_id.as_str() {
            IMPORT_OP => Ok(Step::Import),
            CLUSTER_SELECT_OP => Ok(Step::ClusterSelect),
            SAVE_SESSION_OP => Ok(Step::SaveSession),
            EXPORT_DATA_OP => Ok(Step::Export),
            other => registry.resolve(other).map(Step::Transform).ok_or_else(|| {
                PipelineError::UnknownOperation {
                    node_id: op.node_id.clone(),
                    operation_id: other.to_string(),
                }
                .into()
            }),
        })
        .collect()
}

// ── Import ──

/// A session archive given as the input file resumes that session; anything
/// else is read as a geometry source.
fn open_session(run: &RunConfig) -> Result<Session> {
    match load_session(&run.input_file) {
        Ok(session) => {
            tracing::info!("Resumed session archive {}", run.input_file.display());
            Ok(session)
        }
        Err(error) => {
            tracing::debug!(
                "{} is not a session archive ({error}), importing as source data",
                run.input_file.display(),
            );
            import_source(&run.input_file, &run.input_params)
        }
    }
}

/// Read a source file and build a session from it: coordinates rescaled onto
/// the target sampling grid, items seeded into the cluster container.
fn import_source(path: &Path, params: &ImportParams) -> Result<Session> {
    let records = read_geometry_file(path)?;

    let mut session = Session::new();
    let mut shape: Option<[f32; 3]> = None;
    let mut ids = Vec::new();

    for record in records {
        let scale = params.scale / record.sampling;
        let points = record
            .points
            .iter()
            .map(|p| {
                [
                    (p[0] - params.offset[0]) * scale,
                    (p[1] - params.offset[1]) * scale,
                    (p[2] - params.offset[2]) * scale,
                ]
            })
            .collect();

        let mut geometry = Geometry::new(points).with_sampling_rate(params.sampling_rate);
        geometry.normals = record.normals;
        ids.push(session.clusters.add(geometry));

        if let Some(extent) = record.shape {
            let scaled = extent.map(|value| value / record.sampling);
            shape = Some(match shape {
                Some(acc) => [
                    acc[0].max(scaled[0]),
                    acc[1].max(scaled[1]),
                    acc[2].max(scaled[2]),
                ],
                None => scaled,
            });
        }
    }

    session.clusters_tree.seed_roots(ids);
    session.shape = shape;
    session.clusters.metadata = ContainerMetadata {
        shape,
        sampling_rate: params.sampling_rate,
    };

    tracing::info!(
        "Imported {} item(s) from {}",
        session.clusters.len(),
        path.display(),
    );
    Ok(session)
}

/// Move items out of a container into the working batch. The batch starts
/// from the container the next transform reads; control operations and the
/// end of the plan read clusters.
fn seed_batch(session: &mut Session, next_step: Option<&Step>, operation: &Operation) -> Vec<Geometry> {
    let seed_class = match next_step {
        Some(Step::Transform(resolved)) => resolved.spec.input_class,
        _ => OutputClass::Clusters,
    };
    let (container, _) = session.working_set_mut(seed_class);
    let batch = container.drain();

    if !operation.save_output {
        // Imported items only feed the batch; drop the session copies so the
        // persisted session holds operation outputs alone. Shape and
        // container metadata survive for export.
        session.clusters.clear_items();
        session.models.clear_items();
        session.clusters_tree.clear();
        session.models_tree.clear();
    }

    tracing::debug!("Seeded batch with {} item(s) from {seed_class}", batch.len());
    batch
}

// ── Transform ──

fn apply_transform(
    session: &mut Session,
    batch: Vec<Geometry>,
    operation: &Operation,
    resolved: &ResolvedKernel,
) -> Result<Vec<Geometry>> {
    let input_count = batch.len();
    let mut outputs = Vec::with_capacity(input_count);
    for item in batch {
        let produced = resolved
            .kernel
            .apply(item, &operation.settings)
            .with_context(|| format!("Failed to apply '{}'", operation.operation_id))?;
        outputs.extend(produced);
    }

    if operation.save_output {
        if resolved.spec.surface_output {
            for item in &mut outputs {
                item.change_representation(Representation::Surface);
            }
        }
        if !operation.visible_output {
            for item in &mut outputs {
                item.set_visibility(false);
            }
        }
        session.commit_group(
            resolved.spec.output_class,
            outputs.clone(),
            &operation.group_name,
        );
    }

    tracing::debug!(
        "'{}': {} -> {} item(s)",
        operation.operation_id,
        input_count,
        outputs.len(),
    );
    Ok(outputs)
}

// ── Selection ──

/// Keep clusters with a point count strictly inside the configured window.
/// A threshold of zero or below is inactive. Dropped clusters leave the
/// session too, not just the batch.
fn select_by_size(
    session: &mut Session,
    batch: Vec<Geometry>,
    operation: &Operation,
) -> Vec<Geometry> {
    let lower = operation.settings.get_f32_or("lower_threshold", -1.0);
    let upper = operation.settings.get_f32_or("upper_threshold", -1.0);

    let before = batch.len();
    let (kept, dropped): (Vec<Geometry>, Vec<Geometry>) = batch.into_iter().partition(|item| {
        let count = item.point_count() as f32;
        (lower <= 0.0 || count > lower) && (upper <= 0.0 || count < upper)
    });

    for item in &dropped {
        session.remove_item(OutputClass::Clusters, item.id);
    }

    tracing::debug!("Size selection kept {} of {} item(s)", kept.len(), before);
    kept
}

// ── Persist and export ──

fn persist_session(session: &Session, run: &RunConfig, operation: &Operation) -> Result<PathBuf> {
    let output_dir = operation.settings.get_str("output_dir").unwrap_or(".");
    let path = session_path(Path::new(output_dir), &run.run_id);
    save_session(session, &path)?;
    tracing::info!("Persisted session to {}", path.display());
    Ok(path)
}

fn export_batch(
    session: &Session,
    batch: &[Geometry],
    run: &RunConfig,
    operation: &Operation,
) -> Result<PathBuf> {
    let output_dir = operation.settings.get_str("output_dir").unwrap_or(".");
    let settings = export_settings(session, operation);

    let stem = Path::new(output_dir).join(&run.run_id);
    let path = write_batch(batch, &stem, &settings)?;
    tracing::info!("Exported {} item(s) to {}", batch.len(), path.display());
    Ok(path)
}

/// Export settings are the operation settings plus the session's volume
/// extent in grid units (for consumers that rasterize), unless the pipeline
/// already set one. Headers are always written for pipeline exports.
fn export_settings(session: &Session, operation: &Operation) -> Settings {
    let mut settings = operation.settings.clone();

    if let Some(shape) = session.clusters.metadata.shape {
        let sampling = session.clusters.metadata.sampling_rate;
        let grid = shape.map(|extent| (extent / sampling).round() as i64);
        for (key, cells) in ["shape_x", "shape_y", "shape_z"].into_iter().zip(grid) {
            settings.entry(key).or_insert_with(|| cells.into());
        }
    }
    settings.insert(
        "include_header".to_string(),
        serde_json::Value::Bool(true),
    );

    settings
}
