//! Reference kernels.
//!
//! Deliberately lightweight implementations of the most common transforms so
//! the CLI and integration tests can run pipelines end-to-end without an
//! external geometry stack. Production deployments register their own
//! kernels; these stick to deterministic grid arithmetic.

use crate::error::{Result, TesseraError};
use crate::ops::GeometryKernel;
use crate::pipeline::node::{Settings, SettingsExt};
use crate::types::Geometry;
use std::collections::{HashMap, HashSet, VecDeque};

/// New item from a subset of an existing one's vertices.
fn subset(geometry: &Geometry, indices: &[usize]) -> Geometry {
    let points = indices.iter().map(|&i| geometry.points[i]).collect();
    let mut out = Geometry::new(points).with_sampling_rate(geometry.sampling_rate);
    if let Some(normals) = &geometry.normals {
        out.normals = Some(indices.iter().map(|&i| normals[i]).collect());
    }
    out
}

/// Grid cell containing a point at the given cell size.
fn cell_of(point: [f32; 3], cell_size: f32) -> [i64; 3] {
    [
        (point[0] / cell_size).floor() as i64,
        (point[1] / cell_size).floor() as i64,
        (point[2] / cell_size).floor() as i64,
    ]
}

fn positive_setting(settings: &Settings, operation: &str, key: &str, default: f32) -> Result<f32> {
    let value = settings.get_f32_or(key, default);
    if value <= 0.0 {
        return Err(TesseraError::Operation {
            operation: operation.to_string(),
            message: format!("'{key}' must be positive, got {value}"),
        });
    }
    Ok(value)
}

/// Voxel-grid downsampling: keeps the first point seen in each occupied cell.
///
/// Settings: `voxel_size` (default 1.0).
pub struct VoxelDownsample;

impl GeometryKernel for VoxelDownsample {
    fn apply(&self, geometry: Geometry, settings: &Settings) -> Result<Vec<Geometry>> {
        let voxel_size = positive_setting(settings, "downsample", "voxel_size", 1.0)?;

        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for (index, point) in geometry.points.iter().enumerate() {
            if seen.insert(cell_of(*point, voxel_size)) {
                kept.push(index);
            }
        }
        Ok(vec![subset(&geometry, &kept)])
    }
}

/// Uniform stride resampling down to at most `n_points` vertices.
///
/// Settings: `n_points` (default 1000).
pub struct StrideSample;

impl GeometryKernel for StrideSample {
    fn apply(&self, geometry: Geometry, settings: &Settings) -> Result<Vec<Geometry>> {
        let target = settings.get_usize("n_points").unwrap_or(1000);
        if target == 0 {
            return Err(TesseraError::Operation {
                operation: "sample".to_string(),
                message: "'n_points' must be positive".to_string(),
            });
        }

        let total = geometry.point_count();
        if total <= target {
            let kept: Vec<usize> = (0..total).collect();
            return Ok(vec![subset(&geometry, &kept)]);
        }

        let stride = total.div_ceil(target);
        let kept: Vec<usize> = (0..total).step_by(stride).collect();
        Ok(vec![subset(&geometry, &kept)])
    }
}

/// Connected-component clustering on an occupancy grid.
///
/// Points are binned into cells of `cell_size` (default twice the item's
/// sampling rate); cells touching in the 26-neighborhood join one component.
/// Components smaller than `min_points` are dropped as noise. Output order
/// follows the first point index of each component, so results are stable
/// across runs.
pub struct GridCluster;

impl GeometryKernel for GridCluster {
    fn apply(&self, geometry: Geometry, settings: &Settings) -> Result<Vec<Geometry>> {
        let default_cell = (geometry.sampling_rate * 2.0).max(1e-3);
        let cell_size = positive_setting(settings, "cluster", "cell_size", default_cell)?;
        let min_points = settings.get_usize("min_points").unwrap_or(1);

        let mut occupancy: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
        for (index, point) in geometry.points.iter().enumerate() {
            occupancy
                .entry(cell_of(*point, cell_size))
                .or_default()
                .push(index);
        }

        let mut visited: HashSet<[i64; 3]> = HashSet::new();
        let mut components = Vec::new();
        for point in &geometry.points {
            let start = cell_of(*point, cell_size);
            if visited.contains(&start) {
                continue;
            }

            // Flood-fill the component this cell belongs to.
            let mut member_indices = Vec::new();
            let mut frontier = VecDeque::from([start]);
            visited.insert(start);
            while let Some(cell) = frontier.pop_front() {
                member_indices.extend_from_slice(&occupancy[&cell]);
                for dx in -1..=1i64 {
                    for dy in -1..=1i64 {
                        for dz in -1..=1i64 {
                            let neighbor = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                            if occupancy.contains_key(&neighbor) && visited.insert(neighbor) {
                                frontier.push_back(neighbor);
                            }
                        }
                    }
                }
            }

            member_indices.sort_unstable();
            if member_indices.len() >= min_points {
                components.push(subset(&geometry, &member_indices));
            }
        }

        Ok(components)
    }
}
