//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::path::{Path, PathBuf};

/// Write a whitespace-separated point cloud fixture and return its path.
pub fn write_xyz(dir: &Path, name: &str, points: &[[f32; 3]]) -> PathBuf {
    let path = dir.join(name);
    let mut text = String::new();
    for point in points {
        text.push_str(&format!("{} {} {}\n", point[0], point[1], point[2]));
    }
    std::fs::write(&path, text).expect("failed to write fixture");
    path
}

/// A dense axis-aligned blob of `n` points near `origin`, spaced well below
/// one unit so grid clustering sees a single connected component.
pub fn blob(origin: [f32; 3], n: usize) -> Vec<[f32; 3]> {
    (0..n)
        .map(|i| {
            [
                origin[0] + (i % 4) as f32 * 0.1,
                origin[1] + ((i / 4) % 4) as f32 * 0.1,
                origin[2] + (i / 16) as f32 * 0.1,
            ]
        })
        .collect()
}
