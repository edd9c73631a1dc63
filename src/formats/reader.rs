//! Source file readers.
//!
//! Readers produce [`SourceRecord`]s: raw coordinates plus the file's own
//! sampling and extent, before import normalization. Text formats share one
//! column parser; the separator is chosen by extension.

use crate::error::{Result, ResultExt, TesseraError};
use crate::formats::extension_of;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Extensions accepted by [`read_geometry_file`], sorted for error messages.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "xyz"];

/// Raw contents of one source file entry, before normalization.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Vertex positions as stored in the file
    pub points: Vec<[f32; 3]>,
    /// Per-vertex normals when the file carries them
    pub normals: Option<Vec<[f32; 3]>>,
    /// Sampling rate of the file's coordinate grid
    pub sampling: f32,
    /// Extent of the file's coordinate volume
    pub shape: Option<[f32; 3]>,
}

/// Read a source file into records, dispatching on extension.
pub fn read_geometry_file(path: &Path) -> Result<Vec<SourceRecord>> {
    let extension = extension_of(path).unwrap_or_default();
    let separator = match extension.as_str() {
        "csv" => Separator::Comma,
        "txt" | "tsv" | "xyz" => Separator::Whitespace,
        other => {
            return Err(TesseraError::Format(format!(
                "unsupported input format '{other}' for {} (supported: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )))
        }
    };

    let record = read_point_table(path, separator)?;
    tracing::debug!(
        path = %path.display(),
        points = record.points.len(),
        "read source file"
    );
    Ok(vec![record])
}

#[derive(Clone, Copy)]
enum Separator {
    Whitespace,
    Comma,
}

/// Parse a text point table: 3 columns per row (x y z) or 6 (plus a
/// normal). Empty lines and `#` comments are skipped.
fn read_point_table(path: &Path, separator: Separator) -> Result<SourceRecord> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut points = Vec::new();
    let mut normals = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let columns: Vec<f32> = match separator {
            Separator::Whitespace => trimmed
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>(),
            Separator::Comma => trimmed
                .split(',')
                .map(|field| field.trim().parse())
                .collect::<std::result::Result<_, _>>(),
        }
        .map_err(|e| {
            TesseraError::Format(format!(
                "{} line {}: {e}",
                path.display(),
                line_number + 1
            ))
        })?;

        match columns.len() {
            3 => points.push([columns[0], columns[1], columns[2]]),
            n if n >= 6 => {
                points.push([columns[0], columns[1], columns[2]]);
                normals.push([columns[3], columns[4], columns[5]]);
            }
            n => {
                return Err(TesseraError::Format(format!(
                    "{} line {}: expected 3 or 6 columns, found {n}",
                    path.display(),
                    line_number + 1
                )))
            }
        }
    }

    let shape = max_extent(&points);
    let normals = if normals.len() == points.len() && !normals.is_empty() {
        Some(normals)
    } else {
        None
    };

    Ok(SourceRecord {
        points,
        normals,
        sampling: 1.0,
        shape,
    })
}

fn max_extent(points: &[[f32; 3]]) -> Option<[f32; 3]> {
    let mut iter = points.iter();
    let first = *iter.next()?;
    Some(iter.fold(first, |acc, p| {
        [acc[0].max(p[0]), acc[1].max(p[1]), acc[2].max(p[2])]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_xyz_with_comments() {
        let (_dir, path) = write_temp(
            "points.xyz",
            "# header comment\n1.0 2.0 3.0\n\n4.0 5.0 6.0\n",
        );
        let records = read_geometry_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert!(record.normals.is_none());
        assert_eq!(record.shape, Some([4.0, 5.0, 6.0]));
        assert_eq!(record.sampling, 1.0);
    }

    #[test]
    fn test_read_xyz_with_normals() {
        let (_dir, path) = write_temp("n.xyz", "0 0 0 0 0 1\n1 1 1 0 1 0\n");
        let records = read_geometry_file(&path).unwrap();
        let record = &records[0];
        assert_eq!(record.points.len(), 2);
        assert_eq!(
            record.normals,
            Some(vec![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0]])
        );
    }

    #[test]
    fn test_read_csv() {
        let (_dir, path) = write_temp("points.csv", "1.5, 2.5, 3.5\n4.0,5.0,6.0\n");
        let records = read_geometry_file(&path).unwrap();
        assert_eq!(records[0].points[0], [1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let (_dir, path) = write_temp("bad.xyz", "1 2 3\n1 2\n");
        let err = read_geometry_file(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unknown_extension_lists_supported() {
        let (_dir, path) = write_temp("volume.mrc", "");
        let err = read_geometry_file(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("mrc"));
        assert!(message.contains("xyz"));
    }
}
