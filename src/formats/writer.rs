//! Batch export writers.
//!
//! [`write_batch`] appends the format's extension to the run-scoped stem it
//! is given and writes every item in the batch to one file. Point-table
//! formats concatenate items; normals are written only when every item
//! carries them.

use crate::error::{Result, ResultExt, TesseraError};
use crate::pipeline::node::{Settings, SettingsExt};
use crate::types::Geometry;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Formats accepted by [`write_batch`], sorted for error messages.
pub const SUPPORTED_FORMATS: &[&str] = &["tsv", "xyz"];

/// Write a batch of items to `stem` plus the format's extension.
///
/// Settings: `format` (default "tsv"), `include_header` (default true).
/// Returns the path actually written.
pub fn write_batch(items: &[Geometry], stem: &Path, settings: &Settings) -> Result<PathBuf> {
    let format = settings.get_str("format").unwrap_or("tsv");
    let include_header = settings.get_bool_or("include_header", true);

    let (extension, column_separator) = match format {
        "tsv" => ("tsv", "\t"),
        "xyz" => ("xyz", " "),
        other => {
            return Err(TesseraError::Format(format!(
                "unsupported export format '{other}' (supported: {})",
                SUPPORTED_FORMATS.join(", ")
            )))
        }
    };

    let path = stem.with_extension(extension);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let with_normals = !items.is_empty() && items.iter().all(|item| item.normals.is_some());
    let file = File::create(&path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write_point_table(&mut writer, items, column_separator, include_header, with_normals)
        .with_context(|| format!("Failed to write export file {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write export file {}", path.display()))?;

    tracing::debug!(path = %path.display(), items = items.len(), "batch exported");
    Ok(path)
}

fn write_point_table(
    writer: &mut impl Write,
    items: &[Geometry],
    separator: &str,
    include_header: bool,
    with_normals: bool,
) -> std::io::Result<()> {
    if include_header {
        let mut header = ["x", "y", "z"].join(separator);
        if with_normals {
            header.push_str(separator);
            header.push_str(&["nx", "ny", "nz"].join(separator));
        }
        writeln!(writer, "{header}")?;
    }

    for item in items {
        for (index, point) in item.points.iter().enumerate() {
            write!(writer, "{}{separator}{}{separator}{}", point[0], point[1], point[2])?;
            if with_normals {
                let normal = item.normals.as_ref().map(|n| n[index]).unwrap_or([0.0; 3]);
                write!(
                    writer,
                    "{separator}{}{separator}{}{separator}{}",
                    normal[0], normal[1], normal[2]
                )?;
            }
            writeln!(writer)?;
        }
    }
    Ok(())
}
