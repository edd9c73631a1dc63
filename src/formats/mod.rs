//! Geometry file input and output
//!
//! Extension-keyed dispatch for reading source files into raw records and
//! writing batches of items back out. The pipeline core only touches these
//! entry points; per-format details stay inside [`reader`] and [`writer`].

pub mod reader;
pub mod writer;

pub use reader::{read_geometry_file, SourceRecord};
pub use writer::write_batch;

use std::path::Path;

/// Lowercased extension of a path, if any.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
