//! Session persistence.
//!
//! Sessions are serialized to self-describing binary archives (CBOR), so
//! field names travel with the data and archives stay readable as the
//! data model grows. Archives written by the predecessor application used
//! different field names; serde aliases on [`SessionArchive`] accept both,
//! so legacy sessions load into current types without a migration tool.

use crate::error::{Result, ResultExt, TesseraError};
use crate::session::container::Container;
use crate::session::tree::ProvenanceTree;
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// File extension for session archives.
pub const SESSION_EXTENSION: &str = "session";

/// Current archive format version.
const ARCHIVE_VERSION: u32 = 2;

/// On-disk form of a [`Session`].
#[derive(Serialize, Deserialize)]
struct SessionArchive {
    #[serde(default = "legacy_version")]
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    shape: Option<[f32; 3]>,
    #[serde(alias = "_data")]
    clusters: Container,
    #[serde(alias = "_models")]
    models: Container,
    #[serde(default, alias = "_data_tree")]
    clusters_tree: ProvenanceTree,
    #[serde(default, alias = "_models_tree")]
    models_tree: ProvenanceTree,
}

/// Archives predating the version field are treated as version 1.
fn legacy_version() -> u32 {
    1
}

impl From<Session> for SessionArchive {
    fn from(session: Session) -> Self {
        Self {
            version: ARCHIVE_VERSION,
            saved_at: Some(Utc::now()),
            shape: session.shape,
            clusters: session.clusters,
            models: session.models,
            clusters_tree: session.clusters_tree,
            models_tree: session.models_tree,
        }
    }
}

impl SessionArchive {
    fn into_session(self) -> Session {
        let session = Session {
            shape: self.shape,
            clusters: self.clusters,
            models: self.models,
            clusters_tree: self.clusters_tree,
            models_tree: self.models_tree,
        };
        // Keep freshly minted ids ahead of everything in the archive.
        for item in session.clusters.iter().chain(session.models.iter()) {
            item.id.observe();
        }
        session.clusters_tree.observe_ids();
        session.models_tree.observe_ids();
        session
    }
}

/// Archive path for a run inside an output directory.
pub fn session_path(output_dir: &Path, run_id: &str) -> PathBuf {
    output_dir.join(format!("{run_id}.{SESSION_EXTENSION}"))
}

/// Serialize a session to `path`, creating parent directories as needed.
pub fn save_session(session: &Session, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let archive = SessionArchive::from(session.clone());
    let file = File::create(path)
        .with_context(|| format!("Failed to create session archive {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    ciborium::ser::into_writer(&archive, &mut writer)
        .map_err(TesseraError::from)
        .with_context(|| format!("Failed to write session archive {}", path.display()))?;

    tracing::debug!(path = %path.display(), "session archive written");
    Ok(())
}

/// Load a session archive, accepting both current and legacy field names.
pub fn load_session(path: &Path) -> Result<Session> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open session archive {}", path.display()))?;
    let reader = BufReader::new(file);
    let archive: SessionArchive = ciborium::de::from_reader(reader)
        .map_err(TesseraError::from)
        .with_context(|| format!("Failed to read session archive {}", path.display()))?;

    if archive.version > ARCHIVE_VERSION {
        return Err(TesseraError::Session(format!(
            "archive {} has version {} but this build supports up to {}",
            path.display(),
            archive.version,
            ARCHIVE_VERSION
        )));
    }

    tracing::debug!(path = %path.display(), version = archive.version, "session archive loaded");
    Ok(archive.into_session())
}
