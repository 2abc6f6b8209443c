//! Provenance-preserving file archive, independent of the database.
//!
//! Layout: `<root>/<identity_key>/<category>/<token>.<ext>` with a
//! `<token>.meta.json` sidecar carrying the human-readable original
//! name. Stored names are random opaque tokens, never derived from
//! personal data, so cross-platform encoding and collision problems
//! cannot arise. Copies are verified before any original is deleted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::DocumentCategory;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error while archiving: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Copy verification failed for {0}: {1}")]
    CopyVerification(PathBuf, String),
}

/// One stored file inside an archive entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedFile {
    pub category: DocumentCategory,
    pub stored_path: PathBuf,
    pub original_name: String,
}

/// The per-identity-key archive directory after one archive call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub identity_key: String,
    pub root: PathBuf,
    pub files: Vec<ArchivedFile>,
}

impl ArchiveEntry {
    /// Stored path for a category, if this call archived one.
    pub fn stored_path(&self, category: DocumentCategory) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| f.category == category)
            .map(|f| f.stored_path.as_path())
    }
}

/// Sidecar metadata written next to every stored file.
#[derive(Debug, Serialize, Deserialize)]
struct SidecarMeta {
    original_name: String,
    category: String,
    archived_at: String,
    size_bytes: u64,
    sha256: String,
}

/// On-demand aggregate statistics for one archive entry. Recomputed on
/// every call; nothing is cached, so the numbers can never go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub file_count: u64,
    pub total_bytes: u64,
}

pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn entry_dir(&self, identity_key: &str) -> PathBuf {
        self.root.join(identity_key)
    }

    /// Archive one file per category under the identity key's directory.
    /// The directory is created idempotently; re-archiving the same key
    /// appends new files rather than overwriting. Originals are copied,
    /// and deleted only when `delete_originals` is set and the copy has
    /// been verified to exist, be non-empty, and hash identically.
    pub fn archive(
        &self,
        identity_key: &str,
        files: &BTreeMap<DocumentCategory, PathBuf>,
        delete_originals: bool,
    ) -> Result<ArchiveEntry, ArchiveError> {
        let entry_root = self.entry_dir(identity_key);
        let mut archived = Vec::new();

        for (category, source) in files {
            if !source.is_file() {
                return Err(ArchiveError::SourceMissing(source.clone()));
            }

            let category_dir = entry_root.join(category.as_str());
            std::fs::create_dir_all(&category_dir)?;

            let stored_path = self.store_one(&category_dir, *category, source)?;

            if delete_originals {
                std::fs::remove_file(source)?;
                tracing::debug!(source = %source.display(), "Original removed after verified copy");
            }

            archived.push(ArchivedFile {
                category: *category,
                stored_path,
                original_name: file_name_of(source),
            });
        }

        tracing::info!(
            identity_key,
            file_count = archived.len(),
            "Archive entry updated"
        );

        Ok(ArchiveEntry {
            identity_key: identity_key.to_string(),
            root: entry_root,
            files: archived,
        })
    }

    /// Copy-then-rename with hash verification, plus the sidecar write.
    fn store_one(
        &self,
        category_dir: &Path,
        category: DocumentCategory,
        source: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let token = random_token();
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");

        let final_path = category_dir.join(format!("{token}.{extension}"));
        let part_path = category_dir.join(format!("{token}.{extension}.part"));

        let source_bytes = std::fs::read(source)?;
        let source_hash = hex_sha256(&source_bytes);

        std::fs::write(&part_path, &source_bytes)?;

        // Verify the copy before it becomes visible under its final name.
        let copied = std::fs::read(&part_path)?;
        if copied.is_empty() {
            return Err(ArchiveError::CopyVerification(
                final_path,
                "copy is empty".into(),
            ));
        }
        let copied_hash = hex_sha256(&copied);
        if copied_hash != source_hash {
            return Err(ArchiveError::CopyVerification(
                final_path,
                "content hash mismatch".into(),
            ));
        }
        std::fs::rename(&part_path, &final_path)?;

        let meta = SidecarMeta {
            original_name: file_name_of(source),
            category: category.as_str().to_string(),
            archived_at: Utc::now().to_rfc3339(),
            size_bytes: copied.len() as u64,
            sha256: copied_hash,
        };
        let meta_path = category_dir.join(format!("{token}.meta.json"));
        std::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)?;

        Ok(final_path)
    }

    /// Recompute file count and total bytes for an identity key's entry.
    /// Sidecar metadata files are not counted as archived documents.
    pub fn stats(&self, identity_key: &str) -> Result<ArchiveStats, ArchiveError> {
        let entry_root = self.entry_dir(identity_key);
        let mut stats = ArchiveStats {
            file_count: 0,
            total_bytes: 0,
        };
        if !entry_root.is_dir() {
            return Ok(stats);
        }

        for category_entry in std::fs::read_dir(&entry_root)? {
            let category_dir = category_entry?.path();
            if !category_dir.is_dir() {
                continue;
            }
            for file_entry in std::fs::read_dir(&category_dir)? {
                let path = file_entry?.path();
                let name = file_name_of(&path);
                if !path.is_file() || name.ends_with(".meta.json") || name.ends_with(".part") {
                    continue;
                }
                stats.file_count += 1;
                stats.total_bytes += std::fs::metadata(&path)?.len();
            }
        }
        Ok(stats)
    }

    /// Read back the original name recorded for a stored file.
    pub fn original_name(&self, stored_path: &Path) -> Result<Option<String>, ArchiveError> {
        let Some(stem) = stored_path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let Some(dir) = stored_path.parent() else {
            return Ok(None);
        };
        // Stored name is <token>.<ext>; the sidecar is <token>.meta.json.
        let token = stem.split('.').next().unwrap_or(stem);
        let meta_path = dir.join(format!("{token}.meta.json"));
        if !meta_path.is_file() {
            return Ok(None);
        }
        let meta: SidecarMeta = serde_json::from_slice(&std::fs::read(&meta_path)?)
            .map_err(|e| ArchiveError::CopyVerification(meta_path, e.to_string()))?;
        Ok(Some(meta.original_name))
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Generate a random opaque token for a stored file name.
fn random_token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
