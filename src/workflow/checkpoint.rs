//! Crash-safe checkpoint persistence.
//!
//! One JSON file per checkpoint (written to a temp name, then renamed so
//! a crash can never leave a half-written snapshot under a valid name),
//! plus an append-only JSONL index for fast enumeration. A truncated
//! final index line, the signature of a crash mid-append, is ignored
//! on load. Checkpoints are immutable: they are created, read back by an
//! explicit restore, and deleted only by the retention prune.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::state::WorkingState;
use crate::models::{CheckpointKind, NodeId, NodeStatus};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint not found: {0}")]
    NotFound(Uuid),
}

/// Execution metadata recorded alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub node: Option<NodeId>,
    pub node_status: Option<NodeStatus>,
    /// Milestone label, e.g. "30% complete". Informational only.
    pub label: Option<String>,
    /// Tools/files the node touched, for the operator-facing report.
    pub tools_touched: Vec<String>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

/// An immutable snapshot of the orchestrator's working state at one
/// transition point. Never edited, only superseded by later checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub kind: CheckpointKind,
    pub state: WorkingState,
    pub meta: CheckpointMeta,
}

impl Checkpoint {
    pub fn new(kind: CheckpointKind, state: &WorkingState, meta: CheckpointMeta) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: state.run_id,
            created_at: Utc::now(),
            kind,
            state: state.clone(),
            meta,
        }
    }
}

/// One line of the enumeration index: everything needed to pick a
/// checkpoint without deserializing its full snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub kind: CheckpointKind,
    pub node: Option<NodeId>,
    pub node_status: Option<NodeStatus>,
    pub label: Option<String>,
}

impl IndexEntry {
    fn from_checkpoint(cp: &Checkpoint) -> Self {
        Self {
            id: cp.id,
            run_id: cp.run_id,
            created_at: cp.created_at,
            kind: cp.kind,
            node: cp.meta.node,
            node_status: cp.meta.node_status,
            label: cp.meta.label.clone(),
        }
    }
}

pub struct CheckpointManager {
    root: PathBuf,
}

impl CheckpointManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn checkpoint_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.jsonl")
    }

    /// Durably persist a checkpoint: snapshot file first, index line
    /// second. The save only counts once both writes returned, which is
    /// what lets the orchestrator promise checkpoint-before-advance.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.root)?;

        let final_path = self.checkpoint_path(checkpoint.id);
        let tmp_path = self.root.join(format!("{}.json.part", checkpoint.id));
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(checkpoint)?)?;
        std::fs::rename(&tmp_path, &final_path)?;

        let entry = IndexEntry::from_checkpoint(checkpoint);
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path())?;
        index.write_all(line.as_bytes())?;
        index.sync_all()?;

        tracing::debug!(
            checkpoint_id = %checkpoint.id,
            run_id = %checkpoint.run_id,
            kind = checkpoint.kind.as_str(),
            node = checkpoint.meta.node.map(|n| n.as_str()),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load one checkpoint in full.
    pub fn load(&self, id: Uuid) -> Result<Checkpoint, CheckpointError> {
        let path = self.checkpoint_path(id);
        if !path.is_file() {
            return Err(CheckpointError::NotFound(id));
        }
        let checkpoint = serde_json::from_slice(&std::fs::read(&path)?)?;
        Ok(checkpoint)
    }

    /// Return the exact working-state snapshot stored at a checkpoint.
    /// The caller decides where to re-enter the orchestrator; restore
    /// itself never re-drives execution.
    pub fn restore(&self, id: Uuid) -> Result<WorkingState, CheckpointError> {
        Ok(self.load(id)?.state)
    }

    /// Enumerate a run's checkpoints in write order. Unparseable index
    /// lines (a crash mid-append truncates the final one) are skipped.
    pub fn list(&self, run_id: Uuid) -> Result<Vec<IndexEntry>, CheckpointError> {
        let path = self.index_path();
        if !path.is_file() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexEntry>(line) {
                Ok(entry) if entry.run_id == run_id => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable checkpoint index line");
                }
            }
        }
        Ok(entries)
    }

    /// The newest checkpoint automatic resume may start from: the last
    /// `after_node` snapshot of a completed node. Milestones and
    /// `before_node` snapshots are never resume points.
    pub fn latest_resumable(&self, run_id: Uuid) -> Result<Option<IndexEntry>, CheckpointError> {
        let entries = self.list(run_id)?;
        Ok(entries
            .into_iter()
            .filter(|e| {
                e.kind == CheckpointKind::AfterNode
                    && e.node_status == Some(NodeStatus::Completed)
            })
            .last())
    }

    /// Keep only the `keep` most recent checkpoints (by timestamp) for a
    /// run, deleting the rest including their backing files. This is the
    /// only way checkpoints are ever deleted.
    pub fn prune(&self, run_id: Uuid, keep: usize) -> Result<usize, CheckpointError> {
        let mut entries = self.list(run_id)?;
        entries.sort_by_key(|e| e.created_at);
        if entries.len() <= keep {
            return Ok(0);
        }

        let cutoff = entries.len() - keep;
        let (pruned, kept) = entries.split_at(cutoff);

        for entry in pruned {
            let path = self.checkpoint_path(entry.id);
            if path.is_file() {
                std::fs::remove_file(&path)?;
            }
        }

        // Rewrite the index without the pruned run entries, keeping
        // other runs' lines untouched. Temp-and-rename like snapshots.
        let keep_ids: std::collections::BTreeSet<Uuid> = kept.iter().map(|e| e.id).collect();
        let content = std::fs::read_to_string(self.index_path())?;
        let mut rewritten = String::new();
        for line in content.lines() {
            let Ok(entry) = serde_json::from_str::<IndexEntry>(line) else {
                continue;
            };
            if entry.run_id != run_id || keep_ids.contains(&entry.id) {
                rewritten.push_str(line);
                rewritten.push('\n');
            }
        }
        let tmp = self.root.join("index.jsonl.part");
        std::fs::write(&tmp, rewritten)?;
        std::fs::rename(&tmp, self.index_path())?;

        tracing::info!(run_id = %run_id, pruned = pruned.len(), kept = keep, "Checkpoints pruned");
        Ok(pruned.len())
    }
}
