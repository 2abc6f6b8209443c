//! The pipeline driver: walks the node sequence, checkpointing before
//! and after every node.
//!
//! A checkpoint is durably saved before a node runs and again after it
//! finishes, so the working state on disk is never behind execution. A
//! failed node leaves a failed `after_node` checkpoint and halts the
//! run; resume re-enters at the node after the last completed one and
//! never re-executes completed work.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use rusqlite::Connection;
use uuid::Uuid;

use super::checkpoint::{Checkpoint, CheckpointManager, CheckpointMeta};
use super::generate::{DocumentGenerator, NullGenerator};
use super::state::{PipelineInput, WorkingState};
use super::WorkflowError;
use crate::archive::ArchiveStore;
use crate::config::PipelineConfig;
use crate::extract;
use crate::fusion::{self, PriorityTable};
use crate::models::{
    fields, CheckpointKind, DocumentCategory, NodeId, NodeStatus, OperatorRecord, PartialRecord,
};
use crate::recognition::{RawRecognition, RecognitionAdapter, RecognitionError};
use crate::store::operator;

/// What a finished run hands back to the caller, for the operator-facing
/// report. Everything here is also in the final checkpoint's state.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub record_id: Option<Uuid>,
    pub output_fields: BTreeMap<String, String>,
    pub generated_document: Option<PathBuf>,
    /// Categories whose recognition stayed below the confidence
    /// threshold even after the retry.
    pub low_confidence: Vec<DocumentCategory>,
    /// Shape-check warnings the fusion engine attached to the record.
    pub warnings: Vec<String>,
}

/// Where an interrupted run can pick up again.
#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub checkpoint_id: Uuid,
    pub state: WorkingState,
    /// Node to re-enter at. None means every node already completed.
    pub next_node: Option<NodeId>,
}

pub struct Orchestrator {
    adapter: RecognitionAdapter,
    archive: ArchiveStore,
    conn: Connection,
    checkpoints: CheckpointManager,
    generator: Box<dyn DocumentGenerator>,
    priorities: PriorityTable,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        adapter: RecognitionAdapter,
        archive: ArchiveStore,
        conn: Connection,
        checkpoints: CheckpointManager,
        config: PipelineConfig,
    ) -> Self {
        Self {
            adapter,
            archive,
            conn,
            checkpoints,
            generator: Box::new(NullGenerator),
            priorities: PriorityTable,
            config,
        }
    }

    pub fn with_generator(mut self, generator: Box<dyn DocumentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Run the full pipeline over fresh input.
    pub fn run(&self, input: PipelineInput) -> Result<RunOutcome, WorkflowError> {
        self.run_from(WorkingState::new(input), NodeId::Classify)
    }

    /// Run the pipeline from `start` onward over an existing working
    /// state, checkpointing around every node. This is both the fresh
    /// entry point and the resume re-entry.
    pub fn run_from(
        &self,
        mut state: WorkingState,
        start: NodeId,
    ) -> Result<RunOutcome, WorkflowError> {
        let start_idx = NodeId::SEQUENCE
            .iter()
            .position(|n| *n == start)
            .unwrap_or(0);
        tracing::info!(
            run_id = %state.run_id,
            start = start.as_str(),
            documents = state.input.documents.len(),
            "Pipeline run starting"
        );

        for node in &NodeId::SEQUENCE[start_idx..] {
            let node = *node;
            self.checkpoints.save(&Checkpoint::new(
                CheckpointKind::BeforeNode,
                &state,
                CheckpointMeta {
                    node: Some(node),
                    node_status: Some(NodeStatus::Running),
                    ..Default::default()
                },
            ))?;

            let started = Instant::now();
            match self.execute_node(node, &mut state) {
                Ok(tools_touched) => {
                    self.checkpoints.save(&Checkpoint::new(
                        CheckpointKind::AfterNode,
                        &state,
                        CheckpointMeta {
                            node: Some(node),
                            node_status: Some(NodeStatus::Completed),
                            tools_touched,
                            duration_ms: Some(started.elapsed().as_millis() as u64),
                            ..Default::default()
                        },
                    ))?;
                    tracing::info!(run_id = %state.run_id, node = node.as_str(), "Node completed");
                }
                Err(e) => {
                    tracing::error!(
                        run_id = %state.run_id,
                        node = node.as_str(),
                        error = %e,
                        "Node failed, halting run"
                    );
                    self.checkpoints.save(&Checkpoint::new(
                        CheckpointKind::AfterNode,
                        &state,
                        CheckpointMeta {
                            node: Some(node),
                            node_status: Some(NodeStatus::Failed),
                            duration_ms: Some(started.elapsed().as_millis() as u64),
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    ))?;
                    return Err(e);
                }
            }
        }

        self.checkpoints
            .prune(state.run_id, self.config.checkpoint_retention)?;
        tracing::info!(run_id = %state.run_id, "Pipeline run completed");
        Ok(Self::outcome(state))
    }

    /// Record a labeled milestone checkpoint, outside the node cadence.
    pub fn milestone(&self, state: &WorkingState, label: &str) -> Result<Uuid, WorkflowError> {
        let cp = Checkpoint::new(
            CheckpointKind::Milestone,
            state,
            CheckpointMeta {
                label: Some(label.to_string()),
                ..Default::default()
            },
        );
        self.checkpoints.save(&cp)?;
        Ok(cp.id)
    }

    /// Find where an interrupted run can resume: the state of the latest
    /// completed `after_node` checkpoint, re-entering at the following
    /// node. None when the run never completed a node.
    pub fn resume_point(&self, run_id: Uuid) -> Result<Option<ResumePoint>, WorkflowError> {
        let Some(entry) = self.checkpoints.latest_resumable(run_id)? else {
            return Ok(None);
        };
        let state = self.checkpoints.restore(entry.id)?;
        let next_node = entry.node.and_then(|n| n.next());
        Ok(Some(ResumePoint {
            checkpoint_id: entry.id,
            state,
            next_node,
        }))
    }

    /// Resume an interrupted run to completion. Returns None when the
    /// run has no resumable checkpoint.
    pub fn resume(&self, run_id: Uuid) -> Result<Option<RunOutcome>, WorkflowError> {
        let Some(point) = self.resume_point(run_id)? else {
            return Ok(None);
        };
        match point.next_node {
            Some(node) => {
                tracing::info!(
                    run_id = %run_id,
                    checkpoint_id = %point.checkpoint_id,
                    node = node.as_str(),
                    "Resuming run"
                );
                self.run_from(point.state, node).map(Some)
            }
            None => Ok(Some(Self::outcome(point.state))),
        }
    }

    fn outcome(state: WorkingState) -> RunOutcome {
        let warnings = state
            .fused
            .as_ref()
            .map(OperatorRecord::warnings)
            .unwrap_or_default();
        RunOutcome {
            run_id: state.run_id,
            record_id: state.record_id,
            output_fields: state.output_fields.unwrap_or_default(),
            generated_document: state.generated_document,
            low_confidence: state.low_confidence,
            warnings,
        }
    }

    fn execute_node(
        &self,
        node: NodeId,
        state: &mut WorkingState,
    ) -> Result<Vec<String>, WorkflowError> {
        match node {
            NodeId::Classify => self.classify(state),
            NodeId::Recognize => self.recognize(state),
            NodeId::Extract => self.extract(state),
            NodeId::Fuse => self.fuse(state),
            NodeId::Archive => self.archive(state),
            NodeId::Persist => self.persist(state),
            NodeId::Generate => self.generate(state),
        }
    }

    /// Validate the input set and order it for fusion. The caller
    /// already labeled each file with its category; this node only
    /// checks the files exist and fixes the processing order.
    fn classify(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        if state.input.documents.is_empty() {
            return Err(WorkflowError::Input("no input documents".into()));
        }
        for (category, path) in &state.input.documents {
            if !path.is_file() {
                return Err(WorkflowError::Input(format!(
                    "{} document not found: {}",
                    category.as_str(),
                    path.display()
                )));
            }
        }

        let mut classified: Vec<(DocumentCategory, PathBuf)> = state
            .input
            .documents
            .iter()
            .map(|(category, path)| (*category, path.clone()))
            .collect();
        classified.sort_by_key(|(category, _)| category.fusion_rank());

        let tools = classified
            .iter()
            .map(|(_, path)| path.display().to_string())
            .collect();
        state.classified = classified;
        Ok(tools)
    }

    fn recognize(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        let mut tools = vec![format!("engine:{}", self.adapter.engine_name())];
        for (category, path) in state.classified.clone() {
            let raw = self.recognize_with_retry(category, &path)?;
            if raw.confidence < self.config.confidence_threshold
                && !state.low_confidence.contains(&category)
            {
                tracing::warn!(
                    category = category.as_str(),
                    confidence = raw.confidence,
                    threshold = self.config.confidence_threshold,
                    "Recognition confidence stayed low after retry, flagging for review"
                );
                state.low_confidence.push(category);
            }
            tools.push(path.display().to_string());
            state.raw_results.insert(category, raw);
        }
        Ok(tools)
    }

    /// One recognition call with a single retry: a low-confidence result
    /// is retried and the higher-confidence attempt kept; a failed call
    /// is retried once and only the second failure propagates. An
    /// unavailable engine is not retryable here at all.
    fn recognize_with_retry(
        &self,
        category: DocumentCategory,
        path: &std::path::Path,
    ) -> Result<RawRecognition, WorkflowError> {
        match self.adapter.recognize(category, path) {
            Ok(raw) if raw.confidence >= self.config.confidence_threshold => Ok(raw),
            Ok(raw) => {
                tracing::warn!(
                    category = category.as_str(),
                    confidence = raw.confidence,
                    "Low recognition confidence, retrying once"
                );
                match self.adapter.recognize(category, path) {
                    Ok(second) if second.confidence > raw.confidence => Ok(second),
                    _ => Ok(raw),
                }
            }
            Err(RecognitionError::Failed(first)) => {
                tracing::warn!(
                    category = category.as_str(),
                    error = %first,
                    "Recognition failed, retrying once"
                );
                self.adapter
                    .recognize(category, path)
                    .map_err(WorkflowError::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn extract(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        state.partials.clear();
        for (category, path) in &state.classified {
            if let Some(raw) = state.raw_results.get(category) {
                state.partials.push(extract::extract(*category, raw, path));
            }
        }
        // A prior record participates as one more partial, appended last
        // so fresh document values outrank it on priority ties.
        if let Some(prior) = &state.input.prior_record {
            state.partials.push(prior_partial(prior));
        }
        Ok(state
            .partials
            .iter()
            .map(|p| p.source_path.display().to_string())
            .collect())
    }

    fn fuse(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        let fused = fusion::merge(&state.partials, &self.priorities)?;
        for warning in fused.warnings() {
            tracing::warn!(run_id = %state.run_id, warning, "Fusion shape-check warning");
        }
        state.fused = Some(fused);
        Ok(vec![])
    }

    fn archive(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        let fused = state
            .fused
            .as_mut()
            .ok_or_else(|| WorkflowError::Input("fuse output missing from working state".into()))?;

        let entry = self.archive.archive(
            &fused.id_card,
            &state.input.documents,
            self.config.delete_originals,
        )?;

        // Provenance now points at the archived copies, not the intake paths.
        let mut tools = Vec::new();
        for file in &entry.files {
            let stored = file.stored_path.display().to_string();
            fused.source_files.insert(file.category, stored.clone());
            tools.push(stored);
        }
        state.archive = Some(entry);
        Ok(tools)
    }

    fn persist(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        let fused = state
            .fused
            .as_ref()
            .ok_or_else(|| WorkflowError::Input("fuse output missing from working state".into()))?;
        let record_id = operator::upsert(&self.conn, fused)?;
        state.record_id = Some(record_id);
        Ok(vec!["sqlite:operators".into()])
    }

    fn generate(&self, state: &mut WorkingState) -> Result<Vec<String>, WorkflowError> {
        let fused = state
            .fused
            .as_ref()
            .ok_or_else(|| WorkflowError::Input("fuse output missing from working state".into()))?;
        let field_map = fused.to_field_map();
        let generated = self.generator.generate(&field_map)?;

        let tools = generated
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        state.output_fields = Some(field_map);
        state.generated_document = generated;
        Ok(tools)
    }
}

/// A prior canonical record rendered as one more partial, carrying every
/// non-empty field at generic priority.
fn prior_partial(prior: &OperatorRecord) -> PartialRecord {
    let mut partial = PartialRecord::new(DocumentCategory::Generic, "prior-record");
    for (field, value) in prior.to_field_map() {
        if field == fields::CURRENT_DATE {
            continue;
        }
        partial.set(&field, value);
    }
    partial
}
