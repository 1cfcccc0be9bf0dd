//! Append-only checkpoint store.
//!
//! Layout under the checkpoint directory:
//!
//! ```text
//! checkpoints/
//! ├── run.json                    # manifest: run id, status, ordered records
//! ├── blog_v1.md                  # candidate body reviewed in iteration 1
//! ├── feedback/feedback_v1.json   # the verdict iteration 1 received
//! └── state/state_v1.json         # recovery snapshot for resume
//! ```
//!
//! Nothing is written to disk until the first checkpoint is appended, so a run
//! that fails before completing an iteration leaves no checkpoint directory.
//! A fresh run owns the directory: files left by an earlier run are removed
//! before its first checkpoint, or when it fails without one.

use crate::errors::WorkflowError;
use crate::workflow::{CandidateArtifact, ParsedContent, ReviewVerdict, WorkflowInput};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "run.json";

/// One completed iteration: the candidate that was reviewed and its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub iteration: u32,
    pub candidate: CandidateArtifact,
    pub verdict: ReviewVerdict,
}

/// Where one checkpoint was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub iteration: u32,
    pub approved: bool,
    pub candidate_path: PathBuf,
    pub verdict_path: PathBuf,
    pub state_path: PathBuf,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Running,
    Approved,
    BudgetExhausted,
    Failed,
}

impl std::fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Approved => "approved",
            Self::BudgetExhausted => "budget exhausted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ManifestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checkpoints: Vec<CheckpointRecord>,
}

impl RunManifest {
    fn new(source: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: ManifestStatus::Running,
            output_path: None,
            error: None,
            checkpoints: Vec::new(),
        }
    }
}

/// Everything needed to pick a run back up after iteration `iteration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub iteration: u32,
    pub parsed: ParsedContent,
    pub candidate: CandidateArtifact,
    pub verdict: ReviewVerdict,
}

pub struct CheckpointStore {
    dir: PathBuf,
    manifest: RunManifest,
    /// Set until files from an earlier run have been cleared.
    stale: bool,
}

impl CheckpointStore {
    /// Start a fresh run manifest for `input`, stored under `dir`.
    pub fn begin_run(dir: &Path, input: &WorkflowInput) -> Self {
        Self {
            dir: dir.to_path_buf(),
            manifest: RunManifest::new(input.source()),
            stale: true,
        }
    }

    /// Continue an existing manifest, reopening it as running.
    pub fn resume_run(dir: &Path, mut manifest: RunManifest) -> Self {
        manifest.status = ManifestStatus::Running;
        manifest.ended_at = None;
        manifest.error = None;
        Self {
            dir: dir.to_path_buf(),
            manifest,
            stale: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.manifest.run_id
    }

    pub fn records(&self) -> &[CheckpointRecord] {
        &self.manifest.checkpoints
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    /// Persist one iteration. Iterations must be appended in increasing order.
    pub fn append(
        &mut self,
        checkpoint: &Checkpoint,
        parsed: &ParsedContent,
    ) -> Result<CheckpointRecord, WorkflowError> {
        let n = checkpoint.iteration;
        if let Some(last) = self.manifest.checkpoints.last()
            && last.iteration >= n
        {
            return Err(anyhow::anyhow!(
                "checkpoint for iteration {} already recorded (last: {})",
                n,
                last.iteration
            )
            .into());
        }

        self.clear_previous(n)?;

        let candidate_path = self.dir.join(format!("blog_v{}.md", n));
        let verdict_path = self.dir.join("feedback").join(format!("feedback_v{}.json", n));
        let state_path = self.dir.join("state").join(format!("state_v{}.json", n));

        let verdict_json = serde_json::to_string_pretty(&checkpoint.verdict)
            .context("Failed to serialize review verdict")?;
        let snapshot = RecoverySnapshot {
            iteration: n,
            parsed: parsed.clone(),
            candidate: checkpoint.candidate.clone(),
            verdict: checkpoint.verdict.clone(),
        };
        let state_json =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize recovery state")?;

        write_file(n, &candidate_path, &checkpoint.candidate.content)?;
        write_file(n, &verdict_path, &verdict_json)?;
        write_file(n, &state_path, &state_json)?;

        let record = CheckpointRecord {
            iteration: n,
            approved: checkpoint.verdict.approved,
            candidate_path,
            verdict_path,
            state_path,
            recorded_at: Utc::now(),
        };
        self.manifest.checkpoints.push(record.clone());
        self.save(n)?;

        debug!(iteration = n, dir = %self.dir.display(), "checkpoint written");
        Ok(record)
    }

    /// Close the manifest with its terminal status.
    pub fn finish_run(
        &mut self,
        status: ManifestStatus,
        output_path: &Path,
    ) -> Result<(), WorkflowError> {
        self.manifest.status = status;
        self.manifest.ended_at = Some(Utc::now());
        self.manifest.output_path = Some(output_path.to_path_buf());
        let n = self.last_iteration();
        self.save(n)
    }

    /// Record a fatal error. Only touches disk when a checkpoint exists.
    pub fn fail_run(&mut self, error: &str) -> Result<(), WorkflowError> {
        self.manifest.status = ManifestStatus::Failed;
        self.manifest.ended_at = Some(Utc::now());
        self.manifest.error = Some(error.to_string());
        if self.manifest.checkpoints.is_empty() {
            return self.clear_previous(0);
        }
        let n = self.last_iteration();
        self.save(n)
    }

    /// Remove the manifest and checkpoint files an earlier run left behind.
    /// Other files in the directory are not touched.
    fn clear_previous(&mut self, iteration: u32) -> Result<(), WorkflowError> {
        if !self.stale {
            return Ok(());
        }
        self.stale = false;
        if !self.dir.is_dir() {
            return Ok(());
        }

        let fail = |path: &Path, source| WorkflowError::CheckpointWriteFailed {
            iteration,
            path: path.to_path_buf(),
            source,
        };
        let entries = fs::read_dir(&self.dir).map_err(|e| fail(&self.dir, e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| fail(&self.dir, e))?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let result = match name.as_str() {
                "feedback" | "state" if path.is_dir() => fs::remove_dir_all(&path),
                MANIFEST_FILE => fs::remove_file(&path),
                _ if name.starts_with("blog_v") && name.ends_with(".md") => fs::remove_file(&path),
                _ => continue,
            };
            result.map_err(|e| fail(&path, e))?;
            removed += 1;
        }
        if removed > 0 {
            debug!(dir = %self.dir.display(), removed, "cleared previous run checkpoints");
        }
        Ok(())
    }

    fn last_iteration(&self) -> u32 {
        self.manifest
            .checkpoints
            .last()
            .map(|c| c.iteration)
            .unwrap_or(0)
    }

    fn save(&self, iteration: u32) -> Result<(), WorkflowError> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.manifest)
            .context("Failed to serialize run manifest")?;
        write_file(iteration, &path, &json)
    }

    /// Load the manifest under `dir`, if a run has checkpointed there.
    pub fn load_manifest(dir: &Path) -> anyhow::Result<Option<RunManifest>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read run manifest: {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run manifest: {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// The recovery snapshot of the newest checkpoint, if any.
    pub fn latest_recovery(dir: &Path) -> anyhow::Result<Option<(RunManifest, RecoverySnapshot)>> {
        let Some(manifest) = Self::load_manifest(dir)? else {
            return Ok(None);
        };
        let Some(record) = manifest.checkpoints.last() else {
            return Ok(None);
        };
        let content = fs::read_to_string(&record.state_path).with_context(|| {
            format!("Failed to read recovery state: {}", record.state_path.display())
        })?;
        let snapshot: RecoverySnapshot = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse recovery state: {}", record.state_path.display())
        })?;
        Ok(Some((manifest, snapshot)))
    }
}

fn write_file(iteration: u32, path: &Path, content: &str) -> Result<(), WorkflowError> {
    let result = match path.parent() {
        Some(parent) => fs::create_dir_all(parent).and_then(|_| fs::write(path, content)),
        None => fs::write(path, content),
    };
    result.map_err(|source| WorkflowError::CheckpointWriteFailed {
        iteration,
        path: path.to_path_buf(),
        source,
    })
}
