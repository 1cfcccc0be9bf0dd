//! Run controller: the state machine that sequences one workflow run.
//!
//! ```text
//! Parsing → Producing → Integrating → Reviewing ─┬→ Approved ──┬→ Finalizing → Done
//!                            ↑                   ├→ Exhausted ─┘
//!                            └──── Reworking ←───┘
//! ```
//!
//! The iteration counter is bumped on entry to `Reviewing`, so the loop body
//! always runs at least once and the run finalizes with
//! `1 <= iteration <= MAX_ITERATIONS`.

use crate::errors::WorkflowError;
use crate::workflow::checkpoint::{Checkpoint, CheckpointRecord, CheckpointStore, ManifestStatus};
use crate::workflow::reviewer::{self, ReviewerGate};
use crate::workflow::rework::{self, ReworkRouter};
use crate::workflow::{
    CandidateArtifact, FeedbackItem, ParsedContent, ProducerRole, ProducerSlots, ReviewVerdict,
    Role, StageDispatch, StageInvoker, StageRequest, WorkflowInput, fanout, merger, output,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Review iterations before the run gives up and ships its latest candidate.
pub const MAX_ITERATIONS: u32 = 3;

/// Default checkpoint directory name under the output directory.
pub const DEFAULT_CHECKPOINT_DIR: &str = "checkpoints";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Parsing,
    Producing,
    Integrating,
    Reviewing,
    Approved,
    Reworking,
    Exhausted,
    Finalizing,
    Done,
}

impl RunPhase {
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Parsing, Producing)
                | (Producing, Integrating)
                | (Integrating, Reviewing)
                | (Reviewing, Approved)
                | (Reviewing, Exhausted)
                | (Reviewing, Reworking)
                | (Reworking, Integrating)
                | (Approved, Finalizing)
                | (Exhausted, Finalizing)
                | (Finalizing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Parsing => "parsing",
            Self::Producing => "producing",
            Self::Integrating => "integrating",
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Reworking => "reworking",
            Self::Exhausted => "exhausted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The reviewer approved the final candidate.
    Approved,
    /// The iteration cap was reached; the latest candidate was shipped anyway.
    BudgetExhausted,
}

impl From<RunStatus> for ManifestStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Approved => ManifestStatus::Approved,
            RunStatus::BudgetExhausted => ManifestStatus::BudgetExhausted,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::BudgetExhausted => f.write_str("budget exhausted"),
        }
    }
}

/// Mutable state of one run. Owned by the controller's own flow of control;
/// producer tasks never see it.
#[derive(Debug)]
pub struct RunState {
    pub iteration: u32,
    pub cap: u32,
    pub phase: RunPhase,
    pub checkpoints: Vec<Checkpoint>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            iteration: 0,
            cap: MAX_ITERATIONS,
            phase: RunPhase::Parsing,
            checkpoints: Vec::new(),
        }
    }

    /// State right after the review of `iteration`, as restored from disk.
    fn restored(iteration: u32) -> Self {
        Self {
            iteration,
            cap: MAX_ITERATIONS,
            phase: RunPhase::Reviewing,
            checkpoints: Vec::new(),
        }
    }

    fn transition(&mut self, next: RunPhase) -> Result<(), WorkflowError> {
        if !self.phase.can_transition_to(next) {
            return Err(anyhow::anyhow!(
                "illegal run transition {} -> {}",
                self.phase,
                next
            )
            .into());
        }
        info!(from = %self.phase, to = %next, iteration = self.iteration, "run phase");
        self.phase = next;
        Ok(())
    }

    fn begin_iteration(&mut self) -> Result<u32, WorkflowError> {
        if self.iteration >= self.cap {
            return Err(anyhow::anyhow!("iteration cap {} already reached", self.cap).into());
        }
        self.iteration += 1;
        Ok(self.iteration)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress events for callers that want to render the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    PhaseChanged {
        phase: RunPhase,
        iteration: u32,
    },
    ReworkPlanned {
        iteration: u32,
        roles: Vec<ProducerRole>,
    },
    CheckpointWritten {
        iteration: u32,
        path: PathBuf,
    },
    Finished {
        status: RunStatus,
        iteration: u32,
        output_path: PathBuf,
    },
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub iterations: u32,
    pub title: String,
    pub output_path: PathBuf,
    pub candidate: CandidateArtifact,
    pub checkpoints: Vec<CheckpointRecord>,
}

impl RunReport {
    pub fn approved(&self) -> bool {
        self.status == RunStatus::Approved
    }
}

pub struct RunController {
    dispatch: StageDispatch,
    checkpoint_dir: String,
    event_tx: Option<mpsc::Sender<RunEvent>>,
}

impl RunController {
    pub fn new(invoker: Arc<dyn StageInvoker>) -> Self {
        Self {
            dispatch: StageDispatch::new(invoker),
            checkpoint_dir: DEFAULT_CHECKPOINT_DIR.to_string(),
            event_tx: None,
        }
    }

    /// Bound every stage call by `timeout`. `None` waits indefinitely.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dispatch = self.dispatch.with_deadline(timeout);
        self
    }

    /// Checkpoint directory name, relative to the output directory.
    pub fn with_checkpoint_dir(mut self, name: &str) -> Self {
        self.checkpoint_dir = name.to_string();
        self
    }

    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn checkpoint_dir(&self, input: &WorkflowInput) -> PathBuf {
        input.output_dir().join(&self.checkpoint_dir)
    }

    /// Run the whole workflow for `input`.
    pub async fn run(&self, input: &WorkflowInput) -> Result<RunReport, WorkflowError> {
        let mut store = CheckpointStore::begin_run(&self.checkpoint_dir(input), input);
        info!(run_id = %store.run_id(), source = input.source(), "starting workflow");
        let result = self.run_fresh(input, &mut store).await;
        conclude(result, &mut store)
    }

    /// Continue from the newest checkpoint under the output directory, or
    /// start fresh when there is none.
    pub async fn resume(&self, input: &WorkflowInput) -> Result<RunReport, WorkflowError> {
        let dir = self.checkpoint_dir(input);
        let Some((manifest, snapshot)) = CheckpointStore::latest_recovery(&dir)? else {
            info!(dir = %dir.display(), "no checkpoint to resume from");
            return self.run(input).await;
        };

        if manifest.source != input.source() {
            return Err(anyhow::anyhow!(
                "checkpoints in {} belong to '{}', not '{}'",
                dir.display(),
                manifest.source,
                input.source()
            )
            .into());
        }
        if matches!(
            manifest.status,
            ManifestStatus::Approved | ManifestStatus::BudgetExhausted
        ) {
            return Err(anyhow::anyhow!(
                "run {} already finished ({}); nothing to resume",
                manifest.run_id,
                manifest.status
            )
            .into());
        }

        let mut store = CheckpointStore::resume_run(&dir, manifest);
        info!(
            run_id = %store.run_id(),
            iteration = snapshot.iteration,
            "resuming workflow"
        );
        let mut state = RunState::restored(snapshot.iteration);
        let result = self
            .continue_from(
                input,
                &snapshot.parsed,
                snapshot.candidate,
                &snapshot.verdict,
                &mut state,
                &mut store,
            )
            .await;
        conclude(result, &mut store)
    }

    async fn run_fresh(
        &self,
        input: &WorkflowInput,
        store: &mut CheckpointStore,
    ) -> Result<RunReport, WorkflowError> {
        let mut state = RunState::new();
        self.emit(RunEvent::PhaseChanged {
            phase: RunPhase::Parsing,
            iteration: 0,
        })
        .await;

        let parsed = self
            .dispatch
            .call(StageRequest::Parse {
                source: input.source().to_string(),
            })
            .await?
            .into_parsed(Role::Parser)?;

        self.advance(&mut state, RunPhase::Producing).await?;
        let requests = ProducerRole::ALL
            .into_iter()
            .map(|role| (role, StageRequest::for_producer(role, input, &parsed, None)))
            .collect();
        let slots = fanout::run_all(&self.dispatch, requests).await?;

        self.advance(&mut state, RunPhase::Integrating).await?;
        let candidate = merger::integrate(input, &parsed, &slots, state.iteration + 1);

        self.refine(input, &parsed, candidate, &mut state, store).await
    }

    /// Pick up right after a recorded review.
    async fn continue_from(
        &self,
        input: &WorkflowInput,
        parsed: &ParsedContent,
        candidate: CandidateArtifact,
        verdict: &ReviewVerdict,
        state: &mut RunState,
        store: &mut CheckpointStore,
    ) -> Result<RunReport, WorkflowError> {
        if reviewer::accepts(verdict, state.iteration) {
            self.advance(state, RunPhase::Approved).await?;
            return self
                .finalize(input, candidate, RunStatus::Approved, state, store)
                .await;
        }
        if state.iteration >= state.cap {
            self.advance(state, RunPhase::Exhausted).await?;
            return self
                .finalize(input, candidate, RunStatus::BudgetExhausted, state, store)
                .await;
        }

        let next = self
            .rework(input, parsed, &candidate.sources, &verdict.feedback, state)
            .await?;
        self.refine(input, parsed, next, state, store).await
    }

    /// The review loop. Entered in `Integrating` with the next candidate ready.
    async fn refine(
        &self,
        input: &WorkflowInput,
        parsed: &ParsedContent,
        mut candidate: CandidateArtifact,
        state: &mut RunState,
        store: &mut CheckpointStore,
    ) -> Result<RunReport, WorkflowError> {
        let status = loop {
            let iteration = state.begin_iteration()?;
            self.advance(state, RunPhase::Reviewing).await?;

            if let Some(role) = candidate.sources.missing().first() {
                return Err(WorkflowError::MissingProducerOutput { role: *role });
            }
            let verdict = ReviewerGate::new(&self.dispatch)
                .review(&candidate, iteration)
                .await?;

            if reviewer::accepts(&verdict, iteration) {
                self.record(state, store, parsed, Checkpoint {
                    iteration,
                    candidate: candidate.clone(),
                    verdict,
                })
                .await?;
                self.advance(state, RunPhase::Approved).await?;
                info!(iteration, "candidate approved");
                break RunStatus::Approved;
            }

            if iteration >= state.cap {
                self.advance(state, RunPhase::Exhausted).await?;
                warn!(iteration, "iteration cap reached without approval");
                break RunStatus::BudgetExhausted;
            }

            let feedback = verdict.feedback.clone();
            self.record(state, store, parsed, Checkpoint {
                iteration,
                candidate: candidate.clone(),
                verdict,
            })
            .await?;
            candidate = self
                .rework(input, parsed, &candidate.sources, &feedback, state)
                .await?;
        };

        self.finalize(input, candidate, status, state, store).await
    }

    /// `Reviewing → Reworking → Integrating`: re-run the targeted producers and
    /// integrate the next candidate on top of the untouched ones.
    async fn rework(
        &self,
        input: &WorkflowInput,
        parsed: &ParsedContent,
        current: &ProducerSlots,
        feedback: &[FeedbackItem],
        state: &mut RunState,
    ) -> Result<CandidateArtifact, WorkflowError> {
        self.advance(state, RunPhase::Reworking).await?;
        let roles = rework::targets(feedback);
        info!(iteration = state.iteration, roles = ?roles, "targeted rework");
        self.emit(RunEvent::ReworkPlanned {
            iteration: state.iteration,
            roles,
        })
        .await;

        let reworked = ReworkRouter::new(&self.dispatch, input)
            .route(feedback, parsed)
            .await?;
        let mut slots = current.clone();
        slots.merge(reworked);

        self.advance(state, RunPhase::Integrating).await?;
        Ok(merger::integrate(input, parsed, &slots, state.iteration + 1))
    }

    async fn record(
        &self,
        state: &mut RunState,
        store: &mut CheckpointStore,
        parsed: &ParsedContent,
        checkpoint: Checkpoint,
    ) -> Result<(), WorkflowError> {
        let record = store.append(&checkpoint, parsed)?;
        self.emit(RunEvent::CheckpointWritten {
            iteration: record.iteration,
            path: record.candidate_path,
        })
        .await;
        state.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn finalize(
        &self,
        input: &WorkflowInput,
        candidate: CandidateArtifact,
        status: RunStatus,
        state: &mut RunState,
        store: &mut CheckpointStore,
    ) -> Result<RunReport, WorkflowError> {
        self.advance(state, RunPhase::Finalizing).await?;
        let output_path = output::write_final(input.output_dir(), &candidate)?;
        store.finish_run(status.into(), &output_path)?;
        self.advance(state, RunPhase::Done).await?;

        info!(
            %status,
            iteration = state.iteration,
            output = %output_path.display(),
            "workflow finished"
        );
        self.emit(RunEvent::Finished {
            status,
            iteration: state.iteration,
            output_path: output_path.clone(),
        })
        .await;

        Ok(RunReport {
            run_id: store.run_id(),
            status,
            iterations: state.iteration,
            title: candidate.title.clone(),
            output_path,
            candidate,
            checkpoints: store.records().to_vec(),
        })
    }

    async fn advance(&self, state: &mut RunState, next: RunPhase) -> Result<(), WorkflowError> {
        state.transition(next)?;
        self.emit(RunEvent::PhaseChanged {
            phase: next,
            iteration: state.iteration,
        })
        .await;
        Ok(())
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }
}

fn conclude(
    result: Result<RunReport, WorkflowError>,
    store: &mut CheckpointStore,
) -> Result<RunReport, WorkflowError> {
    if let Err(ref e) = result {
        warn!(error = %e, checkpoints = store.records().len(), "workflow failed");
        if let Err(save_err) = store.fail_run(&e.to_string()) {
            warn!(error = %save_err, "failed to record run failure in manifest");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{PAPER_TITLE, ScriptedInvoker};
    use std::fs;

    fn controller(invoker: &Arc<ScriptedInvoker>) -> RunController {
        RunController::new(invoker.clone())
    }

    fn reject(role: ProducerRole, action: &str) -> ReviewVerdict {
        ReviewVerdict::reject("not there yet", vec![FeedbackItem::new(role, action)])
    }

    #[test]
    fn test_phase_transitions() {
        use RunPhase::*;
        assert!(Parsing.can_transition_to(Producing));
        assert!(Reviewing.can_transition_to(Reworking));
        assert!(Reworking.can_transition_to(Integrating));
        assert!(Exhausted.can_transition_to(Finalizing));
        assert!(!Parsing.can_transition_to(Reviewing));
        assert!(!Reworking.can_transition_to(Reviewing));
        assert!(!Done.can_transition_to(Parsing));
        assert!(Done.is_terminal());
    }

    #[test]
    fn test_state_refuses_illegal_transition_and_overrun() {
        let mut state = RunState::new();
        assert!(state.transition(RunPhase::Reviewing).is_err());
        assert_eq!(state.phase, RunPhase::Parsing);

        for n in 1..=MAX_ITERATIONS {
            assert_eq!(state.begin_iteration().unwrap(), n);
        }
        assert!(state.begin_iteration().is_err());
        assert_eq!(state.iteration, MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_scenario_a_immediate_approval() {
        let invoker = Arc::new(
            ScriptedInvoker::new().with_verdicts(vec![ReviewVerdict::approve("ship it")]),
        );
        let (input, _dir) = ScriptedInvoker::input();

        let report = controller(&invoker).run(&input).await.unwrap();

        assert_eq!(report.status, RunStatus::Approved);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.title, PAPER_TITLE);
        assert_eq!(
            report.output_path,
            input.output_dir().join("Attention_Is_All_You_Need.md")
        );
        assert_eq!(
            fs::read_to_string(&report.output_path).unwrap(),
            report.candidate.content
        );
        assert_eq!(report.checkpoints.len(), 1);
        // One review, no rework.
        assert_eq!(invoker.calls_for(Role::Reviewer), 1);
        assert_eq!(invoker.calls_for(Role::BlogGenerator), 1);
        assert_eq!(invoker.calls_for(Role::FigureExtractor), 1);
        assert_eq!(invoker.calls_for(Role::CoverDesigner), 1);
    }

    #[tokio::test]
    async fn test_scenario_b_targeted_rework_carries_untouched_outputs() {
        let verdicts = vec![
            reject(ProducerRole::BlogGenerator, "explain attention first"),
            reject(ProducerRole::CoverDesigner, "less clutter"),
            ReviewVerdict::approve("good"),
        ];
        let invoker = Arc::new(ScriptedInvoker::new().with_verdicts(verdicts.clone()));
        let (input, _dir) = ScriptedInvoker::input();

        let report = controller(&invoker).run(&input).await.unwrap();

        assert_eq!(report.status, RunStatus::Approved);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.checkpoints.len(), 3);

        let sources = &report.candidate.sources;
        assert_eq!(sources.draft.as_ref().unwrap().markdown, "draft v2");
        assert_eq!(sources.assets.as_ref().unwrap().figures[0].caption, "assets v1");
        assert_eq!(
            sources.cover.as_ref().unwrap().path,
            PathBuf::from("cover_v2.png")
        );

        // Checkpoint n stores exactly the verdict iteration n received.
        for (record, expected) in report.checkpoints.iter().zip(&verdicts) {
            let stored: ReviewVerdict =
                serde_json::from_str(&fs::read_to_string(&record.verdict_path).unwrap()).unwrap();
            assert_eq!(&stored, expected);
        }
        let iterations: Vec<u32> = report.checkpoints.iter().map(|c| c.iteration).collect();
        assert_eq!(iterations, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scenario_c_budget_exhausted_is_not_an_error() {
        let invoker = Arc::new(ScriptedInvoker::new().with_verdicts(vec![
            reject(ProducerRole::BlogGenerator, "a"),
            reject(ProducerRole::BlogGenerator, "b"),
            reject(ProducerRole::BlogGenerator, "c"),
        ]));
        let (input, _dir) = ScriptedInvoker::input();

        let report = controller(&invoker).run(&input).await.unwrap();

        assert_eq!(report.status, RunStatus::BudgetExhausted);
        assert!(!report.approved());
        assert_eq!(report.iterations, MAX_ITERATIONS);
        assert_eq!(report.candidate.iteration, 3);
        assert_eq!(report.candidate.sources.draft.as_ref().unwrap().markdown, "draft v3");
        // The exhausting iteration writes no checkpoint.
        assert_eq!(report.checkpoints.len(), 2);
        assert_eq!(invoker.calls_for(Role::Reviewer), 3);
        assert!(report.output_path.exists());

        let manifest = CheckpointStore::load_manifest(&controller(&invoker).checkpoint_dir(&input))
            .unwrap()
            .unwrap();
        assert_eq!(manifest.status, ManifestStatus::BudgetExhausted);
        assert_eq!(manifest.output_path.as_ref(), Some(&report.output_path));
    }

    #[tokio::test]
    async fn test_cover_only_feedback_keeps_other_outputs_identical() {
        let invoker = Arc::new(ScriptedInvoker::new().with_verdicts(vec![
            reject(ProducerRole::CoverDesigner, "bigger font"),
            ReviewVerdict::approve("ok"),
        ]));
        let (input, _dir) = ScriptedInvoker::input();

        let report = controller(&invoker).run(&input).await.unwrap();

        let reviews = invoker.requests_for(Role::Reviewer);
        let (StageRequest::Review { candidate: first, .. }, StageRequest::Review { candidate: second, .. }) =
            (&reviews[0], &reviews[1])
        else {
            panic!("expected review requests");
        };
        assert_eq!(first.sources.draft, second.sources.draft);
        assert_eq!(first.sources.assets, second.sources.assets);
        assert_ne!(first.sources.cover, second.sources.cover);
        assert_eq!(report.iterations, 2);
    }

    #[tokio::test]
    async fn test_reviewer_never_sees_missing_outputs() {
        let invoker = Arc::new(ScriptedInvoker::new().with_verdicts(vec![
            reject(ProducerRole::FigureExtractor, "crop figures"),
            ReviewVerdict::reject("still meh", vec![]),
        ]));
        let (input, _dir) = ScriptedInvoker::input();

        controller(&invoker).run(&input).await.unwrap();

        let reviews = invoker.requests_for(Role::Reviewer);
        assert_eq!(reviews.len(), 3);
        for (i, request) in reviews.iter().enumerate() {
            let StageRequest::Review { candidate, iteration } = request else {
                panic!("expected review request");
            };
            assert_eq!(*iteration, i as u32 + 1);
            assert_eq!(candidate.iteration, *iteration);
            assert!(candidate.sources.is_complete());
        }
    }

    #[tokio::test]
    async fn test_producer_failure_is_fatal_with_zero_checkpoints() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fail(Role::CoverDesigner, "image model offline")
                .with_verdicts(vec![ReviewVerdict::approve("never reached")]),
        );
        let (input, _dir) = ScriptedInvoker::input();
        let ctl = controller(&invoker);

        let err = ctl.run(&input).await.unwrap_err();

        let stage = err.stage_error().expect("stage failure");
        assert_eq!(stage.role, Role::CoverDesigner);
        assert_eq!(stage.cause, "image model offline");
        assert_eq!(invoker.calls_for(Role::Reviewer), 0);
        assert!(!ctl.checkpoint_dir(&input).exists());
        assert!(!input.output_dir().exists());
    }

    #[tokio::test]
    async fn test_parse_failure_is_fatal() {
        let invoker = Arc::new(ScriptedInvoker::new().fail(Role::Parser, "encrypted pdf"));
        let (input, _dir) = ScriptedInvoker::input();

        let err = controller(&invoker).run(&input).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Stage(ref e) if e.role == Role::Parser));
        assert_eq!(invoker.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_rework_failure_keeps_checkpoints_and_writes_no_final() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fail_from(Role::BlogGenerator, 2, "agent crashed")
                .with_verdicts(vec![reject(ProducerRole::BlogGenerator, "rewrite")]),
        );
        let (input, _dir) = ScriptedInvoker::input();
        let ctl = controller(&invoker);

        let err = ctl.run(&input).await.unwrap_err();

        assert_eq!(err.stage_error().unwrap().role, Role::BlogGenerator);
        let manifest = CheckpointStore::load_manifest(&ctl.checkpoint_dir(&input))
            .unwrap()
            .unwrap();
        assert_eq!(manifest.status, ManifestStatus::Failed);
        assert_eq!(manifest.checkpoints.len(), 1);
        assert!(manifest.error.unwrap().contains("agent crashed"));
        assert!(!input.output_dir().join("Attention_Is_All_You_Need.md").exists());
    }

    #[tokio::test]
    async fn test_resume_continues_after_failed_rework() {
        let (input, _dir) = ScriptedInvoker::input();

        let failing = Arc::new(
            ScriptedInvoker::new()
                .fail_from(Role::BlogGenerator, 2, "agent crashed")
                .with_verdicts(vec![reject(ProducerRole::BlogGenerator, "rewrite")]),
        );
        controller(&failing).run(&input).await.unwrap_err();

        let healthy = Arc::new(
            ScriptedInvoker::new().with_verdicts(vec![ReviewVerdict::approve("better")]),
        );
        let report = controller(&healthy).resume(&input).await.unwrap();

        // Parsing and the initial fan-out are not repeated.
        assert_eq!(healthy.calls_for(Role::Parser), 0);
        assert_eq!(healthy.calls_for(Role::FigureExtractor), 0);
        assert_eq!(healthy.requests_for(Role::BlogGenerator)[0].action(), Some("rewrite"));
        assert_eq!(report.status, RunStatus::Approved);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.checkpoints.len(), 2);
        // Assets and cover come from the interrupted run.
        let sources = &report.candidate.sources;
        assert_eq!(sources.assets.as_ref().unwrap().figures[0].caption, "assets v1");
        assert_eq!(sources.cover.as_ref().unwrap().path, PathBuf::from("cover_v1.png"));
    }

    #[tokio::test]
    async fn test_resume_refuses_finished_run() {
        let (input, _dir) = ScriptedInvoker::input();
        let invoker = Arc::new(
            ScriptedInvoker::new().with_verdicts(vec![ReviewVerdict::approve("done")]),
        );
        controller(&invoker).run(&input).await.unwrap();

        let err = controller(&invoker).resume(&input).await.unwrap_err();
        assert!(err.to_string().contains("already finished"));
    }

    #[tokio::test]
    async fn test_resume_without_checkpoints_runs_fresh() {
        let (input, _dir) = ScriptedInvoker::input();
        let invoker = Arc::new(
            ScriptedInvoker::new().with_verdicts(vec![ReviewVerdict::approve("done")]),
        );

        let report = controller(&invoker).resume(&input).await.unwrap();

        assert_eq!(invoker.calls_for(Role::Parser), 1);
        assert!(report.approved());
    }

    #[tokio::test]
    async fn test_events_follow_state_machine() {
        let invoker = Arc::new(ScriptedInvoker::new().with_verdicts(vec![
            reject(ProducerRole::CoverDesigner, "redo"),
            ReviewVerdict::approve("ok"),
        ]));
        let (input, _dir) = ScriptedInvoker::input();
        let (tx, mut rx) = mpsc::channel(64);

        controller(&invoker)
            .with_event_channel(tx)
            .run(&input)
            .await
            .unwrap();

        let mut phases = Vec::new();
        let mut checkpoints = 0;
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::PhaseChanged { phase, .. } => phases.push(phase),
                RunEvent::CheckpointWritten { .. } => checkpoints += 1,
                RunEvent::ReworkPlanned { roles, .. } => {
                    assert_eq!(roles, vec![ProducerRole::CoverDesigner])
                }
                RunEvent::Finished { status, iteration, .. } => finished = Some((status, iteration)),
            }
        }

        use RunPhase::*;
        assert_eq!(
            phases,
            vec![
                Parsing, Producing, Integrating, Reviewing, Reworking, Integrating, Reviewing,
                Approved, Finalizing, Done
            ]
        );
        assert_eq!(checkpoints, 2);
        assert_eq!(finished, Some((RunStatus::Approved, 2)));
    }

    #[tokio::test]
    async fn test_stage_timeout_is_a_stage_error() {
        let invoker = Arc::new(
            ScriptedInvoker::new().with_delay(Role::FigureExtractor, Duration::from_secs(5)),
        );
        let (input, _dir) = ScriptedInvoker::input();

        let err = controller(&invoker)
            .with_stage_timeout(Some(Duration::from_millis(50)))
            .run(&input)
            .await
            .unwrap_err();

        let stage = err.stage_error().unwrap();
        assert_eq!(stage.role, Role::FigureExtractor);
        assert!(stage.cause.contains("timed out"));
    }
}
