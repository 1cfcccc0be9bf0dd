//! Scripted stage invoker used by the workflow tests.

use crate::errors::StageError;
use crate::workflow::{
    BlogDraft, CoverArt, Figure, FigureSet, ParsedContent, ProducerOutput, ReviewVerdict, Role,
    StageInvoker, StageRequest, StageResponse, WorkflowInput,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Barrier;

pub const PAPER_TITLE: &str = "Attention Is All You Need";

/// Deterministic fake: producers return outputs tagged with their call number
/// (`draft v2`, `cover_v3.png`, ...), the reviewer pops scripted verdicts.
pub struct ScriptedInvoker {
    verdicts: Mutex<VecDeque<ReviewVerdict>>,
    failures: HashMap<Role, (u32, String)>,
    delays: HashMap<Role, Duration>,
    rendezvous: Option<Barrier>,
    counts: Mutex<HashMap<Role, u32>>,
    calls: Mutex<Vec<StageRequest>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            verdicts: Mutex::new(VecDeque::new()),
            failures: HashMap::new(),
            delays: HashMap::new(),
            rendezvous: None,
            counts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A source file in a fresh temp dir, with `out/` as the output directory.
    pub fn input() -> (WorkflowInput, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("attention.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let input = WorkflowInput::new(pdf.to_str().unwrap(), dir.path().join("out")).unwrap();
        (input, dir)
    }

    pub fn with_verdicts(self, verdicts: Vec<ReviewVerdict>) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.into();
        self
    }

    /// Every call to `role` fails.
    pub fn fail(self, role: Role, cause: &str) -> Self {
        self.fail_from(role, 1, cause)
    }

    /// Calls to `role` fail starting with the `call`-th one.
    pub fn fail_from(mut self, role: Role, call: u32, cause: &str) -> Self {
        self.failures.insert(role, (call, cause.to_string()));
        self
    }

    pub fn with_delay(mut self, role: Role, delay: Duration) -> Self {
        self.delays.insert(role, delay);
        self
    }

    /// Producers block until `parties` producer calls are in flight.
    pub fn with_rendezvous(mut self, parties: usize) -> Self {
        self.rendezvous = Some(Barrier::new(parties));
        self
    }

    pub fn calls_for(&self, role: Role) -> usize {
        self.requests_for(role).len()
    }

    pub fn requests_for(&self, role: Role) -> Vec<StageRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.role() == role)
            .cloned()
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(&self, request: StageRequest) -> Result<StageResponse, StageError> {
        let role = request.role();
        let call = {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(role).or_insert(0);
            *count += 1;
            *count
        };
        self.calls.lock().unwrap().push(request.clone());

        if role.as_producer().is_some()
            && let Some(barrier) = &self.rendezvous
        {
            barrier.wait().await;
        }
        if let Some(delay) = self.delays.get(&role) {
            tokio::time::sleep(*delay).await;
        }
        if let Some((from, cause)) = self.failures.get(&role)
            && call >= *from
        {
            return Err(StageError::new(role, cause));
        }

        let response = match request {
            StageRequest::Parse { .. } => StageResponse::Parsed(ParsedContent {
                title: Some(PAPER_TITLE.to_string()),
                ..Default::default()
            }),
            StageRequest::GenerateDraft { parsed, .. } => {
                StageResponse::Produced(ProducerOutput::Draft(BlogDraft {
                    title: parsed.title.unwrap_or_default(),
                    markdown: format!("draft v{}", call),
                }))
            }
            StageRequest::ExtractAssets { .. } => {
                StageResponse::Produced(ProducerOutput::Assets(FigureSet {
                    figures: vec![Figure {
                        id: "fig1".to_string(),
                        path: format!("figures/fig1_v{}.png", call).into(),
                        caption: format!("assets v{}", call),
                    }],
                }))
            }
            StageRequest::DesignCover { .. } => {
                StageResponse::Produced(ProducerOutput::Cover(CoverArt {
                    path: format!("cover_v{}.png", call).into(),
                    alt_text: None,
                }))
            }
            StageRequest::Review { .. } => {
                let verdict = self
                    .verdicts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| ReviewVerdict::reject("not yet", Vec::new()));
                StageResponse::Verdict(verdict)
            }
        };
        Ok(response)
    }
}
