//! Uniform interface to the external stages.
//!
//! Stages are opaque: the workflow hands a [`StageRequest`] to a
//! [`StageInvoker`] and gets a [`StageResponse`] or a [`StageError`] back.
//! The real implementation is [`AgentInvoker`](crate::agent::AgentInvoker);
//! tests inject scripted fakes.

use crate::errors::StageError;
use crate::workflow::{
    CandidateArtifact, ParsedContent, ProducerOutput, ProducerRole, ReviewVerdict, Role,
    WorkflowInput,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Input payload for one stage call.
#[derive(Debug, Clone, PartialEq)]
pub enum StageRequest {
    Parse {
        source: String,
    },
    GenerateDraft {
        parsed: ParsedContent,
        action: Option<String>,
    },
    ExtractAssets {
        source: String,
        action: Option<String>,
    },
    DesignCover {
        title: Option<String>,
        action: Option<String>,
    },
    Review {
        candidate: CandidateArtifact,
        iteration: u32,
    },
}

impl StageRequest {
    pub fn role(&self) -> Role {
        match self {
            Self::Parse { .. } => Role::Parser,
            Self::GenerateDraft { .. } => Role::BlogGenerator,
            Self::ExtractAssets { .. } => Role::FigureExtractor,
            Self::DesignCover { .. } => Role::CoverDesigner,
            Self::Review { .. } => Role::Reviewer,
        }
    }

    /// Build the request for a producer, optionally carrying a rework directive.
    pub fn for_producer(
        role: ProducerRole,
        input: &WorkflowInput,
        parsed: &ParsedContent,
        action: Option<&str>,
    ) -> Self {
        let action = action.map(str::to_string);
        match role {
            ProducerRole::BlogGenerator => Self::GenerateDraft {
                parsed: parsed.clone(),
                action,
            },
            ProducerRole::FigureExtractor => Self::ExtractAssets {
                source: input.source().to_string(),
                action,
            },
            ProducerRole::CoverDesigner => Self::DesignCover {
                title: parsed.title.clone(),
                action,
            },
        }
    }

    /// The rework directive, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::GenerateDraft { action, .. }
            | Self::ExtractAssets { action, .. }
            | Self::DesignCover { action, .. } => action.as_deref(),
            Self::Parse { .. } | Self::Review { .. } => None,
        }
    }
}

/// Result payload of one stage call.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResponse {
    Parsed(ParsedContent),
    Produced(ProducerOutput),
    Verdict(ReviewVerdict),
}

impl StageResponse {
    fn kind(&self) -> &'static str {
        match self {
            Self::Parsed(_) => "parsed content",
            Self::Produced(_) => "producer output",
            Self::Verdict(_) => "review verdict",
        }
    }

    pub fn into_parsed(self, role: Role) -> Result<ParsedContent, StageError> {
        match self {
            Self::Parsed(p) => Ok(p),
            other => Err(unexpected(role, "parsed content", &other)),
        }
    }

    /// Unwrap a producer output, checking it belongs to `role`.
    pub fn into_output(self, role: ProducerRole) -> Result<ProducerOutput, StageError> {
        match self {
            Self::Produced(out) if out.role() == role => Ok(out),
            Self::Produced(out) => Err(StageError::new(
                role,
                format!("stage returned output for {}", out.role()),
            )),
            other => Err(unexpected(role.into(), "producer output", &other)),
        }
    }

    pub fn into_verdict(self, role: Role) -> Result<ReviewVerdict, StageError> {
        match self {
            Self::Verdict(v) => Ok(v),
            other => Err(unexpected(role, "review verdict", &other)),
        }
    }
}

fn unexpected(role: Role, wanted: &str, got: &StageResponse) -> StageError {
    StageError::new(role, format!("expected {}, got {}", wanted, got.kind()))
}

/// Calls one external unit of work.
///
/// Implementations execute the stage at most once per call and perform no
/// retries or timeouts of their own.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    async fn invoke(&self, request: StageRequest) -> Result<StageResponse, StageError>;
}

/// Controller-side wrapper around the injected invoker.
///
/// Adds the optional per-call deadline and call logging; otherwise a straight
/// pass-through.
#[derive(Clone)]
pub struct StageDispatch {
    invoker: Arc<dyn StageInvoker>,
    deadline: Option<Duration>,
}

impl StageDispatch {
    pub fn new(invoker: Arc<dyn StageInvoker>) -> Self {
        Self {
            invoker,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn call(&self, request: StageRequest) -> Result<StageResponse, StageError> {
        let role = request.role();
        let start = Instant::now();
        debug!(%role, action = request.action(), "stage started");

        let result = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.invoker.invoke(request))
                .await
                .unwrap_or_else(|_| {
                    Err(StageError::new(
                        role,
                        format!("timed out after {}s", limit.as_secs_f64()),
                    ))
                }),
            None => self.invoker.invoke(request).await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(%role, elapsed_ms, "stage completed"),
            Err(e) => debug!(%role, elapsed_ms, cause = %e.cause, "stage failed"),
        }
        result
    }

    pub async fn call_producer(
        &self,
        role: ProducerRole,
        request: StageRequest,
    ) -> Result<ProducerOutput, StageError> {
        self.call(request).await?.into_output(role)
    }
}
