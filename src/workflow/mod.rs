//! Paper-to-blog workflow: parse, parallel production, integration, and a
//! bounded review/rework loop.

pub mod checkpoint;
pub mod controller;
pub mod fanout;
pub mod invoker;
pub mod merger;
pub mod output;
pub mod reviewer;
pub mod rework;
pub mod role;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{Checkpoint, CheckpointRecord, CheckpointStore, ManifestStatus, RunManifest};
pub use controller::{
    MAX_ITERATIONS, RunController, RunEvent, RunPhase, RunReport, RunState, RunStatus,
};
pub use invoker::{StageDispatch, StageInvoker, StageRequest, StageResponse};
pub use role::{ProducerRole, Role};
pub use types::{
    BlogDraft, CandidateArtifact, CoverArt, FeedbackItem, Figure, FigureSet, ParsedContent,
    ParsedSection, ProducerOutput, ProducerSlots, ReviewVerdict, WorkflowInput,
};
