//! Review gate: submits a candidate and interprets the verdict.

use crate::errors::StageError;
use crate::workflow::{CandidateArtifact, ReviewVerdict, Role, StageDispatch, StageRequest};
use tracing::info;

pub struct ReviewerGate<'a> {
    dispatch: &'a StageDispatch,
}

impl<'a> ReviewerGate<'a> {
    pub fn new(dispatch: &'a StageDispatch) -> Self {
        Self { dispatch }
    }

    /// Ask the reviewer for a verdict on `candidate`. Does not touch run state.
    pub async fn review(
        &self,
        candidate: &CandidateArtifact,
        iteration: u32,
    ) -> Result<ReviewVerdict, StageError> {
        let verdict = self
            .dispatch
            .call(StageRequest::Review {
                candidate: candidate.clone(),
                iteration,
            })
            .await?
            .into_verdict(Role::Reviewer)?;

        info!(
            iteration,
            approved = verdict.approved,
            feedback = verdict.feedback.len(),
            summary = %verdict.summary,
            "review verdict"
        );
        Ok(verdict)
    }
}

/// Whether a verdict ends the refine loop as approved.
///
/// Review only ever happens after a full iteration, so an approval on
/// iteration 1 is accepted; iteration 0 never is.
pub fn accepts(verdict: &ReviewVerdict, iteration: u32) -> bool {
    verdict.approved && iteration >= 1
}
