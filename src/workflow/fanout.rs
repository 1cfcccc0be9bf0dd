//! Parallel fan-out of independent producer stages.
//!
//! Every request is spawned onto its own task before any result is awaited.
//! The batch always joins all siblings; if any failed, the whole batch fails
//! and the completed roles are reported next to the failures.

use crate::errors::{FanOutFailure, StageError};
use crate::workflow::{ProducerOutput, ProducerRole, ProducerSlots, StageDispatch, StageRequest};
use futures::future::join_all;
use tracing::warn;

/// Run all producer requests concurrently and collect their outputs by role.
pub async fn run_all(
    dispatch: &StageDispatch,
    requests: Vec<(ProducerRole, StageRequest)>,
) -> Result<ProducerSlots, FanOutFailure> {
    let handles: Vec<_> = requests
        .into_iter()
        .map(|(role, request)| {
            let dispatch = dispatch.clone();
            let handle =
                tokio::spawn(async move { dispatch.call_producer(role, request).await });
            (role, handle)
        })
        .collect();

    let (roles, handles): (Vec<ProducerRole>, Vec<_>) = handles.into_iter().unzip();
    let joined = join_all(handles).await;

    let mut outcomes: Vec<(ProducerRole, Result<ProducerOutput, StageError>)> = roles
        .into_iter()
        .zip(joined)
        .map(|(role, joined)| {
            let result = joined.unwrap_or_else(|e| {
                Err(StageError::new(role, format!("stage task aborted: {}", e)))
            });
            (role, result)
        })
        .collect();
    outcomes.sort_by_key(|(role, _)| *role);

    let mut slots = ProducerSlots::default();
    let mut failures = Vec::new();
    for (_, result) in outcomes {
        match result {
            Ok(output) => slots.set(output),
            Err(e) => failures.push(e),
        }
    }

    if failures.is_empty() {
        return Ok(slots);
    }

    let completed = slots.filled();
    for failure in &failures {
        warn!(role = %failure.role, cause = %failure.cause, "producer failed during fan-out");
    }
    if !completed.is_empty() {
        warn!(completed = ?completed, "discarding completed producers of a failed fan-out");
    }
    Err(FanOutFailure {
        failures,
        completed,
    })
}
