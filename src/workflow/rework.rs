//! Targeted rework: re-run only the producers named by review feedback.

use crate::errors::StageError;
use crate::workflow::{
    FeedbackItem, ParsedContent, ProducerRole, ProducerSlots, StageDispatch, StageRequest,
    WorkflowInput,
};
use tracing::info;

pub struct ReworkRouter<'a> {
    dispatch: &'a StageDispatch,
    input: &'a WorkflowInput,
}

impl<'a> ReworkRouter<'a> {
    pub fn new(dispatch: &'a StageDispatch, input: &'a WorkflowInput) -> Self {
        Self { dispatch, input }
    }

    /// Re-invoke each targeted producer with its feedback directive.
    ///
    /// Items run one at a time in feedback order; a role named twice runs
    /// twice and the later output wins. The returned slots hold only the
    /// reworked roles. The first failure aborts the pass.
    pub async fn route(
        &self,
        feedback: &[FeedbackItem],
        parsed: &ParsedContent,
    ) -> Result<ProducerSlots, StageError> {
        let mut reworked = ProducerSlots::default();

        for item in feedback {
            info!(role = %item.target_role, action = %item.action, "reworking");
            let request = StageRequest::for_producer(
                item.target_role,
                self.input,
                parsed,
                Some(&item.action),
            );
            let output = self
                .dispatch
                .call_producer(item.target_role, request)
                .await?;
            reworked.set(output);
        }

        Ok(reworked)
    }
}

/// Distinct feedback targets in first-mention order.
pub fn targets(feedback: &[FeedbackItem]) -> Vec<ProducerRole> {
    let mut roles = Vec::new();
    for item in feedback {
        if !roles.contains(&item.target_role) {
            roles.push(item.target_role);
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::ScriptedInvoker;
    use crate::workflow::Role;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_route_only_touches_targeted_roles() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let dispatch = StageDispatch::new(invoker.clone());
        let (input, _dir) = ScriptedInvoker::input();
        let feedback = vec![FeedbackItem::new(ProducerRole::CoverDesigner, "use blue")];

        let reworked = ReworkRouter::new(&dispatch, &input)
            .route(&feedback, &ParsedContent::default())
            .await
            .unwrap();

        assert_eq!(reworked.filled(), vec![ProducerRole::CoverDesigner]);
        assert_eq!(invoker.calls_for(Role::BlogGenerator), 0);
        assert_eq!(invoker.calls_for(Role::FigureExtractor), 0);
        let requests = invoker.requests_for(Role::CoverDesigner);
        assert_eq!(requests[0].action(), Some("use blue"));
    }

    #[tokio::test]
    async fn test_route_last_write_wins_for_repeated_role() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let dispatch = StageDispatch::new(invoker.clone());
        let (input, _dir) = ScriptedInvoker::input();
        let feedback = vec![
            FeedbackItem::new(ProducerRole::CoverDesigner, "first"),
            FeedbackItem::new(ProducerRole::BlogGenerator, "tighten intro"),
            FeedbackItem::new(ProducerRole::CoverDesigner, "second"),
        ];

        let reworked = ReworkRouter::new(&dispatch, &input)
            .route(&feedback, &ParsedContent::default())
            .await
            .unwrap();

        assert_eq!(
            reworked.cover.unwrap().path,
            PathBuf::from("cover_v2.png")
        );
        let actions: Vec<_> = invoker
            .requests_for(Role::CoverDesigner)
            .iter()
            .map(|r| r.action().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["first", "second"]);
        assert!(reworked.assets.is_none());
    }

    #[tokio::test]
    async fn test_route_stops_at_first_failure() {
        let invoker = Arc::new(ScriptedInvoker::new().fail(Role::BlogGenerator, "quota"));
        let dispatch = StageDispatch::new(invoker.clone());
        let (input, _dir) = ScriptedInvoker::input();
        let feedback = vec![
            FeedbackItem::new(ProducerRole::BlogGenerator, "rewrite"),
            FeedbackItem::new(ProducerRole::CoverDesigner, "redo"),
        ];

        let err = ReworkRouter::new(&dispatch, &input)
            .route(&feedback, &ParsedContent::default())
            .await
            .unwrap_err();

        assert_eq!(err.role, Role::BlogGenerator);
        assert_eq!(invoker.calls_for(Role::CoverDesigner), 0);
    }

    #[tokio::test]
    async fn test_route_empty_feedback_is_noop() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let dispatch = StageDispatch::new(invoker.clone());
        let (input, _dir) = ScriptedInvoker::input();

        let reworked = ReworkRouter::new(&dispatch, &input)
            .route(&[], &ParsedContent::default())
            .await
            .unwrap();

        assert!(reworked.is_empty());
        assert_eq!(invoker.total_calls(), 0);
    }

    #[test]
    fn test_targets_dedupes_in_order() {
        let feedback = vec![
            FeedbackItem::new(ProducerRole::CoverDesigner, "a"),
            FeedbackItem::new(ProducerRole::BlogGenerator, "b"),
            FeedbackItem::new(ProducerRole::CoverDesigner, "c"),
        ];
        assert_eq!(
            targets(&feedback),
            vec![ProducerRole::CoverDesigner, ProducerRole::BlogGenerator]
        );
    }
}
