//! Turn raw agent output into typed stage responses.

use crate::util::json_object_candidates;
use crate::workflow::{
    BlogDraft, CoverArt, FeedbackItem, FigureSet, ParsedContent, ProducerOutput, ProducerRole,
    ReviewVerdict, Role, StageResponse,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Parse `output` as the response of a `role` stage.
pub fn parse_response(role: Role, output: &str) -> Result<StageResponse> {
    let response = match role {
        Role::Parser => StageResponse::Parsed(parse_json::<ParsedContent>(output)?),
        Role::BlogGenerator => {
            StageResponse::Produced(ProducerOutput::Draft(parse_json::<BlogDraft>(output)?))
        }
        Role::FigureExtractor => {
            StageResponse::Produced(ProducerOutput::Assets(parse_json::<FigureSet>(output)?))
        }
        Role::CoverDesigner => {
            StageResponse::Produced(ProducerOutput::Cover(parse_json::<CoverArt>(output)?))
        }
        Role::Reviewer => StageResponse::Verdict(parse_verdict(output)?),
    };
    Ok(response)
}

/// The first JSON object in `output` that deserializes as `T`.
fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T> {
    let mut last_err = None;
    for json in json_object_candidates(output) {
        match serde_json::from_str(json) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e).context("Agent output does not match the expected schema"),
        None => anyhow::bail!("No JSON object in agent output"),
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    approved: bool,
    #[serde(default)]
    feedback: Vec<RawFeedback>,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct RawFeedback {
    #[serde(alias = "to", alias = "targetRole")]
    target_role: String,
    #[serde(default)]
    action: String,
}

/// Parse a review verdict. Feedback aimed at anything other than a producer
/// is dropped with a warning.
pub fn parse_verdict(output: &str) -> Result<ReviewVerdict> {
    let raw: RawVerdict = parse_json(output)?;

    let feedback = raw
        .feedback
        .into_iter()
        .filter_map(|item| match item.target_role.parse::<ProducerRole>() {
            Ok(role) => Some(FeedbackItem {
                target_role: role,
                action: item.action,
            }),
            Err(_) => {
                warn!(target_role = %item.target_role, "dropping feedback for unknown role");
                None
            }
        })
        .collect();

    Ok(ReviewVerdict {
        approved: raw.approved,
        feedback,
        summary: raw.summary,
    })
}
