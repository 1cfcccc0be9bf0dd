//! Integration of the producer outputs into one candidate artifact.

use crate::workflow::{CandidateArtifact, ParsedContent, ProducerSlots, WorkflowInput};
use std::fmt::Write;

/// Title used when neither the draft, the parser nor the source name one.
pub const FALLBACK_TITLE: &str = "untitled";

/// Combine the current producer outputs into the candidate for `iteration`.
///
/// Pure function of its inputs. Empty slots are skipped rather than rejected.
pub fn integrate(
    input: &WorkflowInput,
    parsed: &ParsedContent,
    slots: &ProducerSlots,
    iteration: u32,
) -> CandidateArtifact {
    let title = canonical_title(input, parsed, slots);
    let mut content = String::new();

    if let Some(cover) = &slots.cover {
        let alt = cover.alt_text.as_deref().unwrap_or(&title);
        let _ = writeln!(content, "![{}]({})\n", alt, cover.path.display());
    }

    let _ = writeln!(content, "# {}\n", title);

    if let Some(draft) = &slots.draft {
        let body = draft.markdown.trim();
        if !body.is_empty() {
            let _ = writeln!(content, "{}\n", body);
        }
    }

    if let Some(assets) = &slots.assets
        && !assets.figures.is_empty()
    {
        content.push_str("## Figures\n\n");
        for figure in &assets.figures {
            let _ = writeln!(content, "![{}]({})", figure.caption, figure.path.display());
            let _ = writeln!(content, "*{}: {}*\n", figure.id, figure.caption);
        }
    }

    CandidateArtifact {
        iteration,
        title,
        content: content.trim_end().to_string() + "\n",
        sources: slots.clone(),
    }
}

/// Deterministic artifact title: draft title, then parsed title, then the
/// source file stem, then [`FALLBACK_TITLE`].
pub fn canonical_title(input: &WorkflowInput, parsed: &ParsedContent, slots: &ProducerSlots) -> String {
    slots
        .draft
        .as_ref()
        .map(|d| d.title.as_str())
        .and_then(normalize)
        .or_else(|| parsed.title.as_deref().and_then(normalize))
        .or_else(|| input.source_stem().as_deref().and_then(normalize))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

fn normalize(title: &str) -> Option<String> {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}
