//! Prompt builders, one per stage request.
//!
//! Every prompt starts with `# Stage: <role>` so a single agent command can
//! dispatch on it.

use crate::workflow::{CandidateArtifact, ParsedContent, StageRequest};

const JSON_ONLY: &str =
    "Respond with a single JSON object and nothing else. No code fences, no commentary.";

/// Build the agent prompt for `request`.
pub fn build(request: &StageRequest) -> String {
    let header = format!("# Stage: {}\n\n", request.role());
    let body = match request {
        StageRequest::Parse { source } => parse_prompt(source),
        StageRequest::GenerateDraft { parsed, action } => draft_prompt(parsed, action.as_deref()),
        StageRequest::ExtractAssets { source, action } => assets_prompt(source, action.as_deref()),
        StageRequest::DesignCover { title, action } => {
            cover_prompt(title.as_deref(), action.as_deref())
        }
        StageRequest::Review {
            candidate,
            iteration,
        } => review_prompt(candidate, *iteration),
    };
    header + &body
}

fn parse_prompt(source: &str) -> String {
    format!(
        r#"Read the research paper at `{source}` and extract its structure.

{JSON_ONLY}
Schema:
{{"title": "...", "authors": ["..."], "abstract": "...", "sections": [{{"heading": "...", "body": "..."}}], "metadata": {{}}}}
"#
    )
}

fn draft_prompt(parsed: &ParsedContent, action: Option<&str>) -> String {
    let paper = serde_json::to_string_pretty(parsed).unwrap_or_default();
    format!(
        r#"Write a technical blog post in Markdown explaining this paper to engineers.
Do not include the title heading or figures; they are added separately.

## Paper
```json
{paper}
```
{rework}
{JSON_ONLY}
Schema:
{{"title": "...", "markdown": "..."}}
"#,
        rework = rework_section(action),
    )
}

fn assets_prompt(source: &str, action: Option<&str>) -> String {
    format!(
        r#"Extract the key figures from the paper at `{source}`. Save each as an image file
and report its path relative to the output directory with a one-line caption.
{rework}
{JSON_ONLY}
Schema:
{{"figures": [{{"id": "fig1", "path": "figures/fig1.png", "caption": "..."}}]}}
"#,
        rework = rework_section(action),
    )
}

fn cover_prompt(title: Option<&str>, action: Option<&str>) -> String {
    let subject = title.unwrap_or("(untitled paper)");
    format!(
        r#"Design a cover image for a blog post about "{subject}". Save it as an image
file and report its path.
{rework}
{JSON_ONLY}
Schema:
{{"path": "cover.png", "alt_text": "..."}}
"#,
        rework = rework_section(action),
    )
}

fn review_prompt(candidate: &CandidateArtifact, iteration: u32) -> String {
    format!(
        r#"Review iteration {iteration} of the blog post below. Approve it if it is ready to
publish. Otherwise reject it and give each producer that must change one
concrete action. Valid roles: blog-generator, figure-extractor, cover-designer.

## Candidate: {title}
````markdown
{content}
````

{JSON_ONLY}
Schema:
{{"approved": false, "summary": "...", "feedback": [{{"target_role": "blog-generator", "action": "..."}}]}}
"#,
        title = candidate.title,
        content = candidate.content,
    )
}

fn rework_section(action: Option<&str>) -> String {
    match action {
        Some(action) => format!(
            "\n## Reviewer feedback\nThis is a revision. Apply this change:\n{}\n",
            action
        ),
        None => String::new(),
    }
}
