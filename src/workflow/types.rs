//! Data model shared by the workflow stages and the run controller.

use crate::errors::InputError;
use crate::workflow::ProducerRole;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The source artifact of a run and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    source: String,
    output_dir: PathBuf,
}

impl WorkflowInput {
    /// Validate and build the input.
    ///
    /// URIs (`scheme://...`) are passed through; anything else is treated as a
    /// local path and must name an existing file.
    pub fn new(source: &str, output_dir: impl Into<PathBuf>) -> Result<Self, InputError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(InputError::EmptySource);
        }
        if !source.contains("://") && !Path::new(source).is_file() {
            return Err(InputError::SourceNotFound(PathBuf::from(source)));
        }

        let output_dir = output_dir.into();
        if output_dir.as_os_str().is_empty() {
            return Err(InputError::EmptyOutputDir);
        }
        if output_dir.exists() && !output_dir.is_dir() {
            return Err(InputError::OutputNotDirectory(output_dir));
        }

        Ok(Self {
            source: source.to_string(),
            output_dir,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File stem of the source, used as a last-resort title.
    pub fn source_stem(&self) -> Option<String> {
        let tail = self.source.rsplit(['/', '\\']).next()?;
        let stem = Path::new(tail).file_stem()?.to_string_lossy().trim().to_string();
        (!stem.is_empty()).then_some(stem)
    }
}

/// Output of the parse stage. Opaque to the controller beyond its title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, alias = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<ParsedSection>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSection {
    pub heading: String,
    #[serde(default)]
    pub body: String,
}

/// Narrative draft from the blog generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub caption: String,
}

/// Figure metadata from the figure extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureSet {
    #[serde(default)]
    pub figures: Vec<Figure>,
}

/// Cover image reference from the cover designer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverArt {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// Output of one producer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "output", rename_all = "kebab-case")]
pub enum ProducerOutput {
    #[serde(rename = "blog-generator")]
    Draft(BlogDraft),
    #[serde(rename = "figure-extractor")]
    Assets(FigureSet),
    #[serde(rename = "cover-designer")]
    Cover(CoverArt),
}

impl ProducerOutput {
    pub fn role(&self) -> ProducerRole {
        match self {
            Self::Draft(_) => ProducerRole::BlogGenerator,
            Self::Assets(_) => ProducerRole::FigureExtractor,
            Self::Cover(_) => ProducerRole::CoverDesigner,
        }
    }
}

/// Latest output per producer role. An empty slot means "not produced".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<BlogDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<FigureSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverArt>,
}

impl ProducerSlots {
    /// Replace the slot owned by `output`'s role.
    pub fn set(&mut self, output: ProducerOutput) {
        match output {
            ProducerOutput::Draft(d) => self.draft = Some(d),
            ProducerOutput::Assets(a) => self.assets = Some(a),
            ProducerOutput::Cover(c) => self.cover = Some(c),
        }
    }

    /// Overlay the filled slots of `update`; empty slots in `update` never
    /// clear a value here.
    pub fn merge(&mut self, update: ProducerSlots) {
        if let Some(d) = update.draft {
            self.draft = Some(d);
        }
        if let Some(a) = update.assets {
            self.assets = Some(a);
        }
        if let Some(c) = update.cover {
            self.cover = Some(c);
        }
    }

    pub fn has(&self, role: ProducerRole) -> bool {
        match role {
            ProducerRole::BlogGenerator => self.draft.is_some(),
            ProducerRole::FigureExtractor => self.assets.is_some(),
            ProducerRole::CoverDesigner => self.cover.is_some(),
        }
    }

    /// Roles with no output yet, in canonical order.
    pub fn missing(&self) -> Vec<ProducerRole> {
        ProducerRole::ALL
            .into_iter()
            .filter(|r| !self.has(*r))
            .collect()
    }

    /// Roles with output, in canonical order.
    pub fn filled(&self) -> Vec<ProducerRole> {
        ProducerRole::ALL
            .into_iter()
            .filter(|r| self.has(*r))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.filled().is_empty()
    }
}

/// The integrated result of one iteration. Never mutated after integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateArtifact {
    pub iteration: u32,
    pub title: String,
    pub content: String,
    pub sources: ProducerSlots,
}

/// One directive from the reviewer to a producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    #[serde(alias = "to", alias = "targetRole")]
    pub target_role: ProducerRole,
    pub action: String,
}

impl FeedbackItem {
    pub fn new(target_role: ProducerRole, action: &str) -> Self {
        Self {
            target_role,
            action: action.to_string(),
        }
    }
}

/// The reviewer's decision on a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
    #[serde(default)]
    pub summary: String,
}

impl ReviewVerdict {
    pub fn approve(summary: &str) -> Self {
        Self {
            approved: true,
            feedback: Vec::new(),
            summary: summary.to_string(),
        }
    }

    pub fn reject(summary: &str, feedback: Vec<FeedbackItem>) -> Self {
        Self {
            approved: false,
            feedback,
            summary: summary.to_string(),
        }
    }
}
