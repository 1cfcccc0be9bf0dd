//! Stage role identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every external stage the workflow can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Parser,
    BlogGenerator,
    FigureExtractor,
    CoverDesigner,
    #[serde(alias = "master")]
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parser => "parser",
            Self::BlogGenerator => "blog-generator",
            Self::FigureExtractor => "figure-extractor",
            Self::CoverDesigner => "cover-designer",
            Self::Reviewer => "reviewer",
        }
    }

    /// The producer role, if this is one of the three parallel producers.
    pub fn as_producer(&self) -> Option<ProducerRole> {
        match self {
            Self::BlogGenerator => Some(ProducerRole::BlogGenerator),
            Self::FigureExtractor => Some(ProducerRole::FigureExtractor),
            Self::CoverDesigner => Some(ProducerRole::CoverDesigner),
            Self::Parser | Self::Reviewer => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parser" => Ok(Self::Parser),
            "blog-generator" => Ok(Self::BlogGenerator),
            "figure-extractor" => Ok(Self::FigureExtractor),
            "cover-designer" => Ok(Self::CoverDesigner),
            "reviewer" | "master" => Ok(Self::Reviewer),
            _ => anyhow::bail!(
                "Unknown role '{}'. Valid values: parser, blog-generator, figure-extractor, cover-designer, reviewer",
                s
            ),
        }
    }
}

/// The content-producing roles run in parallel each iteration and targeted by
/// review feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProducerRole {
    BlogGenerator,
    FigureExtractor,
    CoverDesigner,
}

impl ProducerRole {
    /// Canonical order: draft, assets, cover.
    pub const ALL: [ProducerRole; 3] = [
        ProducerRole::BlogGenerator,
        ProducerRole::FigureExtractor,
        ProducerRole::CoverDesigner,
    ];

    pub fn as_str(&self) -> &'static str {
        Role::from(*self).as_str()
    }
}

impl From<ProducerRole> for Role {
    fn from(role: ProducerRole) -> Self {
        match role {
            ProducerRole::BlogGenerator => Role::BlogGenerator,
            ProducerRole::FigureExtractor => Role::FigureExtractor,
            ProducerRole::CoverDesigner => Role::CoverDesigner,
        }
    }
}

impl fmt::Display for ProducerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProducerRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role: Role = s.parse()?;
        role.as_producer()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a producer role", s))
    }
}
