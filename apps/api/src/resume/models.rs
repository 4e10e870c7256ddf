use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Starting point for the markdown variant: the section skeleton the editor shows.
pub const MARKDOWN_TEMPLATE: &str = "# Resume Snapshot

## Summary

-

## Experience

-

## Education

-

## Projects

-

## Skills

- ";

/// Which document schema this deployment uses. Never mixed within one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    #[default]
    Markdown,
    Structured,
}

#[derive(Debug, Error)]
#[error("unknown document mode '{0}'")]
pub struct UnknownDocumentMode(String);

impl FromStr for DocumentMode {
    type Err = UnknownDocumentMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" => Ok(DocumentMode::Markdown),
            "structured" => Ok(DocumentMode::Structured),
            other => Err(UnknownDocumentMode(other.to_string())),
        }
    }
}

/// The canonical shared resume. Serialises as the agent-state object the UI binds to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResumeDocument {
    Markdown(MarkdownResume),
    Structured(StructuredResume),
}

impl ResumeDocument {
    pub fn initial(mode: DocumentMode) -> Self {
        match mode {
            DocumentMode::Markdown => ResumeDocument::Markdown(MarkdownResume {
                markdown_resume: MARKDOWN_TEMPLATE.to_string(),
            }),
            DocumentMode::Structured => ResumeDocument::Structured(StructuredResume::default()),
        }
    }

    pub fn mode(&self) -> DocumentMode {
        match self {
            ResumeDocument::Markdown(_) => DocumentMode::Markdown,
            ResumeDocument::Structured(_) => DocumentMode::Structured,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownResume {
    pub markdown_resume: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResume {
    #[serde(default)]
    pub basics: Basics,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Contact header. Shallow-merged field by field on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Basics {
    /// Fields present in `update` win; absent ones keep their current value.
    pub fn merge_from(&mut self, update: Basics) {
        let Basics {
            name,
            headline,
            email,
            phone,
            location,
            website,
        } = update;
        for (slot, value) in [
            (&mut self.name, name),
            (&mut self.headline, headline),
            (&mut self.email, email),
            (&mut self.phone, phone),
            (&mut self.location, location),
            (&mut self.website, website),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub company: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// A partial structured update as proposed by the agent. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredUpdate {
    #[serde(default)]
    pub basics: Option<Basics>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub experience: Option<Vec<ExperienceEntry>>,
    #[serde(default)]
    pub education: Option<Vec<EducationEntry>>,
    #[serde(default)]
    pub projects: Option<Vec<ProjectEntry>>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
}
