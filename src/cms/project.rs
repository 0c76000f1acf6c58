use serde::{Deserialize, Serialize};
use strum::Display;

/// Which list a project belongs to on the website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectType {
    Current,
    Upcoming,
}

/// CMS identifiers may be numeric or textual depending on the collection setup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectId {
    Number(u64),
    Text(String),
}

/// A project as stored in the CMS, plus the GitHub-derived `stars` and `tags`.
///
/// Timestamps are passed through exactly as the CMS formats them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub github_repository_link: Option<String>,
    #[serde(default)]
    pub documentation_link: Option<String>,
    pub project_type: ProjectType,
    pub status: String,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}
