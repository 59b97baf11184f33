//! Project data types and payload parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Id prefix used for synthesized placeholder projects.
pub const PLACEHOLDER_ID_PREFIX: &str = "placeholder-";

/// A dashboard project.
///
/// The persistence core only inspects `id` and `name`; everything else is
/// carried through unchanged so the backend can evolve its payload without
/// touching this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier within a collection.
    pub id: String,

    /// User-visible name; must be non-empty after trimming.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// File tree payload, opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    /// True for synthesized placeholder records; such projects are never
    /// real persisted state and cannot be deleted.
    #[serde(default)]
    pub placeholder: bool,
}

impl Project {
    /// Minimal constructor used by callers creating projects locally.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            language: None,
            tags: Vec::new(),
            favorite: false,
            path: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            files: None,
            settings: None,
            metadata: None,
            placeholder: false,
        }
    }

    /// Construct a project with a freshly generated id.
    pub fn with_generated_id(name: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name)
    }

    /// True when this record is (or claims the id of) a synthesized
    /// placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder || self.id.starts_with(PLACEHOLDER_ID_PREFIX)
    }
}

/// The tier that produced a result, in fixed precedence order.
///
/// Serialized tags match what the UI keys its banners on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    #[serde(rename = "API")]
    Api,
    #[serde(rename = "IndexedDB")]
    Structured,
    #[serde(rename = "localStorage")]
    Simple,
    #[serde(rename = "sessionStorage")]
    Session,
    #[serde(rename = "placeholder")]
    Placeholder,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Api => "API",
            Source::Structured => "IndexedDB",
            Source::Simple => "localStorage",
            Source::Session => "sessionStorage",
            Source::Placeholder => "placeholder",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tiered read hands back to the caller.
///
/// `error` carries the first user-facing failure reason even when a later
/// tier eventually supplied the data, so the UI can explain why it is
/// showing cached content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub projects: Vec<Project>,
    pub source: Source,
    pub error: Option<String>,
}

/// Error type for project collection operations.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Cannot delete placeholder project: {0}")]
    PlaceholderDelete(String),

    #[error("Invalid project: {0}")]
    Invalid(String),
}

/// Parse a project list payload.
///
/// The backend has shipped two shapes over time: a wrapped object
/// `{"projects": [...]}` and a bare array. Both are accepted here and
/// nowhere else; anything different yields an empty collection.
pub fn parse_projects_response(value: &serde_json::Value) -> Vec<Project> {
    let items = match value.get("projects") {
        Some(serde_json::Value::Array(items)) => items,
        _ => match value {
            serde_json::Value::Array(items) => items,
            _ => return Vec::new(),
        },
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(project) => Some(project),
            Err(e) => {
                log::warn!("Skipping malformed project in API payload: {}", e);
                None
            }
        })
        .collect()
}

/// Drop duplicate ids, keeping the first occurrence of each.
pub fn dedupe_projects(projects: Vec<Project>) -> Vec<Project> {
    let mut seen = HashSet::new();
    projects
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

/// Reject records a write must never accept: empty id, or a name that is
/// empty after trimming.
pub fn validate_projects(projects: &[Project]) -> Result<(), ProjectError> {
    for project in projects {
        if project.id.is_empty() {
            return Err(ProjectError::Invalid("missing project id".to_string()));
        }
        if project.name.trim().is_empty() {
            return Err(ProjectError::Invalid(format!(
                "project {} has an empty name",
                project.id
            )));
        }
    }
    Ok(())
}

/// Synthesize the terminal-tier placeholder collection.
pub fn placeholder_projects(count: usize) -> Vec<Project> {
    (1..=count)
        .map(|n| {
            let mut project = Project::new(
                format!("{}{}", PLACEHOLDER_ID_PREFIX, n),
                format!("Sample Project {}", n),
            );
            project.description = Some(
                "Generated while no saved projects were reachable. \
                 Changes to this project will not be saved."
                    .to_string(),
            );
            project.placeholder = true;
            project
        })
        .collect()
}
