//! Project collection persistence across tiers.
//!
//! - [`types`] - the `Project` record, payload parsing, dedupe, placeholders
//! - [`store`] - the tiered read/write orchestrator

pub mod store;
pub mod types;

pub use store::{CancelFlag, FetchError, FetchOptions, TieredProjectStore};
pub use types::{
    dedupe_projects, parse_projects_response, placeholder_projects, validate_projects,
    FetchResult, Project, ProjectError, Source, PLACEHOLDER_ID_PREFIX,
};
