//! Tiered project store - the read/write orchestrator.
//!
//! # Read chain
//!
//! ```text
//! API -> structured store -> simple store -> session store -> placeholder
//! ```
//!
//! Each transition is taken only when the prior tier fails or holds no
//! usable data; the first tier that answers terminates the chain. The
//! placeholder tier is terminal and never fails. The first failure message
//! encountered rides along in the result even when a later tier supplied
//! the data, so the UI can say *why* it is showing cached content.
//!
//! # Write policy
//!
//! Writes go to every durable tier independently, best effort. Any one
//! surviving tier is enough for the next read, which is the availability
//! trade this dashboard wants; cross-tier consistency is explicitly not
//! guaranteed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::DashboardConfig;
use crate::health::HealthCache;
use crate::http::{auth_headers, HttpTransport};
use crate::stats::StatsMonitor;
use crate::storage::KeyValueStore;
use crate::token::TokenStore;

use super::types::{
    dedupe_projects, parse_projects_response, placeholder_projects, validate_projects,
    FetchResult, Project, ProjectError, Source,
};

/// Shared cancellation flag for in-flight tiered reads.
///
/// Once cancelled, the walk stops after the current tier's I/O settles and
/// touches no further shared state.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one tiered read.
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Skip the API tier outright.
    pub force_offline: bool,
    /// Bypass the health cache TTL (the backoff window still applies).
    pub skip_health_cache: bool,
    /// External cancellation signal.
    pub cancel: Option<CancelFlag>,
}

/// Errors that abort the whole tiered resolution.
///
/// Everything else is a per-tier failure and becomes a fallback, not an
/// error.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The API rejected our credentials. Re-authentication is the shell's
    /// concern; falling back to stale data would hide the logout.
    #[error("Authentication required")]
    AuthRequired,

    #[error("Fetch cancelled")]
    Cancelled,
}

enum ApiAttempt {
    Projects(Vec<Project>),
    AuthRequired,
    Cancelled,
    Failed(String),
}

/// Orchestrates project reads and writes across all tiers.
pub struct TieredProjectStore {
    config: Arc<DashboardConfig>,
    transport: Arc<dyn HttpTransport>,
    token: Arc<TokenStore>,
    health: Arc<HealthCache>,
    stats: Arc<StatsMonitor>,
    structured: Arc<dyn KeyValueStore>,
    simple: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl TieredProjectStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<DashboardConfig>,
        transport: Arc<dyn HttpTransport>,
        token: Arc<TokenStore>,
        health: Arc<HealthCache>,
        stats: Arc<StatsMonitor>,
        structured: Arc<dyn KeyValueStore>,
        simple: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            transport,
            token,
            health,
            stats,
            structured,
            simple,
            session,
        }
    }

    /// Resolve the project collection through the tier chain.
    pub fn fetch_projects(&self, options: &FetchOptions) -> Result<FetchResult, FetchError> {
        let mut first_error: Option<String> = None;

        if !options.force_offline && !self.health.in_backoff() {
            let health = self
                .health
                .check_health(&self.config.health_url(), options.skip_health_cache);
            if health.is_usable() {
                self.stats.record_attempt(Source::Api);
                match self.fetch_from_api(options) {
                    ApiAttempt::Projects(projects) if !projects.is_empty() => {
                        // A cancel that raced the request wins: the settled
                        // result is discarded before any state is touched.
                        if cancelled(options) {
                            return Err(FetchError::Cancelled);
                        }
                        let projects = dedupe_projects(projects);
                        self.persist_all(&projects);
                        self.stats.record_success(Source::Api);
                        return Ok(FetchResult {
                            projects,
                            source: Source::Api,
                            error: None,
                        });
                    }
                    ApiAttempt::Projects(_) => {
                        first_error = Some("API returned no projects".to_string());
                    }
                    ApiAttempt::AuthRequired => {
                        self.token.clear_token();
                        return Err(FetchError::AuthRequired);
                    }
                    ApiAttempt::Cancelled => return Err(FetchError::Cancelled),
                    ApiAttempt::Failed(message) => {
                        log::warn!("API project fetch failed: {}", message);
                        first_error = Some(message);
                    }
                }
            } else {
                first_error = Some(format!("API unavailable: {}", health.message));
            }
        } else if !options.force_offline {
            let message = self
                .health
                .cached_status()
                .map(|s| s.message)
                .unwrap_or_else(|| "API in backoff".to_string());
            first_error = Some(format!("API unavailable: {}", message));
        }

        if cancelled(options) {
            return Err(FetchError::Cancelled);
        }

        let mut previous = Source::Api;
        let tiers: [(&Arc<dyn KeyValueStore>, Source); 3] = [
            (&self.structured, Source::Structured),
            (&self.simple, Source::Simple),
            (&self.session, Source::Session),
        ];
        for (store, source) in tiers {
            self.stats
                .record_fallback(format!("{}->{}", previous, source));
            previous = source;

            self.stats.record_attempt(source);
            match self.read_tier(store.as_ref()) {
                Ok(Some(projects)) if !projects.is_empty() => {
                    if cancelled(options) {
                        return Err(FetchError::Cancelled);
                    }
                    self.stats.record_success(source);
                    log::info!("Serving {} projects from {}", projects.len(), source);
                    return Ok(FetchResult {
                        projects: dedupe_projects(projects),
                        source,
                        error: first_error,
                    });
                }
                Ok(_) => {
                    first_error
                        .get_or_insert_with(|| format!("No projects stored in {}", source));
                }
                Err(message) => {
                    log::warn!("Tier {} unreadable: {}", source, message);
                    first_error.get_or_insert(message);
                }
            }

            if cancelled(options) {
                return Err(FetchError::Cancelled);
            }
        }

        self.stats
            .record_fallback(format!("{}->{}", previous, Source::Placeholder));
        self.stats.record_attempt(Source::Placeholder);
        let projects = placeholder_projects(self.config.placeholder_count);
        // Persist so the next load shows the same placeholders instead of
        // regenerating a different-looking set.
        self.persist_all(&projects);
        self.stats.record_success(Source::Placeholder);
        log::info!("All tiers empty, synthesized {} placeholders", projects.len());
        Ok(FetchResult {
            projects,
            source: Source::Placeholder,
            error: first_error,
        })
    }

    /// Authenticated list request with linear-backoff retries.
    fn fetch_from_api(&self, options: &FetchOptions) -> ApiAttempt {
        let url = self.config.projects_url();
        let token = self.token.get_token();
        let headers = auth_headers(token.as_deref());

        let mut last_failure = String::new();
        for attempt in 0..=self.config.fetch_retries {
            if cancelled(options) {
                return ApiAttempt::Cancelled;
            }
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
            }

            match self
                .transport
                .get(&url, &headers, self.config.request_timeout)
            {
                Ok(response) if response.status == 401 => return ApiAttempt::AuthRequired,
                Ok(response) if response.is_success() => {
                    let value: serde_json::Value = match serde_json::from_str(&response.body) {
                        Ok(value) => value,
                        Err(e) => {
                            last_failure = format!("API payload unreadable: {}", e);
                            continue;
                        }
                    };
                    return ApiAttempt::Projects(parse_projects_response(&value));
                }
                Ok(response) => {
                    last_failure = format!("API returned HTTP {}", response.status);
                }
                Err(e) => {
                    last_failure = e.to_string();
                }
            }
        }

        ApiAttempt::Failed(last_failure)
    }

    fn read_tier(&self, store: &dyn KeyValueStore) -> Result<Option<Vec<Project>>, String> {
        let json = match store.get(&self.config.projects_key) {
            Ok(Some(json)) => json,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };
        match serde_json::from_str(&json) {
            Ok(projects) => Ok(Some(projects)),
            Err(e) => Err(format!("Stored projects unreadable: {}", e)),
        }
    }

    /// Validate and write a collection to every durable tier.
    ///
    /// Returns `Ok(true)` when at least one tier accepted the write.
    pub fn persist_projects(&self, projects: &[Project]) -> Result<bool, ProjectError> {
        validate_projects(projects)?;
        Ok(self.persist_all(projects))
    }

    fn persist_all(&self, projects: &[Project]) -> bool {
        let json = match serde_json::to_string(projects) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Project collection unserializable: {}", e);
                return false;
            }
        };

        let tiers: [(&Arc<dyn KeyValueStore>, Source); 3] = [
            (&self.structured, Source::Structured),
            (&self.simple, Source::Simple),
            (&self.session, Source::Session),
        ];
        let mut any = false;
        for (store, source) in tiers {
            match store.set(&self.config.projects_key, &json) {
                Ok(()) => any = true,
                Err(e) => log::warn!("Persist to {} failed: {}", source, e),
            }
        }
        any
    }

    /// Right-biased union keyed by id: incoming wins per field it defines,
    /// unmatched incoming items are appended in order.
    ///
    /// This is not a three-way merge; concurrent edits to the same field in
    /// two tiers resolve as latest-write-wins with no conflict report.
    pub fn merge_projects(base: Vec<Project>, incoming: Vec<Project>) -> Vec<Project> {
        let mut merged = base;
        for item in incoming {
            match merged.iter().position(|p| p.id == item.id) {
                Some(index) => {
                    let existing = &mut merged[index];
                    *existing = merge_fields(existing.clone(), item);
                }
                None => merged.push(item),
            }
        }
        merged
    }

    /// Flip a project's favorite flag and persist the new collection.
    pub fn toggle_favorite(
        &self,
        id: &str,
        projects: &[Project],
    ) -> Result<Vec<Project>, ProjectError> {
        let mut updated = projects.to_vec();
        let project = updated
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))?;
        project.favorite = !project.favorite;
        project.updated_at = Some(chrono::Utc::now());

        self.persist_all(&updated);
        Ok(updated)
    }

    /// Remove a project and persist the new collection.
    ///
    /// Placeholder projects are not real persisted state; deleting one is a
    /// caller bug and gets a domain error instead of a silent no-op.
    pub fn delete_project(
        &self,
        id: &str,
        projects: &[Project],
    ) -> Result<Vec<Project>, ProjectError> {
        let project = projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))?;
        if project.is_placeholder() {
            return Err(ProjectError::PlaceholderDelete(id.to_string()));
        }

        let updated: Vec<Project> = projects.iter().filter(|p| p.id != id).cloned().collect();
        self.persist_all(&updated);
        Ok(updated)
    }
}

fn cancelled(options: &FetchOptions) -> bool {
    options
        .cancel
        .as_ref()
        .map(|c| c.is_cancelled())
        .unwrap_or(false)
}

/// Shallow per-field merge, incoming wins for every field it defines.
///
/// With a typed schema, "defines" means `Some` for optional fields and
/// non-empty for `tags`; `name`, `favorite`, and `placeholder` are always
/// defined by the incoming record.
fn merge_fields(base: Project, incoming: Project) -> Project {
    Project {
        id: base.id,
        name: incoming.name,
        description: incoming.description.or(base.description),
        language: incoming.language.or(base.language),
        tags: if incoming.tags.is_empty() {
            base.tags
        } else {
            incoming.tags
        },
        favorite: incoming.favorite,
        path: incoming.path.or(base.path),
        created_at: incoming.created_at.or(base.created_at),
        updated_at: incoming.updated_at.or(base.updated_at),
        files: incoming.files.or(base.files),
        settings: incoming.settings.or(base.settings),
        metadata: incoming.metadata.or(base.metadata),
        placeholder: incoming.placeholder,
    }
}
