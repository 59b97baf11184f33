//! DashboardContext - the central shared state for the persistence core.
//!
//! The UI shell builds one context at startup and passes it to every call
//! site. Centralizing state here means:
//!
//! 1. No hidden module-level globals; tests build fresh contexts
//! 2. Every collaborator (transport, tiers, signal) is injectable
//! 3. Shells stay thin wrappers that just forward calls
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │     DashboardContext     │
//!                  ├──────────────────────────┤
//!                  │  - TokenStore            │
//!                  │  - HealthCache           │
//!                  │  - TieredProjectStore    │
//!                  │  - PrefsStore            │
//!                  │  - StatsMonitor          │
//!                  └────────────┬─────────────┘
//!                               │
//!                ┌──────────────┼──────────────┐
//!                ▼              ▼              ▼
//!         ┌────────────┐ ┌────────────┐ ┌────────────┐
//!         │ Desktop UI │ │ Web client │ │ Diagnostics│
//!         └────────────┘ └────────────┘ └────────────┘
//! ```

use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::connectivity::OnlineSignal;
use crate::health::HealthCache;
use crate::http::{HttpTransport, UreqTransport};
use crate::prefs::PrefsStore;
use crate::projects::TieredProjectStore;
use crate::stats::StatsMonitor;
use crate::storage::{KeyValueStore, SessionStore, SimpleStore, StructuredStore};
use crate::token::TokenStore;

/// Configuration for building a DashboardContext.
#[derive(Default)]
pub struct DashboardContextBuilder {
    config: Option<DashboardConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    structured: Option<Arc<dyn KeyValueStore>>,
    simple: Option<Arc<dyn KeyValueStore>>,
    session: Option<Arc<dyn KeyValueStore>>,
    signal: Option<Arc<OnlineSignal>>,
}

impl DashboardContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom configuration instead of `DashboardConfig::from_env()`.
    pub fn config(mut self, config: DashboardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing transport (for testing or custom configurations).
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an existing structured tier (for testing or custom configurations).
    pub fn structured_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.structured = Some(store);
        self
    }

    /// Use an existing simple tier (for testing or custom configurations).
    pub fn simple_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.simple = Some(store);
        self
    }

    /// Use an existing transient tier (for testing or custom configurations).
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session = Some(store);
        self
    }

    /// Use an existing online signal (for testing or shells that share one).
    pub fn online_signal(mut self, signal: Arc<OnlineSignal>) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Build the DashboardContext, wiring defaults for anything unset.
    pub fn build(self) -> DashboardContext {
        let config = Arc::new(self.config.unwrap_or_else(DashboardConfig::from_env));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(UreqTransport::new()));
        let structured = self.structured.unwrap_or_else(|| {
            Arc::new(StructuredStore::new(config.data_dir.join("collections")))
        });
        let simple = self
            .simple
            .unwrap_or_else(|| Arc::new(SimpleStore::new(config.data_dir.join("store.json"))));
        let session: Arc<dyn KeyValueStore> = self
            .session
            .unwrap_or_else(|| Arc::new(SessionStore::new()));
        let signal = self.signal.unwrap_or_else(|| Arc::new(OnlineSignal::new()));

        let token = Arc::new(TokenStore::new(
            &config,
            Arc::clone(&simple),
            Arc::clone(&session),
            Arc::clone(&structured),
        ));
        let stats = Arc::new(StatsMonitor::new());
        let health = Arc::new(HealthCache::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&signal),
            Arc::clone(&token),
            Arc::clone(&simple),
        ));
        let projects = Arc::new(TieredProjectStore::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&token),
            Arc::clone(&health),
            Arc::clone(&stats),
            Arc::clone(&structured),
            Arc::clone(&simple),
            Arc::clone(&session),
        ));
        let prefs = Arc::new(PrefsStore::new(
            &config,
            Arc::clone(&structured),
            Arc::clone(&simple),
            Arc::clone(&session),
        ));

        DashboardContext {
            config,
            signal,
            token,
            health,
            stats,
            projects,
            prefs,
        }
    }
}

/// Central shared state for the persistence core.
///
/// All fields use `Arc` for cheap cloning - cloning the context just
/// clones the pointers, not the underlying data.
#[derive(Clone)]
pub struct DashboardContext {
    /// Startup configuration, read once.
    pub config: Arc<DashboardConfig>,
    /// Fast online/offline signal, updated by the shell.
    pub signal: Arc<OnlineSignal>,
    /// Auth token store.
    pub token: Arc<TokenStore>,
    /// Backoff-aware API health cache.
    pub health: Arc<HealthCache>,
    /// Persistence statistics monitor.
    pub stats: Arc<StatsMonitor>,
    /// The tiered project store.
    pub projects: Arc<TieredProjectStore>,
    /// Dashboard preferences store.
    pub prefs: Arc<PrefsStore>,
}

impl DashboardContext {
    /// Create a new DashboardContext with a builder.
    pub fn builder() -> DashboardContextBuilder {
        DashboardContextBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context_for(dir: &std::path::Path) -> DashboardContext {
        DashboardContext::builder()
            .config(DashboardConfig {
                data_dir: dir.to_path_buf(),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn builder_wires_config() {
        let dir = tempdir().unwrap();
        let ctx = context_for(dir.path());
        assert_eq!(ctx.config.data_dir, dir.path());
    }

    #[test]
    fn context_is_cheaply_clonable() {
        let dir = tempdir().unwrap();
        let ctx = context_for(dir.path());
        let ctx2 = ctx.clone();

        // Both share the same statistics monitor.
        ctx.stats.record_fallback("API->IndexedDB");
        assert_eq!(ctx2.stats.snapshot().fallbacks_used, 1);
    }

    #[test]
    fn builder_uses_provided_signal() {
        let dir = tempdir().unwrap();
        let signal = Arc::new(OnlineSignal::new());
        let ctx = DashboardContext::builder()
            .config(DashboardConfig {
                data_dir: dir.path().to_path_buf(),
                ..Default::default()
            })
            .online_signal(Arc::clone(&signal))
            .build();

        signal.set_online(false);
        assert_eq!(ctx.signal.get(), Some(false));
        assert!(Arc::ptr_eq(&ctx.signal, &signal));
    }

    #[test]
    fn default_tiers_share_one_data_dir() {
        let dir = tempdir().unwrap();
        let ctx = context_for(dir.path());

        // A preference save lands in both file-backed tiers.
        let prefs = crate::prefs::DashboardPrefs::default();
        assert!(ctx.prefs.save(&prefs));
        assert!(dir.path().join("collections").join("dashboard_prefs.json").exists());
        assert!(dir.path().join("store.json").exists());
    }
}
