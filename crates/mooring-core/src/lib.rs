//! # mooring-core
//!
//! Tiered, offline-first persistence core for the Mooring project
//! dashboard.
//!
//! This crate is framework-agnostic and can be used by:
//! - a desktop shell (via commands)
//! - a web server (via REST)
//! - diagnostics tooling
//!
//! ## Key Concepts
//!
//! - **Tier**: one of the ordered backing stores (remote API, structured
//!   store, simple store, session store, placeholder generator) consulted
//!   in fixed priority order
//! - **Fallback**: moving to the next tier after the current one fails or
//!   holds no usable data
//! - **Source tag**: the label identifying which tier answered, which the
//!   UI keys its banners on

pub mod config;
pub mod connectivity;
pub mod context;
pub mod health;
pub mod http;
pub mod paths;
pub mod prefs;
pub mod projects;
pub mod stats;
pub mod storage;
pub mod token;

// Re-export commonly used types
pub use config::DashboardConfig;
pub use connectivity::{check_connectivity, Connectivity, OnlineSignal};
pub use context::{DashboardContext, DashboardContextBuilder};
pub use health::{ApiStatus, HealthCache, HealthStatus};
pub use prefs::{DashboardPrefs, PrefsStore};
pub use projects::{
    CancelFlag, FetchError, FetchOptions, FetchResult, Project, ProjectError, Source,
    TieredProjectStore,
};
pub use stats::{StatsMonitor, StatsSnapshot};
pub use token::{TokenClaims, TokenStore};
