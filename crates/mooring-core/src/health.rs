//! API health cache with exponential backoff.
//!
//! Wraps the backend status probe with two guards so a dead backend is not
//! hammered:
//!
//! - a freshness TTL: results younger than the TTL are reused outright
//! - a backoff window: after consecutive failures, checks are skipped
//!   entirely until `offline_until` passes
//!
//! Both guards are consulted synchronously, before any network work, so
//! concurrent checks during an outage all land on the cached decision.
//! The last status and backoff window are mirrored to the durable simple
//! store so a process restart does not immediately re-probe a known-dead
//! backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::connectivity::{check_connectivity, OnlineSignal};
use crate::http::{auth_headers, HttpTransport};
use crate::storage::KeyValueStore;
use crate::token::TokenStore;

/// Backend status as last observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Unknown,
    Online,
    Degraded,
    Offline,
    AuthRequired,
    Error,
}

/// One cached health observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: ApiStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// When set, no network check happens before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl HealthStatus {
    /// True when this status allows attempting API requests.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, ApiStatus::Online | ApiStatus::Degraded)
    }
}

/// Backoff window for a given failure count: `base * 1.5^failures`, capped.
pub fn backoff_window(base: Duration, cap: Duration, failures: u32) -> Duration {
    let scaled = base.mul_f64(1.5f64.powi(failures.min(30) as i32));
    scaled.min(cap)
}

struct HealthState {
    current: Option<HealthStatus>,
    hydrated: bool,
}

/// Time-boxed, backoff-aware cache around the backend health endpoint.
pub struct HealthCache {
    config: Arc<DashboardConfig>,
    transport: Arc<dyn HttpTransport>,
    signal: Arc<OnlineSignal>,
    token: Arc<TokenStore>,
    mirror: Arc<dyn KeyValueStore>,
    state: Mutex<HealthState>,
}

impl HealthCache {
    pub fn new(
        config: Arc<DashboardConfig>,
        transport: Arc<dyn HttpTransport>,
        signal: Arc<OnlineSignal>,
        token: Arc<TokenStore>,
        mirror: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            transport,
            signal,
            token,
            mirror,
            state: Mutex::new(HealthState {
                current: None,
                hydrated: false,
            }),
        }
    }

    /// Check backend health, honoring the cache TTL and backoff window.
    ///
    /// `skip_cache` bypasses the TTL but never the backoff window.
    pub fn check_health(&self, endpoint: &str, skip_cache: bool) -> HealthStatus {
        let now = Utc::now();

        // Cached decision first, synchronously, before any network work.
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !state.hydrated {
                state.current = self.load_mirror();
                state.hydrated = true;
            }
            if let Some(current) = &state.current {
                if let Some(until) = current.offline_until {
                    if now < until {
                        log::debug!("Health check skipped, in backoff until {}", until);
                        return current.clone();
                    }
                }
                let age = now.signed_duration_since(current.timestamp);
                let ttl = chrono::Duration::from_std(self.config.health_ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30));
                if !skip_cache && age < ttl {
                    return current.clone();
                }
            }
        }

        let connectivity = check_connectivity(&self.signal, self.transport.as_ref(), &self.config);
        if !connectivity.is_online {
            return self.record_failure(
                ApiStatus::Offline,
                format!("No internet connection ({})", connectivity.method),
            );
        }

        let token = self.token.get_token();
        let headers = auth_headers(token.as_deref());
        match self
            .transport
            .get(endpoint, &headers, self.config.probe_timeout)
        {
            Ok(response) if response.is_success() => self.record_online(),
            Ok(response) if response.status == 401 => {
                // Stale credentials; drop them so the next login starts clean.
                self.token.clear_token();
                self.record_status(
                    ApiStatus::AuthRequired,
                    "API requires authentication".to_string(),
                )
            }
            Ok(response) => self.record_status(
                ApiStatus::Degraded,
                format!("API returned HTTP {}", response.status),
            ),
            Err(e) => self.record_failure(ApiStatus::Offline, format!("Health check failed: {}", e)),
        }
    }

    /// The cached status without any probing; `None` before the first check
    /// on a cold mirror.
    pub fn cached_status(&self) -> Option<HealthStatus> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.hydrated {
            state.current = self.load_mirror();
            state.hydrated = true;
        }
        state.current.clone()
    }

    /// True when a backoff window is currently in effect.
    pub fn in_backoff(&self) -> bool {
        self.cached_status()
            .and_then(|s| s.offline_until)
            .map(|until| Utc::now() < until)
            .unwrap_or(false)
    }

    fn record_online(&self) -> HealthStatus {
        self.store(HealthStatus {
            status: ApiStatus::Online,
            message: "API reachable".to_string(),
            timestamp: Utc::now(),
            offline_until: None,
            consecutive_failures: 0,
        })
    }

    /// Statuses that are not connection failures: failures counter is kept
    /// as-is, no new backoff window.
    fn record_status(&self, status: ApiStatus, message: String) -> HealthStatus {
        let failures = self.previous_failures();
        self.store(HealthStatus {
            status,
            message,
            timestamp: Utc::now(),
            offline_until: None,
            consecutive_failures: failures,
        })
    }

    fn record_failure(&self, status: ApiStatus, message: String) -> HealthStatus {
        let failures = self.previous_failures().saturating_add(1);
        let window = backoff_window(self.config.backoff_base, self.config.backoff_cap, failures);
        let now = Utc::now();
        let offline_until = chrono::Duration::from_std(window)
            .ok()
            .map(|window| now + window);
        log::warn!(
            "API unreachable ({} consecutive), backing off for {:?}",
            failures,
            window
        );
        self.store(HealthStatus {
            status,
            message,
            timestamp: now,
            offline_until,
            consecutive_failures: failures,
        })
    }

    fn previous_failures(&self) -> u32 {
        match self.state.lock() {
            Ok(state) => state
                .current
                .as_ref()
                .map(|s| s.consecutive_failures)
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn store(&self, status: HealthStatus) -> HealthStatus {
        if let Ok(json) = serde_json::to_string(&status) {
            if let Err(e) = self.mirror.set(&self.config.health_key, &json) {
                log::debug!("Health mirror write failed: {}", e);
            }
        }
        if let Ok(mut state) = self.state.lock() {
            state.current = Some(status.clone());
            state.hydrated = true;
        }
        status
    }

    fn load_mirror(&self) -> Option<HealthStatus> {
        match self.mirror.get(&self.config.health_key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(status) => Some(status),
                Err(e) => {
                    log::debug!("Discarding unreadable health mirror: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::debug!("Health mirror unreadable: {}", e);
                None
            }
        }
    }
}
