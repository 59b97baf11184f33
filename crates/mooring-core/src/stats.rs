//! Persistence statistics.
//!
//! Purely additive per-tier counters plus a fallback transition log count.
//! Nothing here persists across a restart; counters reset at construction
//! and on explicit user action only.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::projects::types::Source;

#[derive(Debug, Default, Clone, Copy)]
struct TierCounters {
    calls: u64,
    successes: u64,
}

struct StatsInner {
    tiers: HashMap<Source, TierCounters>,
    fallbacks_used: u64,
    last_fallback: Option<String>,
    last_updated: DateTime<Utc>,
}

/// Per-tier counters for one diagnostic snapshot entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub source: Source,
    pub calls: u64,
    pub successes: u64,
    /// successes / max(calls, 1) * 100
    pub success_rate: f64,
}

/// Diagnostic snapshot of the session's persistence behavior.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub tiers: Vec<TierStats>,
    pub fallbacks_used: u64,
    pub last_fallback: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Convenience lookup for one tier's counters.
    pub fn tier(&self, source: Source) -> Option<&TierStats> {
        self.tiers.iter().find(|t| t.source == source)
    }
}

/// Session-scoped persistence statistics monitor.
pub struct StatsMonitor {
    inner: Mutex<StatsInner>,
}

impl Default for StatsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner {
                tiers: HashMap::new(),
                fallbacks_used: 0,
                last_fallback: None,
                last_updated: Utc::now(),
            }),
        }
    }

    /// Count an attempted read/write against a tier.
    pub fn record_attempt(&self, source: Source) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tiers.entry(source).or_default().calls += 1;
            inner.last_updated = Utc::now();
        }
    }

    /// Count a successful read/write against a tier.
    pub fn record_success(&self, source: Source) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tiers.entry(source).or_default().successes += 1;
            inner.last_updated = Utc::now();
        }
    }

    /// Record a fallback transition, e.g. `"API->IndexedDB"`.
    pub fn record_fallback(&self, kind: impl Into<String>) {
        let kind = kind.into();
        log::debug!("Persistence fallback: {}", kind);
        if let Ok(mut inner) = self.inner.lock() {
            inner.fallbacks_used += 1;
            inner.last_fallback = Some(kind);
            inner.last_updated = Utc::now();
        }
    }

    /// Current counters with computed success rates.
    pub fn snapshot(&self) -> StatsSnapshot {
        // Fixed tier order so snapshots render stably in diagnostics.
        const ORDER: [Source; 5] = [
            Source::Api,
            Source::Structured,
            Source::Simple,
            Source::Session,
            Source::Placeholder,
        ];

        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        let tiers = ORDER
            .iter()
            .map(|source| {
                let counters = inner.tiers.get(source).copied().unwrap_or_default();
                TierStats {
                    source: *source,
                    calls: counters.calls,
                    successes: counters.successes,
                    success_rate: counters.successes as f64 / (counters.calls.max(1)) as f64
                        * 100.0,
                }
            })
            .collect();

        StatsSnapshot {
            tiers,
            fallbacks_used: inner.fallbacks_used,
            last_fallback: inner.last_fallback.clone(),
            last_updated: inner.last_updated,
        }
    }

    /// Zero every counter. Explicit user action only.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tiers.clear();
            inner.fallbacks_used = 0;
            inner.last_fallback = None;
            inner.last_updated = Utc::now();
        }
    }
}
