//! Connectivity probing.
//!
//! Answers "are we online" with a cheap local signal first and a
//! best-effort remote reachability probe second. The local signal is a
//! shared flag the shell updates from whatever platform facility it has
//! (network-change events, a tray toggle); the probe hits a short list of
//! well-known endpoints with a small timeout and a cache-busting query.

use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Utc;

use crate::config::DashboardConfig;
use crate::http::HttpTransport;

const SIGNAL_UNKNOWN: u8 = 0;
const SIGNAL_OFFLINE: u8 = 1;
const SIGNAL_ONLINE: u8 = 2;

/// Shared fast online/offline signal, settable by the shell.
///
/// Starts out unknown; the prober only trusts it once somebody has set it.
pub struct OnlineSignal {
    state: AtomicU8,
}

impl Default for OnlineSignal {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(SIGNAL_UNKNOWN),
        }
    }
}

impl OnlineSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        let value = if online { SIGNAL_ONLINE } else { SIGNAL_OFFLINE };
        self.state.store(value, Ordering::SeqCst);
    }

    /// Last known value, `None` when nothing has been reported yet.
    pub fn get(&self) -> Option<bool> {
        match self.state.load(Ordering::SeqCst) {
            SIGNAL_ONLINE => Some(true),
            SIGNAL_OFFLINE => Some(false),
            _ => None,
        }
    }
}

/// Result of a connectivity check, tagged with how it was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    pub is_online: bool,
    pub method: &'static str,
}

/// Decide whether the backend is worth probing at all.
///
/// Order of decisions:
/// 1. local signal says offline -> trust it, no network cost
/// 2. probe each fallback URL until one answers -> online
/// 3. every probe failed -> offline
/// 4. nothing to probe -> last known signal value, else assume online
pub fn check_connectivity(
    signal: &OnlineSignal,
    transport: &dyn HttpTransport,
    config: &DashboardConfig,
) -> Connectivity {
    if signal.get() == Some(false) {
        return Connectivity {
            is_online: false,
            method: "navigator",
        };
    }

    if config.fallback_urls.is_empty() {
        // Probing machinery unavailable; fall back to the local signal,
        // and past that assume online: running code got here somehow.
        return match signal.get() {
            Some(is_online) => Connectivity {
                is_online,
                method: "navigator-fallback",
            },
            None => Connectivity {
                is_online: true,
                method: "error-fallback",
            },
        };
    }

    for url in &config.fallback_urls {
        let busted = cache_busted(url);
        match transport.get(&busted, &[], config.probe_timeout) {
            // Any response at all means the network path works.
            Ok(_) => {
                return Connectivity {
                    is_online: true,
                    method: "fetch",
                }
            }
            Err(e) => {
                log::debug!("Connectivity probe {} failed: {}", url, e);
            }
        }
    }

    Connectivity {
        is_online: false,
        method: "fetch-all-failed",
    }
}

fn cache_busted(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, TransportError};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that answers every probe from a fixed script.
    struct ScriptedTransport {
        results: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(results: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn get(
            &self,
            url: &str,
            _headers: &[(String, String)],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Err(TransportError::Transport("script exhausted".to_string()))
            } else {
                results.remove(0)
            }
        }
    }

    fn ok() -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 204,
            body: String::new(),
        })
    }

    fn fail() -> Result<HttpResponse, TransportError> {
        Err(TransportError::Transport("connection refused".to_string()))
    }

    fn probe_config(urls: &[&str]) -> DashboardConfig {
        DashboardConfig {
            fallback_urls: urls.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn offline_signal_short_circuits() {
        let signal = OnlineSignal::new();
        signal.set_online(false);
        let transport = ScriptedTransport::new(vec![ok()]);

        let result = check_connectivity(&signal, &transport, &probe_config(&["http://a"]));

        assert!(!result.is_online);
        assert_eq!(result.method, "navigator");
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn first_successful_probe_wins() {
        let signal = OnlineSignal::new();
        let transport = ScriptedTransport::new(vec![fail(), ok()]);

        let result =
            check_connectivity(&signal, &transport, &probe_config(&["http://a", "http://b"]));

        assert!(result.is_online);
        assert_eq!(result.method, "fetch");
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn probes_carry_cache_buster() {
        let signal = OnlineSignal::new();
        let transport = ScriptedTransport::new(vec![ok()]);

        check_connectivity(&signal, &transport, &probe_config(&["http://a/ping"]));

        let calls = transport.calls.lock().unwrap();
        assert!(calls[0].starts_with("http://a/ping?_="));
    }

    #[test]
    fn all_probes_failing_means_offline() {
        let signal = OnlineSignal::new();
        signal.set_online(true);
        let transport = ScriptedTransport::new(vec![fail(), fail()]);

        let result =
            check_connectivity(&signal, &transport, &probe_config(&["http://a", "http://b"]));

        assert!(!result.is_online);
        assert_eq!(result.method, "fetch-all-failed");
    }

    #[test]
    fn no_probe_urls_falls_back_to_signal() {
        let signal = OnlineSignal::new();
        signal.set_online(true);
        let transport = ScriptedTransport::new(vec![]);

        let result = check_connectivity(&signal, &transport, &probe_config(&[]));

        assert!(result.is_online);
        assert_eq!(result.method, "navigator-fallback");
    }

    #[test]
    fn no_probe_urls_and_no_signal_assumes_online() {
        let signal = OnlineSignal::new();
        let transport = ScriptedTransport::new(vec![]);

        let result = check_connectivity(&signal, &transport, &probe_config(&[]));

        assert!(result.is_online);
        assert_eq!(result.method, "error-fallback");
    }
}
