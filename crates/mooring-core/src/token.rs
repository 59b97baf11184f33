//! Auth token storage and validation.
//!
//! The token is an opaque three-segment bearer string. Only the middle
//! segment is ever decoded, and only to read `exp`, the refresh token, and
//! the user payload. The store keeps an in-memory copy for the hot path and
//! mirrors the token across three channels so a restart or a cleared tier
//! does not log the user out:
//!
//! - durable tier (`remember` logins)
//! - transient tier (session-only logins)
//! - side channel (always written, for request construction by the shell)
//!
//! Storage failures degrade to "token not found" rather than propagating;
//! an unreadable tier must never block login.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::storage::KeyValueStore;

/// How long a cached token skips expiry re-validation.
const VALIDATION_THROTTLE: Duration = Duration::from_millis(500);

/// Window during which repeated clears collapse into one.
const CLEAR_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Claims decoded from the token's payload segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Expiry as Unix seconds; absent means "treat as expired".
    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

struct CachedToken {
    raw: String,
    exp: Option<i64>,
}

struct TokenState {
    cached: Option<CachedToken>,
    last_validated: Option<Instant>,
    last_cleared: Option<Instant>,
}

/// Multi-channel token store.
pub struct TokenStore {
    key: String,
    durable: Arc<dyn KeyValueStore>,
    transient: Arc<dyn KeyValueStore>,
    side_channel: Arc<dyn KeyValueStore>,
    state: Mutex<TokenState>,
}

impl TokenStore {
    pub fn new(
        config: &DashboardConfig,
        durable: Arc<dyn KeyValueStore>,
        transient: Arc<dyn KeyValueStore>,
        side_channel: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            key: config.token_key.clone(),
            durable,
            transient,
            side_channel,
            state: Mutex::new(TokenState {
                cached: None,
                last_validated: None,
                last_cleared: None,
            }),
        }
    }

    /// Validate and store a token. Returns false on malformed input;
    /// never errors out on storage failure.
    pub fn set_token(&self, token: &str, remember: bool) -> bool {
        let claims = match parse_token(token) {
            Some(claims) => claims,
            None => {
                log::warn!("Rejected malformed auth token");
                return false;
            }
        };

        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return false,
            };
            state.cached = Some(CachedToken {
                raw: token.to_string(),
                exp: claims.exp,
            });
            state.last_validated = Some(Instant::now());
        }

        let primary: &dyn KeyValueStore = if remember {
            self.durable.as_ref()
        } else {
            self.transient.as_ref()
        };
        if let Err(e) = primary.set(&self.key, token) {
            log::warn!("Token write to primary channel failed: {}", e);
        }
        if let Err(e) = self.side_channel.set(&self.key, token) {
            log::warn!("Token write to side channel failed: {}", e);
        }

        true
    }

    /// Return the current token, or `None` when no unexpired token exists
    /// in any channel.
    pub fn get_token(&self) -> Option<String> {
        let mut state = self.state.lock().ok()?;

        let recently_validated = state
            .last_validated
            .map(|at| at.elapsed() < VALIDATION_THROTTLE)
            .unwrap_or(false);
        let cached = state.cached.as_ref().map(|c| (c.raw.clone(), c.exp));
        if let Some((raw, exp)) = cached {
            if recently_validated {
                return Some(raw);
            }
            if !is_expired(exp) {
                state.last_validated = Some(Instant::now());
                return Some(raw);
            }
            // Expired in memory; fall through to the channels.
            state.cached = None;
        }

        let channels: [&dyn KeyValueStore; 3] = [
            self.durable.as_ref(),
            self.transient.as_ref(),
            self.side_channel.as_ref(),
        ];
        for channel in channels {
            let candidate = match channel.get(&self.key) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("Token channel unreadable: {}", e);
                    continue;
                }
            };
            if let Some(claims) = parse_token(&candidate) {
                if !is_expired(claims.exp) {
                    state.cached = Some(CachedToken {
                        raw: candidate.clone(),
                        exp: claims.exp,
                    });
                    state.last_validated = Some(Instant::now());
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Clear the token everywhere. Idempotent; bursts of clears within the
    /// debounce window collapse into one observable effect.
    pub fn clear_token(&self) {
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            let recently_cleared = state
                .last_cleared
                .map(|at| at.elapsed() < CLEAR_DEBOUNCE)
                .unwrap_or(false);
            if recently_cleared && state.cached.is_none() {
                return;
            }
            state.cached = None;
            state.last_validated = None;
            state.last_cleared = Some(Instant::now());
        }

        let channels: [&dyn KeyValueStore; 3] = [
            self.durable.as_ref(),
            self.transient.as_ref(),
            self.side_channel.as_ref(),
        ];
        for channel in channels {
            if let Err(e) = channel.remove(&self.key) {
                log::warn!("Token clear failed on a channel: {}", e);
            }
        }
    }
}

/// Decode the payload segment of a three-segment token.
///
/// Returns `None` on any malformed input; never panics.
pub fn parse_token(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    let _signature = segments.next()?;
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// A token with no `exp`, or an `exp` at or before now, counts as expired.
pub fn is_expired(exp: Option<i64>) -> bool {
    match exp {
        Some(exp) => exp <= Utc::now().timestamp(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SessionStore;

    fn make_store() -> TokenStore {
        let config = DashboardConfig::default();
        TokenStore::new(
            &config,
            Arc::new(SessionStore::new()),
            Arc::new(SessionStore::new()),
            Arc::new(SessionStore::new()),
        )
    }

    fn make_token(exp: Option<i64>) -> String {
        let claims = match exp {
            Some(exp) => serde_json::json!({ "exp": exp, "user": { "name": "dev" } }),
            None => serde_json::json!({ "user": { "name": "dev" } }),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("header.{}.signature", payload)
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn round_trip_with_remember() {
        let store = make_store();
        let token = make_token(Some(future_exp()));

        assert!(store.set_token(&token, true));
        assert_eq!(store.get_token().as_deref(), Some(token.as_str()));
    }

    #[test]
    fn malformed_token_rejected() {
        let store = make_store();

        assert!(!store.set_token("not-a-token", true));
        assert!(!store.set_token("a.b", false));
        assert!(!store.set_token("a.!!!.c", false));
        assert!(store.get_token().is_none());
    }

    #[test]
    fn expired_token_not_returned() {
        let store = make_store();
        let expired = make_token(Some(Utc::now().timestamp() - 10));

        // set_token accepts it (shape is valid) but get_token must not
        // hand it back once the throttle window passes.
        assert!(store.set_token(&expired, true));
        std::thread::sleep(VALIDATION_THROTTLE + Duration::from_millis(50));
        assert!(store.get_token().is_none());
    }

    #[test]
    fn token_recovered_from_durable_channel() {
        let config = DashboardConfig::default();
        let durable: Arc<SessionStore> = Arc::new(SessionStore::new());
        let token = make_token(Some(future_exp()));
        durable.set(&config.token_key, &token).unwrap();

        let store = TokenStore::new(
            &config,
            durable,
            Arc::new(SessionStore::new()),
            Arc::new(SessionStore::new()),
        );

        assert_eq!(store.get_token().as_deref(), Some(token.as_str()));
    }

    #[test]
    fn expired_candidate_in_channel_skipped() {
        let config = DashboardConfig::default();
        let durable: Arc<SessionStore> = Arc::new(SessionStore::new());
        let transient: Arc<SessionStore> = Arc::new(SessionStore::new());
        durable
            .set(
                &config.token_key,
                &make_token(Some(Utc::now().timestamp() - 10)),
            )
            .unwrap();
        let fresh = make_token(Some(future_exp()));
        transient.set(&config.token_key, &fresh).unwrap();

        let store = TokenStore::new(&config, durable, transient, Arc::new(SessionStore::new()));

        assert_eq!(store.get_token().as_deref(), Some(fresh.as_str()));
    }

    #[test]
    fn clear_token_clears_all_channels() {
        let config = DashboardConfig::default();
        let durable: Arc<SessionStore> = Arc::new(SessionStore::new());
        let transient: Arc<SessionStore> = Arc::new(SessionStore::new());
        let side: Arc<SessionStore> = Arc::new(SessionStore::new());
        let store = TokenStore::new(
            &config,
            Arc::clone(&durable) as Arc<dyn KeyValueStore>,
            Arc::clone(&transient) as Arc<dyn KeyValueStore>,
            Arc::clone(&side) as Arc<dyn KeyValueStore>,
        );

        store.set_token(&make_token(Some(future_exp())), true);
        store.clear_token();
        // Second clear inside the debounce window is a no-op, not a panic.
        store.clear_token();

        assert!(store.get_token().is_none());
        assert!(durable.get(&config.token_key).unwrap().is_none());
        assert!(transient.get(&config.token_key).unwrap().is_none());
        assert!(side.get(&config.token_key).unwrap().is_none());
    }

    #[test]
    fn parse_token_reads_claims() {
        let token = make_token(Some(1234567890));
        let claims = parse_token(&token).unwrap();

        assert_eq!(claims.exp, Some(1234567890));
        assert!(claims.user.is_some());
        assert!(claims.refresh_token.is_none());
    }

    #[test]
    fn parse_token_rejects_garbage() {
        assert!(parse_token("").is_none());
        assert!(parse_token("one.two").is_none());
        assert!(parse_token("a.b.c.d").is_none());
        assert!(parse_token("a..c").is_none());
        assert!(parse_token("a.%%%.c").is_none());
    }

    #[test]
    fn is_expired_semantics() {
        assert!(is_expired(None));
        assert!(is_expired(Some(Utc::now().timestamp() - 1)));
        assert!(!is_expired(Some(Utc::now().timestamp() + 3600)));
    }
}
