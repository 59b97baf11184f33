//! Dashboard layout preferences.
//!
//! A smaller sibling of the tiered project store: same tier precedence,
//! no remote tier, no statistics, no merge. Last writer wins wholesale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::storage::KeyValueStore;

/// How the dashboard lays out the project list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPrefs {
    /// One of "recent", "name", "favorite", "custom".
    pub sort_order: String,
    /// One of "grid", "list".
    pub view_mode: String,
    /// Explicit project ordering for "custom" sort; ids in display order.
    #[serde(default)]
    pub project_order: Vec<String>,
}

impl Default for DashboardPrefs {
    fn default() -> Self {
        Self {
            sort_order: "recent".to_string(),
            view_mode: "grid".to_string(),
            project_order: Vec::new(),
        }
    }
}

/// Tiered store for dashboard preferences.
pub struct PrefsStore {
    key: String,
    structured: Arc<dyn KeyValueStore>,
    simple: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl PrefsStore {
    pub fn new(
        config: &DashboardConfig,
        structured: Arc<dyn KeyValueStore>,
        simple: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            key: config.prefs_key.clone(),
            structured,
            simple,
            session,
        }
    }

    /// Write preferences to every tier; true when any tier accepted.
    pub fn save(&self, prefs: &DashboardPrefs) -> bool {
        let json = match serde_json::to_string(prefs) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Preferences unserializable: {}", e);
                return false;
            }
        };

        let tiers: [&dyn KeyValueStore; 3] = [
            self.structured.as_ref(),
            self.simple.as_ref(),
            self.session.as_ref(),
        ];
        let mut any = false;
        for tier in tiers {
            match tier.set(&self.key, &json) {
                Ok(()) => any = true,
                Err(e) => log::warn!("Preference write failed: {}", e),
            }
        }
        any
    }

    /// Read preferences from the highest tier that holds a readable copy,
    /// else the fixed defaults.
    pub fn load(&self) -> DashboardPrefs {
        let tiers: [&dyn KeyValueStore; 3] = [
            self.structured.as_ref(),
            self.simple.as_ref(),
            self.session.as_ref(),
        ];
        for tier in tiers {
            match tier.get(&self.key) {
                Ok(Some(json)) => match serde_json::from_str(&json) {
                    Ok(prefs) => return prefs,
                    Err(e) => log::debug!("Skipping unreadable preferences: {}", e),
                },
                Ok(None) => {}
                Err(e) => log::debug!("Preference tier unreadable: {}", e),
            }
        }
        DashboardPrefs::default()
    }
}
