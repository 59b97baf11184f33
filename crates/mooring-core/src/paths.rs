use std::env;
use std::path::PathBuf;

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(home);
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(profile);
        }
    }

    Err("Home directory not set".to_string())
}

/// Default data directory for durable tiers: `~/.config/mooring`.
///
/// Falls back to a relative `.mooring` directory when no home directory
/// can be resolved (e.g. stripped-down containers).
pub fn default_data_dir() -> PathBuf {
    match get_home_dir() {
        Ok(home) => PathBuf::from(home).join(".config").join("mooring"),
        Err(_) => PathBuf::from(".mooring"),
    }
}
