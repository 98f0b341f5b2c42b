//! Config loader — reads `~/.voxgate/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.voxgate/config.json`
//! 3. Environment variables (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&config_path, json)
}

/// Apply credential/endpoint overrides from the environment.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(key) = std::env::var("VOXGATE_GEMINI_API_KEY") {
        config.router.providers.gemini.api_key = key;
    }
    if let Ok(key) = std::env::var("VOXGATE_GPT_API_KEY") {
        config.router.providers.gpt.api_key = key;
    }
    if let Ok(key) = std::env::var("VOXGATE_CLAUDE_API_KEY") {
        config.router.providers.claude.api_key = key;
    }
    if let Ok(key) = std::env::var("VOXGATE_DEEPSEEK_API_KEY") {
        config.router.providers.deepseek.api_key = key;
    }
    if let Ok(endpoint) = std::env::var("VOXGATE_LOCAL_ENDPOINT") {
        config.router.providers.local.endpoint = endpoint;
    }
    if let Ok(key) = std::env::var("VOXGATE_LIVE_API_KEY") {
        config.live.api_key = key;
    }
    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/voxgate-config.json")));
        assert_eq!(config.router.fast_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = load_config(Some(&path));
        assert!(!config.router.sovereign_proxy);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.router.sovereign_proxy = true;
        config.router.providers.gpt.endpoint = "https://corp.example.com".into();
        save_config(&config, Some(&path)).unwrap();

        let loaded = load_config(Some(&path));
        assert!(loaded.router.sovereign_proxy);
        assert_eq!(
            loaded.router.providers.gpt.endpoint,
            "https://corp.example.com"
        );
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/config.json");
        save_config(&Config::default(), Some(&path)).unwrap();
        assert!(path.exists());
    }
}
