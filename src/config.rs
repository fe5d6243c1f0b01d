use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/octocoach/ask/";
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint_url: String,
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie_name: String,
    #[serde(default = "default_effects_enabled")]
    pub effects_enabled: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_csrf_cookie() -> String {
    DEFAULT_CSRF_COOKIE.to_string()
}

fn default_effects_enabled() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint_url: default_endpoint(),
            csrf_cookie_name: default_csrf_cookie(),
            effects_enabled: default_effects_enabled(),
        }
    }

    /// Load from the config file. Never fails: a missing config directory or
    /// an unreadable file just means defaults. Environment overrides are
    /// applied on every path, including the fallbacks.
    pub fn load() -> Self {
        let mut config = Self::new();

        match Self::get_config_path() {
            Ok(config_path) => {
                match Self::load_from(&config_path) {
                    Ok(loaded) => config = loaded,
                    Err(err) => {
                        tracing::warn!(
                            path = %config_path.display(),
                            error = %err,
                            "could not read config, using defaults"
                        );
                    }
                }

                // Write a starter file on first run so the options are
                // discoverable. This happens before env overrides, which are
                // per-session and should not end up on disk.
                if !config_path.exists() {
                    if let Err(err) = config.save_to(&config_path) {
                        tracing::debug!(error = %err, "could not write starter config");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not determine config directory, using defaults");
            }
        }

        config.apply_env_overrides();
        config
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("OCTOCOACH_ENDPOINT") {
            if !url.is_empty() {
                self.endpoint_url = url;
            }
        }
        if let Ok(name) = std::env::var("OCTOCOACH_CSRF_COOKIE") {
            if !name.is_empty() {
                self.csrf_cookie_name = name;
            }
        }
        if std::env::var_os("OCTOCOACH_NO_EFFECTS").is_some() {
            self.effects_enabled = false;
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("octocoach").join("config.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("octocoach").join("octocoach.log"))
    }
}
