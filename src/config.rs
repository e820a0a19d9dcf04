use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::Backend;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend opened when no route is given
    pub default_backend: Backend,

    /// Per-request timeout for gateway calls
    pub request_timeout_secs: u64,

    /// Base URLs of the conversation backends
    pub backends: BackendsConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Yenni home directory
    #[serde(skip)]
    pub yenni_home: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub gemini: BackendConfig,
    pub chatgpt: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Characters shown of each prompt in the history sidebar
    pub preview_chars: usize,
    /// Event loop tick, milliseconds
    pub tick_rate_ms: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            gemini: BackendConfig {
                base_url: Backend::Gemini.default_base_url().to_string(),
            },
            chatgpt: BackendConfig {
                base_url: Backend::ChatGpt.default_base_url().to_string(),
            },
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            preview_chars: 50,
            tick_rate_ms: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            default_backend: Backend::Gemini,
            request_timeout_secs: 60,
            backends: BackendsConfig::default(),
            ui: UiConfig::default(),
            yenni_home: home.join(".yenni"),
        }
    }
}

impl Config {
    /// Load `~/.yenni/config.toml` (or `path`), writing defaults when it is missing,
    /// then apply `YENNI_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let yenni_home = home.join(".yenni");

        fs::create_dir_all(&yenni_home).context("Failed to create .yenni directory")?;

        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| yenni_home.join("config.toml"));

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            let config = Config {
                yenni_home: yenni_home.clone(),
                ..Config::default()
            };
            if path.is_none() {
                config.save_to(&config_path)?;
            }
            config
        };

        config.yenni_home = yenni_home;
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Override base URLs from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for backend in [Backend::Gemini, Backend::ChatGpt] {
            if let Some(url) = lookup(backend.url_env_var()).filter(|u| !u.trim().is_empty()) {
                self.set_base_url(backend, url);
            }
        }
    }

    pub fn base_url(&self, backend: Backend) -> &str {
        match backend {
            Backend::Gemini => &self.backends.gemini.base_url,
            Backend::ChatGpt => &self.backends.chatgpt.base_url,
        }
    }

    pub fn set_base_url(&mut self, backend: Backend, url: String) {
        match backend {
            Backend::Gemini => self.backends.gemini.base_url = url,
            Backend::ChatGpt => self.backends.chatgpt.base_url = url,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms.max(10))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.yenni_home.join("logs")
    }
}
