//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:7171"
//! log_format = "json"
//!
//! [store]
//! dir = "/var/lib/showrunner"
//!
//! [playback]
//! min_elapsed_to_confirm_secs = 45
//! autoplay_max_attempts = 20
//!
//! [[webhook]]
//! url = "https://hooks.example.com/showrunner"
//! events = ["advanced", "autoplay_exhausted"]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use showrunner_core::{EngineConfig, EventKind, WebhookConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7171))
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the state record. Defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_store_dir)
    }
}

pub fn default_store_dir() -> PathBuf {
    ProjectDirs::from("", "", "showrunner")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".showrunner"))
}

/// Playback tuning. Unset fields keep the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackConfig {
    pub min_considered_duration_secs: Option<f64>,
    pub min_elapsed_to_confirm_secs: Option<f64>,
    pub end_epsilon_secs: Option<f64>,
    pub watch_interval_ms: Option<u64>,
    pub autoplay_interval_ms: Option<u64>,
    pub autoplay_max_attempts: Option<u32>,
    pub autoplay_start_delay_ms: Option<u64>,
    pub navigate_delay_ms: Option<u64>,
    pub pause_guard_ms: Option<u64>,
    pub event_limit: Option<usize>,
}

impl PlaybackConfig {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut c = EngineConfig::default();
        if let Some(v) = self.min_considered_duration_secs {
            c = c.with_min_considered_duration(v);
        }
        if let Some(v) = self.min_elapsed_to_confirm_secs {
            c = c.with_min_elapsed_to_confirm(v);
        }
        if let Some(v) = self.end_epsilon_secs {
            c = c.with_end_epsilon(v);
        }
        if let Some(v) = self.watch_interval_ms {
            c = c.with_watch_interval(v);
        }
        if let Some(v) = self.autoplay_interval_ms {
            c = c.with_autoplay_interval(v);
        }
        if let Some(v) = self.autoplay_max_attempts {
            c = c.with_autoplay_max_attempts(v);
        }
        if let Some(v) = self.autoplay_start_delay_ms {
            c = c.with_autoplay_start_delay(v);
        }
        if let Some(v) = self.navigate_delay_ms {
            c = c.with_navigate_delay(v);
        }
        if let Some(v) = self.pause_guard_ms {
            c = c.with_pause_guard(v);
        }
        if let Some(v) = self.event_limit {
            c = c.with_event_limit(v);
        }
        c
    }

    fn validate(&self) -> Result<(), String> {
        let secs = [
            ("min_considered_duration_secs", self.min_considered_duration_secs),
            ("min_elapsed_to_confirm_secs", self.min_elapsed_to_confirm_secs),
            ("end_epsilon_secs", self.end_epsilon_secs),
        ];
        for (name, value) in secs {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("playback.{name} must be a non-negative number, got {v}"));
                }
            }
        }

        let intervals = [
            ("watch_interval_ms", self.watch_interval_ms),
            ("autoplay_interval_ms", self.autoplay_interval_ms),
        ];
        for (name, value) in intervals {
            if value == Some(0) {
                return Err(format!("playback.{name} must be greater than zero"));
            }
        }

        if self.autoplay_max_attempts == Some(0) {
            return Err("playback.autoplay_max_attempts must be greater than zero".into());
        }
        if self.event_limit == Some(0) {
            return Err("playback.event_limit must be greater than zero".into());
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.playback.to_engine_config()
    }

    fn validate(&self) -> Result<(), String> {
        for (i, wh) in self.webhook.iter().enumerate() {
            let parsed = url::Url::parse(&wh.url)
                .map_err(|e| format!("Invalid webhook URL at index {}: {} ({})", i, wh.url, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("Webhook URL must use http or https: {}", wh.url));
            }
            if let Some(unknown) = wh.events.iter().find(|e| EventKind::parse(e).is_none()) {
                return Err(format!(
                    "Unknown event type '{}' in webhook at index {}",
                    unknown, i
                ));
            }
        }

        self.playback.validate()?;

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}
