//! Configuration management for the overlay editor

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::ingestion::PollSettings;
use crate::render::cache::DEFAULT_RENDER_CACHE_SIZE;
use crate::selection::DEFAULT_HIT_TOLERANCE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub editor: EditorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the document-processing service
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub history_limit: usize,
    /// Hit-test margin in document units
    pub hit_tolerance: f64,
    /// Rendered pages kept in memory
    pub render_cache: usize,
    pub save_baseline: SaveBaseline,
}

/// What a successful save does to the diff baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveBaseline {
    /// Saved state becomes the new baseline; history restarts from it
    #[default]
    Reset,
    /// Baseline stays at load time; a re-save sends the same records again
    Keep,
}

impl FromStr for SaveBaseline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(SaveBaseline::Reset),
            "keep" => Ok(SaveBaseline::Keep),
            other => Err(format!("unknown save baseline mode: {}", other)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                url: "http://127.0.0.1:8000".to_string(),
                timeout_secs: 30,
            },
            polling: PollingConfig {
                interval_ms: 2000,
                timeout_secs: 300,
            },
            editor: EditorConfig {
                history_limit: DEFAULT_HISTORY_LIMIT,
                hit_tolerance: DEFAULT_HIT_TOLERANCE,
                render_cache: DEFAULT_RENDER_CACHE_SIZE,
                save_baseline: SaveBaseline::Reset,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys use defaults, bad values warn
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Config {
            api: ApiConfig {
                url: lookup("EDITOR_API_URL")
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or(defaults.api.url),
                timeout_secs: parse_or(&lookup, "EDITOR_HTTP_TIMEOUT_SECS", defaults.api.timeout_secs),
            },
            polling: PollingConfig {
                interval_ms: parse_or(&lookup, "EDITOR_POLL_INTERVAL_MS", defaults.polling.interval_ms),
                timeout_secs: parse_or(&lookup, "EDITOR_POLL_TIMEOUT_SECS", defaults.polling.timeout_secs),
            },
            editor: EditorConfig {
                history_limit: parse_or(&lookup, "EDITOR_HISTORY_LIMIT", defaults.editor.history_limit),
                hit_tolerance: parse_or(&lookup, "EDITOR_HIT_TOLERANCE", defaults.editor.hit_tolerance),
                render_cache: parse_or(&lookup, "EDITOR_RENDER_CACHE", defaults.editor.render_cache),
                save_baseline: parse_or(&lookup, "EDITOR_SAVE_BASELINE", defaults.editor.save_baseline),
            },
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.polling.interval_ms.max(1)),
            timeout: Duration::from_secs(self.polling.timeout_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid config value, using default");
            default
        }),
    }
}
