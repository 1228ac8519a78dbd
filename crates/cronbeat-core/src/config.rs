use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IDLE_DELAY_MS: u64 = 1_000; // wait when no job is eligible
pub const DEFAULT_NEXT_DELAY_MS: u64 = 0; // minimum gap before reclaiming the same job
pub const DEFAULT_TICK_DELAY_MS: u64 = 0; // gap between successful completions

/// Top-level config (cronbeat.toml + CRONBEAT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CronbeatConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File-level mirror of the engine's delay knobs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
    #[serde(default)]
    pub next_delay_ms: u64,
    #[serde(default)]
    pub tick_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_delay_ms: DEFAULT_IDLE_DELAY_MS,
            next_delay_ms: DEFAULT_NEXT_DELAY_MS,
            tick_delay_ms: DEFAULT_TICK_DELAY_MS,
        }
    }
}

impl CronbeatConfig {
    /// Load config from a TOML file with CRONBEAT_* env var overrides
    /// (double underscore separates nesting levels, e.g.
    /// `CRONBEAT_DATABASE__PATH`).
    ///
    /// Checks the explicit path argument first, else ~/.cronbeat/cronbeat.toml.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CRONBEAT_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }
}

fn default_idle_delay_ms() -> u64 {
    DEFAULT_IDLE_DELAY_MS
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronbeat/cronbeat.db", home)
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronbeat/cronbeat.toml", home)
}
