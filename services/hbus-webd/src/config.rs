//! `hbus.toml` configuration loading.
//!
//! TOML is the primary config source; `BIND_ADDR`, `DATALOG_PATH`, and
//! `LOG_LEVEL` environment variables override the corresponding file
//! values. Default config path: `/etc/hbus/hbus.toml`.
//!
//! Uses the same two-stage raw/validated deserialize as the teacher's
//! forwarder config: an all-`Option` `Raw*` struct family decoded by
//! `toml`, then field-by-field validation into concrete, default-filled
//! structs.

use std::env;
use std::path::Path;
use std::time::Duration;

use hbus_timer::schedule::RandomFn;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct WebdConfig {
    pub server: ServerConfig,
    pub datalog: DatalogConfig,
    pub timers: Vec<TimerConfig>,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub index_page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatalogConfig {
    pub sqlite_path: String,
}

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub name: String,
    pub every: Duration,
    pub align: bool,
    pub offset_secs: f64,
    pub random_secs: f64,
    pub random_fn: RandomFn,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    server: Option<RawServerConfig>,
    datalog: Option<RawDatalogConfig>,
    #[serde(default)]
    timers: Vec<RawTimerConfig>,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    bind_addr: Option<String>,
    index_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDatalogConfig {
    sqlite_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTimerConfig {
    name: String,
    every_secs: f64,
    align: Option<bool>,
    offset_secs: Option<f64>,
    random_secs: Option<f64>,
    random_fn: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<WebdConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<WebdConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/hbus/hbus.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<WebdConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_server = raw.server.unwrap_or(RawServerConfig { bind_addr: None, index_page: None });
    let bind_addr = env::var("BIND_ADDR")
        .ok()
        .or(raw_server.bind_addr)
        .unwrap_or_else(|| "0.0.0.0:8080".to_owned());
    let server = ServerConfig { bind_addr, index_page: raw_server.index_page };

    let raw_datalog = raw.datalog.unwrap_or(RawDatalogConfig { sqlite_path: None });
    let sqlite_path = env::var("DATALOG_PATH")
        .ok()
        .or(raw_datalog.sqlite_path)
        .unwrap_or_else(|| "/var/lib/hbus/hbus.sqlite3".to_owned());
    let datalog = DatalogConfig { sqlite_path };

    let mut timers = Vec::with_capacity(raw.timers.len());
    for t in raw.timers {
        let random_fn = match t.random_fn.as_deref() {
            None | Some("uniform") => RandomFn::Uniform,
            Some("gauss") => RandomFn::Gauss,
            Some(other) => return Err(ConfigError::InvalidValue(format!("timers.{}: unknown random_fn '{other}'", t.name))),
        };
        timers.push(TimerConfig {
            name: t.name,
            every: Duration::from_secs_f64(t.every_secs),
            align: t.align.unwrap_or(true),
            offset_secs: t.offset_secs.unwrap_or(0.0),
            random_secs: t.random_secs.unwrap_or(0.0),
            random_fn,
        });
    }

    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

    Ok(WebdConfig { server, datalog, timers, log_level })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_are_absent() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.datalog.sqlite_path, "/var/lib/hbus/hbus.sqlite3");
        assert!(config.timers.is_empty());
    }

    #[test]
    fn parses_server_datalog_and_timers() {
        let toml_str = r#"
            [server]
            bind_addr = "127.0.0.1:9000"
            index_page = "home"

            [datalog]
            sqlite_path = "/tmp/test.sqlite3"

            [[timers]]
            name = "heartbeat"
            every_secs = 60
            align = false
            offset_secs = 5
            random_secs = 1
            random_fn = "gauss"
        "#;
        let config = load_config_from_str(toml_str).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.server.index_page.as_deref(), Some("home"));
        assert_eq!(config.datalog.sqlite_path, "/tmp/test.sqlite3");
        assert_eq!(config.timers.len(), 1);
        assert_eq!(config.timers[0].name, "heartbeat");
        assert!(!config.timers[0].align);
        assert_eq!(config.timers[0].random_fn, RandomFn::Gauss);
    }

    #[test]
    fn unknown_random_fn_is_rejected() {
        let toml_str = r#"
            [[timers]]
            name = "bad"
            every_secs = 1
            random_fn = "triangular"
        "#;
        let err = load_config_from_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
