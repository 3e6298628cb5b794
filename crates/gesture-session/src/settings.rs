//! Session configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `GESTURE__*` environment variables (`__` separates nesting,
//! e.g. `GESTURE__GESTURE__MODE=swipe`, `GESTURE__SINK__HOST=broker.local`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use event_relay::{validate_room_code, MqttConfig};
use gesture::GestureConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::SessionError;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "GESTURE";

/// Where detection results come from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON lines on standard input
    #[default]
    Stdin,
    /// Recorded JSON-lines session, played back at `max_fps`
    Replay { path: PathBuf },
    /// Detector process printing JSON lines to stdout
    Detector {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Where gesture events go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// JSON lines on standard output
    #[default]
    Stdout,
    /// MQTT broker, topic `rooms/{room}/control-object`
    Mqtt(MqttConfig),
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Room to relay into; a 5-digit code is generated when unset
    pub room: Option<String>,

    /// Detector frame-rate cap (0 = uncapped)
    pub max_fps: u32,

    /// Minimum spacing of continuous updates per hand (milliseconds, 0 = off)
    pub emit_interval_ms: u64,

    /// trace, debug, info, warn or error
    pub log_level: String,

    /// Prometheus scrape address (e.g. "0.0.0.0:9100"); no exporter when unset
    pub metrics_addr: Option<String>,

    pub source: SourceConfig,

    pub sink: SinkConfig,

    pub gesture: GestureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: None,
            max_fps: 30,
            emit_interval_ms: 100,
            log_level: "info".to_string(),
            metrics_addr: None,
            source: SourceConfig::default(),
            sink: SinkConfig::default(),
            gesture: GestureConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from an optional TOML file plus `GESTURE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        Self::build(builder.add_source(env_source()))
    }

    /// Parse a TOML document (no environment overrides)
    pub fn from_toml(text: &str) -> Result<Self, SessionError> {
        Self::build(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self, SessionError> {
        let settings = builder
            .build()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        let config: SessionConfig = settings
            .try_deserialize()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every layer of the configuration
    pub fn validate(&self) -> Result<(), SessionError> {
        if let Some(room) = &self.room {
            validate_room_code(room)?;
        }
        if self.max_fps > 240 {
            return Err(SessionError::Config(format!(
                "max_fps must be at most 240, got {}",
                self.max_fps
            )));
        }
        self.level()?;
        self.metrics_socket()?;
        if let SourceConfig::Detector { program, .. } = &self.source {
            if program.trim().is_empty() {
                return Err(SessionError::Config("detector program is empty".to_string()));
            }
        }
        self.gesture.validate()?;
        Ok(())
    }

    /// Parsed log level
    pub fn level(&self) -> Result<Level, SessionError> {
        Level::from_str(&self.log_level)
            .map_err(|_| SessionError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    /// Parsed metrics listener address
    pub fn metrics_socket(&self) -> Result<Option<SocketAddr>, SessionError> {
        self.metrics_addr
            .as_deref()
            .map(|addr| {
                addr.parse().map_err(|_| {
                    SessionError::Config(format!("invalid metrics address '{}'", addr))
                })
            })
            .transpose()
    }

    /// Replays are paced by the frame-rate cap; live detectors drop over-rate frames
    pub fn is_paced(&self) -> bool {
        matches!(self.source, SourceConfig::Replay { .. })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
