//! Bootstrap configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (--config, --database)
//! 2. Environment variables (LESSONPLAY_CONFIG, LESSONPLAY_DATABASE)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: a warning is logged and the
//! defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML file
pub const CONFIG_ENV_VAR: &str = "LESSONPLAY_CONFIG";

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "LESSONPLAY_DATABASE";

/// Complete bootstrap configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// SQLite file backing the durable media store
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Remote text-to-speech endpoint; the built-in engine speaks when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Voice name passed to the remote engine
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Speaking rate of the built-in fallback engine
    #[serde(default = "default_fallback_rate")]
    pub fallback_rate: f32,

    /// Pitch of the built-in fallback engine
    #[serde(default = "default_fallback_pitch")]
    pub fallback_pitch: f32,
}

/// Media resolution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Last-resort asset shown when nothing else resolves
    #[serde(default = "default_placeholder_url")]
    pub placeholder_url: String,

    /// Hosts whose media must render unoptimized
    #[serde(default = "default_external_domains")]
    pub external_domains: Vec<String>,
}

/// Media synchronization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconciliation tick period
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lessonplay"))
        .unwrap_or_else(|| PathBuf::from("./lessonplay_data"))
        .join("lessonplay.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_fallback_rate() -> f32 {
    0.9
}

fn default_fallback_pitch() -> f32 {
    1.0
}

fn default_placeholder_url() -> String {
    "/images/lesson-placeholder.png".to_string()
}

fn default_external_domains() -> Vec<String> {
    vec!["images.unsplash.com".to_string(), "cdn.pixabay.com".to_string()]
}

fn default_reconcile_interval_ms() -> u64 {
    500
}

fn default_event_bus_capacity() -> usize {
    256
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            voice: VoiceConfig::default(),
            media: MediaConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            voice: default_voice(),
            timeout_ms: default_timeout_ms(),
            fallback_rate: default_fallback_rate(),
            fallback_pitch: default_fallback_pitch(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            placeholder_url: default_placeholder_url(),
            external_domains: default_external_domains(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval_ms(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl PlayerConfig {
    /// Parse a TOML document; absent keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve the configuration following the priority order
    ///
    /// A missing file logs a warning and falls back to defaults; a file that
    /// exists but does not parse is an error.
    pub fn load(cli_config: Option<&Path>, cli_database: Option<&Path>) -> Result<Self> {
        let config_path = cli_config
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match config_path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => {
                warn!("No config directory available, using defaults");
                Self::default()
            }
        };

        if let Some(db) = cli_database {
            config.database_path = db.to_path_buf();
        } else if let Ok(db) = std::env::var(DATABASE_ENV_VAR) {
            config.database_path = PathBuf::from(db);
        }

        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sync.reconcile_interval_ms == 0 {
            return Err(Error::Config(
                "sync.reconcile_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync.event_bus_capacity == 0 {
            return Err(Error::Config(
                "sync.event_bus_capacity must be greater than zero".to_string(),
            ));
        }
        if self.voice.fallback_rate <= 0.0 {
            return Err(Error::Config("voice.fallback_rate must be positive".to_string()));
        }
        if self.media.placeholder_url.trim().is_empty() {
            return Err(Error::Config("media.placeholder_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lessonplay").join("config.toml"))
}
