//! Service configuration for the TikTok Sound Identifier
//!
//! Bootstrap configuration is loaded once from a TOML file and cannot change
//! while the service runs. Every field has a built-in default, so a partial
//! (or absent) file is valid.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--host, --port) applied by the binary
//! 2. Explicit TOML file (--config / TSI_CONFIG)
//! 3. `<user config dir>/tsi/config.toml` if present
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Placeholder replaced with the staged source path in transcoder arguments
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced with the destination path in transcoder arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name reported by `GET /`
    pub service_name: String,

    /// HTTP bind address
    pub server: ServerConfig,

    /// Cross-origin policy applied to every route
    pub cors: CorsConfig,

    /// External container transcoder
    pub transcoder: TranscoderConfig,

    /// Upload size limit and scratch space
    pub uploads: UploadConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "TikTok Sound Identifier API".to_string(),
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            transcoder: TranscoderConfig::default(),
            uploads: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP bind address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Cross-origin resource sharing policy
///
/// A `"*"` entry is a wildcard. Because wildcards cannot be combined with
/// credentials, the HTTP layer mirrors the request instead when
/// `allow_credentials` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
        }
    }
}

/// External transcoder invocation
///
/// `args` is a template: [`INPUT_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`]
/// are substituted per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Program name (resolved through PATH) or absolute path
    pub program: String,

    /// Argument template
    pub args: Vec<String>,

    /// Wall-clock limit for one transcoder run, in seconds
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        let args = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-y",
            "-i",
            INPUT_PLACEHOLDER,
            "-vn",
            "-acodec",
            "pcm_s16le",
            OUTPUT_PLACEHOLDER,
        ];

        Self {
            program: "ffmpeg".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 30,
        }
    }
}

/// Upload handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Parent directory for per-request scratch directories
    ///
    /// Defaults to the OS temporary directory when unset.
    pub scratch_dir: Option<PathBuf>,

    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,

    /// Longest decoded clip accepted for analysis, in seconds
    pub max_duration_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
            max_duration_secs: 600,
        }
    }
}

impl UploadConfig {
    /// Scratch root actually used for request workspaces
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, the per-user default
    /// location is tried and built-in defaults are used if it is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::load_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.uploads.max_upload_bytes == 0 {
            return Err(Error::Config(
                "uploads.max_upload_bytes must be greater than zero".to_string(),
            ));
        }

        if self.uploads.max_duration_secs == 0 {
            return Err(Error::Config(
                "uploads.max_duration_secs must be greater than zero".to_string(),
            ));
        }

        if self.transcoder.timeout_secs == 0 {
            return Err(Error::Config(
                "transcoder.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.transcoder.program.trim().is_empty() {
            return Err(Error::Config("transcoder.program is empty".to_string()));
        }

        for placeholder in [INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
            if !self.transcoder.args.iter().any(|a| a.contains(placeholder)) {
                return Err(Error::Config(format!(
                    "transcoder.args must contain the {} placeholder",
                    placeholder
                )));
            }
        }

        Ok(())
    }
}

/// Per-user configuration file location
///
/// `~/.config/tsi/config.toml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tsi").join("config.toml"))
}
