//! Configuration module for the kokoro-serve server
//!
//! This module handles server configuration from various sources: YAML files and
//! environment variables. When a YAML file is given its values take priority over
//! environment variables, which in turn override the built-in defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use kokoro_serve::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file, falling back to environment variables
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::lifecycle::{IDLE_CHECK_INTERVAL, LifecycleConfig};
use crate::core::storage::TempFileConfig;
use crate::core::text::ChunkLimits;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use utils::parse_bool;

/// Fallback when `IDLE_TIMEOUT_SECONDS` is missing or unusable
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 300;

/// Server configuration
///
/// Contains everything needed to run the server:
/// - Server settings (host, port, CORS)
/// - Model and voice locations
/// - Chunking budgets and gap trimming
/// - Temp file retention limits
/// - Idle unload policy
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,

    // Model and voices
    pub model_path: PathBuf,
    pub voices_dir: PathBuf,
    pub default_voice: String,
    pub allow_local_voice_saving: bool,
    pub warmup_on_startup: bool,

    // Text chunking
    pub target_min_tokens: usize,
    pub target_max_tokens: usize,
    pub absolute_max_tokens: usize,
    pub gap_trim_ms: u32,

    // Temp files
    pub temp_file_dir: PathBuf,
    pub max_temp_dir_size_mb: u64,
    pub max_temp_dir_age_hours: u64,
    pub max_temp_dir_count: usize,

    // Idle unload
    pub unload_model_after_idle: bool,
    pub idle_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8880,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            model_path: PathBuf::from("models/onnx/model_quantized.onnx"),
            voices_dir: PathBuf::from("models/voices"),
            default_voice: "af_heart".to_string(),
            allow_local_voice_saving: false,
            warmup_on_startup: true,
            target_min_tokens: 175,
            target_max_tokens: 250,
            absolute_max_tokens: 450,
            gap_trim_ms: 250,
            temp_file_dir: PathBuf::from("temp_files"),
            max_temp_dir_size_mb: 2048,
            max_temp_dir_age_hours: 1,
            max_temp_dir_count: 3,
            unload_model_after_idle: false,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable fallbacks
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables
    /// 3. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // The YAML file is the source of truth here, so .env is not loaded.
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            target_min: self.target_min_tokens,
            target_max: self.target_max_tokens,
            max_tokens: self.absolute_max_tokens,
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            model_path: self.model_path.clone(),
            unload_after_idle: self.unload_model_after_idle,
            idle_timeout: Duration::from_secs(self.idle_timeout_seconds),
            check_interval: IDLE_CHECK_INTERVAL,
        }
    }

    pub fn temp_file_config(&self) -> TempFileConfig {
        TempFileConfig {
            dir: self.temp_file_dir.clone(),
            max_age: Duration::from_secs(self.max_temp_dir_age_hours * 3600),
            max_count: self.max_temp_dir_count,
            max_dir_size_bytes: self.max_temp_dir_size_mb * 1024 * 1024,
        }
    }
}
