use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Anything left out
/// falls back to the matching environment variable, then to the default.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8880
///
/// cors:
///   enabled: true
///   origins: ["http://localhost:3000"]
///
/// model:
///   path: "models/onnx/model_quantized.onnx"
///   voices_dir: "models/voices"
///   default_voice: "af_heart"
///   warmup_on_startup: true
///   unload_after_idle: true
///   idle_timeout_seconds: 300
///
/// voices:
///   allow_local_saving: false
///
/// chunking:
///   target_min_tokens: 175
///   target_max_tokens: 250
///   absolute_max_tokens: 450
///   gap_trim_ms: 250
///
/// temp_files:
///   dir: "temp_files"
///   max_size_mb: 2048
///   max_age_hours: 1
///   max_count: 3
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub cors: Option<CorsYaml>,
    pub model: Option<ModelYaml>,
    pub voices: Option<VoicesYaml>,
    pub chunking: Option<ChunkingYaml>,
    pub temp_files: Option<TempFilesYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CorsYaml {
    pub enabled: Option<bool>,
    pub origins: Option<Vec<String>>,
}

/// Model weights location and lifecycle policy
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelYaml {
    pub path: Option<String>,
    pub voices_dir: Option<String>,
    pub default_voice: Option<String>,
    pub warmup_on_startup: Option<bool>,
    pub unload_after_idle: Option<bool>,
    pub idle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoicesYaml {
    pub allow_local_saving: Option<bool>,
}

/// Token budgets and inter-chunk gap trimming
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChunkingYaml {
    pub target_min_tokens: Option<usize>,
    pub target_max_tokens: Option<usize>,
    pub absolute_max_tokens: Option<usize>,
    pub gap_trim_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TempFilesYaml {
    pub dir: Option<String>,
    pub max_size_mb: Option<u64>,
    pub max_age_hours: Option<u64>,
    pub max_count: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
