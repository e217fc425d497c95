use std::path::PathBuf;

use super::ServerConfig;
use super::env;
use super::yaml::YamlConfig;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration to use as overrides
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = ServerConfig::default();

    // Helper macro for string values: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var))
                .unwrap_or($default)
        };
    }

    // Helper macro for parsed values: YAML > ENV (must parse) > Default
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => env::parsed($env_var)?.unwrap_or($default),
            }
        };
    }

    // Helper macro for booleans: YAML > ENV > Default
    macro_rules! get_bool {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::boolean($env_var))
                .unwrap_or($default)
        };
    }

    let server = yaml.server.unwrap_or_default();
    let cors = yaml.cors.unwrap_or_default();
    let model = yaml.model.unwrap_or_default();
    let voices = yaml.voices.unwrap_or_default();
    let chunking = yaml.chunking.unwrap_or_default();
    let temp_files = yaml.temp_files.unwrap_or_default();

    // Server configuration
    let host = get_value!("HOST", server.host, defaults.host);
    let port = get_parsed!("PORT", server.port, defaults.port);
    let cors_enabled = get_bool!("CORS_ENABLED", cors.enabled, defaults.cors_enabled);
    let cors_origins = cors
        .origins
        .or_else(|| env::list("CORS_ORIGINS"))
        .unwrap_or(defaults.cors_origins);

    // Model and voices
    let model_path = PathBuf::from(get_value!(
        "MODEL_PATH",
        model.path,
        defaults.model_path.to_string_lossy().into_owned()
    ));
    let voices_dir = PathBuf::from(get_value!(
        "VOICES_DIR",
        model.voices_dir,
        defaults.voices_dir.to_string_lossy().into_owned()
    ));
    let default_voice = get_value!("DEFAULT_VOICE", model.default_voice, defaults.default_voice);
    let warmup_on_startup = get_bool!(
        "WARMUP_ON_STARTUP",
        model.warmup_on_startup,
        defaults.warmup_on_startup
    );
    let allow_local_voice_saving = get_bool!(
        "ALLOW_LOCAL_VOICE_SAVING",
        voices.allow_local_saving,
        defaults.allow_local_voice_saving
    );

    // Idle unload
    let unload_model_after_idle = get_bool!(
        "UNLOAD_MODEL_AFTER_IDLE",
        model.unload_after_idle,
        defaults.unload_model_after_idle
    );
    let idle_timeout_seconds = model
        .idle_timeout_seconds
        .or_else(env::idle_timeout_seconds)
        .unwrap_or(defaults.idle_timeout_seconds);

    // Text chunking
    let target_min_tokens = get_parsed!(
        "TARGET_MIN_TOKENS",
        chunking.target_min_tokens,
        defaults.target_min_tokens
    );
    let target_max_tokens = get_parsed!(
        "TARGET_MAX_TOKENS",
        chunking.target_max_tokens,
        defaults.target_max_tokens
    );
    let absolute_max_tokens = get_parsed!(
        "ABSOLUTE_MAX_TOKENS",
        chunking.absolute_max_tokens,
        defaults.absolute_max_tokens
    );
    let gap_trim_ms = get_parsed!("GAP_TRIM_MS", chunking.gap_trim_ms, defaults.gap_trim_ms);

    // Temp files
    let temp_file_dir = PathBuf::from(get_value!(
        "TEMP_FILE_DIR",
        temp_files.dir,
        defaults.temp_file_dir.to_string_lossy().into_owned()
    ));
    let max_temp_dir_size_mb = get_parsed!(
        "MAX_TEMP_DIR_SIZE_MB",
        temp_files.max_size_mb,
        defaults.max_temp_dir_size_mb
    );
    let max_temp_dir_age_hours = get_parsed!(
        "MAX_TEMP_DIR_AGE_HOURS",
        temp_files.max_age_hours,
        defaults.max_temp_dir_age_hours
    );
    let max_temp_dir_count = get_parsed!(
        "MAX_TEMP_DIR_COUNT",
        temp_files.max_count,
        defaults.max_temp_dir_count
    );

    Ok(ServerConfig {
        host,
        port,
        cors_enabled,
        cors_origins,
        model_path,
        voices_dir,
        default_voice,
        allow_local_voice_saving,
        warmup_on_startup,
        target_min_tokens,
        target_max_tokens,
        absolute_max_tokens,
        gap_trim_ms,
        temp_file_dir,
        max_temp_dir_size_mb,
        max_temp_dir_age_hours,
        max_temp_dir_count,
        unload_model_after_idle,
        idle_timeout_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::super::yaml::{ChunkingYaml, ModelYaml, ServerYaml};
    use super::*;
    use serial_test::serial;

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            std::env::remove_var("HOST");
            std::env::remove_var("PORT");
            std::env::remove_var("DEFAULT_VOICE");
            std::env::remove_var("GAP_TRIM_MS");
            std::env::remove_var("UNLOAD_MODEL_AFTER_IDLE");
            std::env::remove_var("IDLE_TIMEOUT_SECONDS");
        }
    }

    #[test]
    #[serial]
    fn test_merge_yaml_only() {
        cleanup_env_vars();

        let yaml = YamlConfig {
            server: Some(ServerYaml {
                host: Some("127.0.0.1".to_string()),
                port: Some(8080),
            }),
            chunking: Some(ChunkingYaml {
                gap_trim_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = merge_config(Some(yaml)).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.gap_trim_ms, 0);
        assert_eq!(config.target_max_tokens, 250);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("DEFAULT_VOICE", "am_adam");
            std::env::set_var("UNLOAD_MODEL_AFTER_IDLE", "true");
            std::env::set_var("IDLE_TIMEOUT_SECONDS", "30");
        }

        let yaml = YamlConfig {
            model: Some(ModelYaml {
                default_voice: Some("bf_emma".to_string()),
                unload_after_idle: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.default_voice, "bf_emma");
        assert!(!config.unload_model_after_idle);
        // Not in YAML, so the environment wins over the default
        assert_eq!(config.idle_timeout_seconds, 30);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_defaults_when_no_yaml_or_env() {
        cleanup_env_vars();

        let config = merge_config(None).unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(config.host, defaults.host);
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.model_path, defaults.model_path);
        assert_eq!(config.gap_trim_ms, defaults.gap_trim_ms);
    }

    #[test]
    #[serial]
    fn test_merge_malformed_env_number() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("GAP_TRIM_MS", "-5");
        }

        assert!(merge_config(None).is_err());

        // A YAML value shadows the malformed variable entirely
        let yaml = YamlConfig {
            chunking: Some(ChunkingYaml {
                gap_trim_ms: Some(100),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(merge_config(Some(yaml)).unwrap().gap_trim_ms, 100);

        cleanup_env_vars();
    }
}
