use super::ServerConfig;

/// Validate a fully merged configuration
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_chunk_limits(
        config.target_min_tokens,
        config.target_max_tokens,
        config.absolute_max_tokens,
    )?;
    validate_idle_timeout(config.idle_timeout_seconds)?;
    validate_default_voice(&config.default_voice)?;
    Ok(())
}

/// Ensure `0 < TARGET_MIN_TOKENS <= TARGET_MAX_TOKENS <= ABSOLUTE_MAX_TOKENS`
pub fn validate_chunk_limits(
    target_min: usize,
    target_max: usize,
    absolute_max: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if target_min == 0 {
        return Err("TARGET_MIN_TOKENS must be greater than zero".into());
    }
    if target_min > target_max {
        return Err(format!(
            "TARGET_MIN_TOKENS ({target_min}) must not exceed TARGET_MAX_TOKENS ({target_max})"
        )
        .into());
    }
    if target_max > absolute_max {
        return Err(format!(
            "TARGET_MAX_TOKENS ({target_max}) must not exceed ABSOLUTE_MAX_TOKENS ({absolute_max})"
        )
        .into());
    }
    Ok(())
}

pub fn validate_idle_timeout(seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    if seconds == 0 {
        return Err("IDLE_TIMEOUT_SECONDS must be greater than zero".into());
    }
    Ok(())
}

pub fn validate_default_voice(voice: &str) -> Result<(), Box<dyn std::error::Error>> {
    if voice.trim().is_empty() {
        return Err("DEFAULT_VOICE cannot be empty".into());
    }
    Ok(())
}
