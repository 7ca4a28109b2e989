use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return fail("server.port cannot be 0");
    }
    if config.telegram.bot_token.trim().is_empty() {
        return fail("telegram.bot_token cannot be empty");
    }
    if config.delivery.ceiling_bytes == 0 {
        return fail("delivery.ceiling_bytes must be greater than 0");
    }
    if config.retry.max_attempts == 0 {
        return fail("retry.max_attempts must be at least 1");
    }
    if config.retry.backoff_multiplier < 1.0 {
        return fail("retry.backoff_multiplier must be at least 1.0");
    }
    if config.formats.audio.is_empty()
        || config.formats.video.is_empty()
        || config.formats.adult.is_empty()
    {
        return fail("formats: every request kind needs at least one format");
    }
    if config.media.compression.max_height == 0 {
        return fail("media.compression.max_height must be greater than 0");
    }

    Ok(())
}
