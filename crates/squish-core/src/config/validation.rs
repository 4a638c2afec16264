//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_sizes(config)?;
    validate_limits(config)?;
    validate_command(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_sizes(config: &Config) -> Result<()> {
    if let Some(max) = config.max_file_size {
        if max <= config.min_file_size {
            return Err(ConfigError::invalid(
                "max_file_size",
                format!(
                    "must be greater than min_file_size ({})",
                    config.min_file_size
                ),
            ));
        }
    }
    Ok(())
}

fn validate_limits(config: &Config) -> Result<()> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::invalid("timeout_ms", "must be at least 1"));
    }

    if config.concurrency_limit == Some(0) {
        return Err(ConfigError::invalid(
            "concurrency_limit",
            "must be at least 1",
        ));
    }

    Ok(())
}

fn validate_command(config: &Config) -> Result<()> {
    if let Some(command) = &config.command {
        if command.trim().is_empty() {
            return Err(ConfigError::invalid("command", "command cannot be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_inverted_size_bounds() {
        let config = Config {
            min_file_size: 100,
            max_file_size: Some(100),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_file_size"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = Config {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = Config {
            concurrency_limit: Some(0),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("concurrency_limit"));
    }

    #[test]
    fn test_rejects_blank_command() {
        let config = Config {
            command: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
