//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values where that is a safe correction.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if !config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }
    if config.smtp_helo_name.trim().is_empty() {
        return Err(AppError::Config("SMTP HELO name cannot be empty.".to_string()));
    }
    if config.smtp_port == 0 {
        return Err(AppError::Config("SMTP port cannot be 0.".to_string()));
    }
    if config.max_bulk_rows == 0 {
        return Err(AppError::Config(
            "Maximum bulk rows must be at least 1.".to_string(),
        ));
    }
    if config.search_url.trim().is_empty() {
        return Err(AppError::Config("Search URL cannot be empty.".to_string()));
    }
    if config.max_verification_attempts == 0 {
        tracing::warn!("Max verification attempts was set to 0. Setting to 1.");
        config.max_verification_attempts = 1;
    }
    if config.max_concurrent_jobs == 0 {
        tracing::warn!("Max concurrent jobs was set to 0. Setting to 1.");
        config.max_concurrent_jobs = 1;
    }
    if config.dns_servers.is_empty() {
        tracing::warn!("DNS servers list is empty. The system resolver configuration will be used.");
    }
    if config.soft_fail_codes.is_empty() {
        tracing::warn!("Soft-fail code set is empty. SMTP probes will never be retried.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sender() {
        let mut config = Config {
            smtp_sender_email: "nobody".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_rejects_zero_bulk_rows() {
        let mut config = Config {
            max_bulk_rows: 0,
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_clamps_attempts_and_concurrency() {
        let mut config = Config {
            max_verification_attempts: 0,
            max_concurrent_jobs: 0,
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.max_verification_attempts, 1);
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
