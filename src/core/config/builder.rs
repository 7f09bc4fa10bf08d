//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

/// Builder pattern for creating `Config` instances fluently.
///
/// This is the primary way users should create a `Config` object.
/// It handles loading from files, applying overrides, and validation.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.overrides.network.user_agent = Some(value.into());
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.overrides.smtp.smtp_port = Some(port);
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_helo_name(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_helo_name = Some(value.into());
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_sender_email = Some(value.into());
        self
    }
    pub fn max_verification_attempts(mut self, value: u32) -> Self {
        self.overrides.smtp.max_verification_attempts = Some(value);
        self
    }
    pub fn retry_backoff(mut self, duration: Duration) -> Self {
        self.overrides.smtp.retry_backoff_ms = Some(millis(duration));
        self
    }
    pub fn soft_fail_codes(mut self, codes: Vec<u16>) -> Self {
        self.overrides.smtp.soft_fail_codes = Some(codes);
        self
    }
    pub fn syntax_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.overrides.policy.syntax_pattern = Some(pattern.into());
        self
    }
    pub fn disposable_domains(mut self, domains: Vec<String>) -> Self {
        self.overrides.policy.disposable_domains = Some(domains);
        self
    }
    pub fn role_based_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.overrides.policy.role_based_prefixes = Some(prefixes);
        self
    }
    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.scraping.search_url = Some(url.into());
        self
    }
    pub fn email_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.overrides.scraping.email_pattern = Some(pattern.into());
        self
    }
    pub fn max_bulk_rows(mut self, value: usize) -> Self {
        self.overrides.jobs.max_bulk_rows = Some(value);
        self
    }
    pub fn verify_row_delay(mut self, duration: Duration) -> Self {
        self.overrides.jobs.verify_row_delay_ms = Some(millis(duration));
        self
    }
    pub fn find_row_delay(mut self, duration: Duration) -> Self {
        self.overrides.jobs.find_row_delay_ms = Some(millis(duration));
        self
    }
    pub fn max_concurrent_jobs(mut self, value: usize) -> Self {
        self.overrides.jobs.max_concurrent_jobs = Some(value);
        self
    }
    pub fn job_retention(mut self, duration: Duration) -> Self {
        self.overrides.jobs.job_retention_secs = Some(duration.as_secs());
        self
    }

    /// Builds the final `Config` object, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config)?;
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else {
            for path_str in ["./email-prober.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    tracing::debug!("Found potential default config file: {}", path_str);
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config)?;
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::debug!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides)?;
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}
