//! Handles loading configuration from files and applying it to the Config struct.

use super::{compile_regex, Config, ConfigFile};
use crate::core::error::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

fn lowercase_set(values: &[String]) -> std::collections::HashSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config` instance.
/// Only fields present in `file_config` are touched.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) -> Result<()> {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        config.dns_servers = servers.clone();
    }

    // SMTP
    if let Some(port) = file_config.smtp.smtp_port {
        config.smtp_port = port;
    }
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref helo) = file_config.smtp.smtp_helo_name {
        config.smtp_helo_name = helo.clone();
    }
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.clone();
    }
    if let Some(attempts) = file_config.smtp.max_verification_attempts {
        config.max_verification_attempts = attempts;
    }
    if let Some(backoff) = file_config.smtp.retry_backoff_ms {
        config.retry_backoff = Duration::from_millis(backoff);
    }
    if let Some(ref codes) = file_config.smtp.soft_fail_codes {
        config.soft_fail_codes = codes.clone();
    }

    // Policy
    if let Some(ref pattern) = file_config.policy.syntax_pattern {
        config.syntax_regex = compile_regex(pattern, "syntax")?;
    }
    if let Some(ref domains) = file_config.policy.disposable_domains {
        config.disposable_domains = lowercase_set(domains);
    }
    if let Some(ref prefixes) = file_config.policy.role_based_prefixes {
        config.role_based_prefixes = lowercase_set(prefixes);
    }

    // Scraping
    if let Some(ref url) = file_config.scraping.search_url {
        config.search_url = url.trim().to_string();
    }
    if let Some(ref pattern) = file_config.scraping.email_pattern {
        config.email_regex = compile_regex(pattern, "email extraction")?;
    }

    // Jobs
    if let Some(max_rows) = file_config.jobs.max_bulk_rows {
        config.max_bulk_rows = max_rows;
    }
    if let Some(delay) = file_config.jobs.verify_row_delay_ms {
        config.verify_row_delay = Duration::from_millis(delay);
    }
    if let Some(delay) = file_config.jobs.find_row_delay_ms {
        config.find_row_delay = Duration::from_millis(delay);
    }
    if let Some(concurrency) = file_config.jobs.max_concurrent_jobs {
        config.max_concurrent_jobs = concurrency;
    }
    if let Some(retention) = file_config.jobs.job_retention_secs {
        config.job_retention = Duration::from_secs(retention);
    }

    Ok(())
}
