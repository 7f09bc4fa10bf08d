//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading, building, and validation.

pub(crate) mod builder;
pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::core::error::Result;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

/// Address shape accepted before any network check runs.
///
/// Anchored at both ends and free of whitespace, so it is stricter than a
/// prefix match of `[^@]+@[^@]+\.[^@]+`: `"john doe@example.com"` and
/// `"a@b.co trailing"` are rejected as `bad_syntax`.
pub(crate) const SYNTAX_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
/// Address shape used to pull candidates out of free text.
pub(crate) const EXTRACTION_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b";

/// Runtime configuration settings used by the email-prober core logic.
#[derive(Clone)]
pub struct Config {
    pub request_timeout: Duration,
    pub user_agent: String,
    pub search_url: String,

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    pub smtp_port: u16,
    pub smtp_timeout: Duration,
    pub smtp_helo_name: String,
    pub smtp_sender_email: String,
    pub max_verification_attempts: u32,
    pub retry_backoff: Duration,
    pub soft_fail_codes: Vec<u16>,

    pub syntax_regex: Regex,
    pub disposable_domains: HashSet<String>,
    pub role_based_prefixes: HashSet<String>,

    pub email_regex: Regex,

    pub max_bulk_rows: usize,
    pub verify_row_delay: Duration,
    pub find_row_delay: Duration,
    pub max_concurrent_jobs: usize,
    pub job_retention: Duration,

    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        let disposable_domains: HashSet<String> = [
            "mailinator.com",
            "10minutemail.com",
            "guerrillamail.com",
            "tempmail.org",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let role_based_prefixes: HashSet<String> = [
            "info", "support", "admin", "sales", "contact", "noreply", "no-reply",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let syntax_regex = Regex::new(SYNTAX_PATTERN)
            .expect("Default syntax regex pattern failed to compile. This is a bug.");
        let email_regex = Regex::new(EXTRACTION_PATTERN)
            .expect("Default email regex pattern failed to compile. This is a bug.");
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            request_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            search_url: "https://www.google.com/search".to_string(),
            dns_timeout: Duration::from_secs(5),
            dns_servers,
            smtp_port: 25,
            smtp_timeout: Duration::from_secs(10),
            smtp_helo_name: "example.com".to_string(),
            smtp_sender_email: "verifier@example.com".to_string(),
            max_verification_attempts: 2,
            retry_backoff: Duration::from_secs(5),
            soft_fail_codes: vec![421, 450, 451, 452, 503],
            syntax_regex,
            disposable_domains,
            role_based_prefixes,
            email_regex,
            max_bulk_rows: 1000,
            verify_row_delay: Duration::from_millis(100),
            find_row_delay: Duration::from_millis(500),
            max_concurrent_jobs: std::thread::available_parallelism()
                .map_or(1, |n| n.get())
                .max(1),
            job_retention: Duration::from_secs(24 * 60 * 60),
            loaded_config_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("search_url", &self.search_url)
            .field("dns_timeout", &self.dns_timeout)
            .field("dns_servers_count", &self.dns_servers.len())
            .field("smtp_port", &self.smtp_port)
            .field("smtp_timeout", &self.smtp_timeout)
            .field("smtp_helo_name", &self.smtp_helo_name)
            .field("smtp_sender_email", &self.smtp_sender_email)
            .field("max_verification_attempts", &self.max_verification_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("soft_fail_codes", &self.soft_fail_codes)
            .field("syntax_regex", &self.syntax_regex.as_str())
            .field("disposable_domains_count", &self.disposable_domains.len())
            .field("role_based_prefixes_count", &self.role_based_prefixes.len())
            .field("email_regex", &self.email_regex.as_str())
            .field("max_bulk_rows", &self.max_bulk_rows)
            .field("verify_row_delay", &self.verify_row_delay)
            .field("find_row_delay", &self.find_row_delay)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("job_retention", &self.job_retention)
            .field("loaded_config_path", &self.loaded_config_path)
            .finish()
    }
}

/// Compiles a user-supplied regex, reporting failures as configuration errors.
pub(crate) fn compile_regex(pattern: &str, label: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        crate::core::error::AppError::Config(format!("Invalid {} regex '{}': {}", label, pattern, e))
    })
}
