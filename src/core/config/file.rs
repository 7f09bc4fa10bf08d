//! Defines the structure mirroring the TOML configuration file format.

use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) network: NetworkConfig,
    #[serde(default)]
    pub(crate) dns: DnsConfig,
    #[serde(default)]
    pub(crate) smtp: SmtpConfig,
    #[serde(default)]
    pub(crate) policy: PolicyConfig,
    #[serde(default)]
    pub(crate) scraping: ScrapingConfig,
    #[serde(default)]
    pub(crate) jobs: JobsConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct NetworkConfig {
    pub(crate) request_timeout: Option<u64>,
    pub(crate) user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsConfig {
    pub(crate) dns_timeout: Option<u64>,
    pub(crate) dns_servers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SmtpConfig {
    pub(crate) smtp_port: Option<u16>,
    pub(crate) smtp_timeout: Option<u64>,
    pub(crate) smtp_helo_name: Option<String>,
    pub(crate) smtp_sender_email: Option<String>,
    pub(crate) max_verification_attempts: Option<u32>,
    pub(crate) retry_backoff_ms: Option<u64>,
    pub(crate) soft_fail_codes: Option<Vec<u16>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct PolicyConfig {
    pub(crate) syntax_pattern: Option<String>,
    pub(crate) disposable_domains: Option<Vec<String>>,
    pub(crate) role_based_prefixes: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScrapingConfig {
    pub(crate) search_url: Option<String>,
    pub(crate) email_pattern: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct JobsConfig {
    pub(crate) max_bulk_rows: Option<usize>,
    pub(crate) verify_row_delay_ms: Option<u64>,
    pub(crate) find_row_delay_ms: Option<u64>,
    pub(crate) max_concurrent_jobs: Option<usize>,
    pub(crate) job_retention_secs: Option<u64>,
}
