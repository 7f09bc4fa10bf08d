//! MX resolution over trust-dns-resolver.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// Resolves the mail exchange host for a domain.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Returns the exchange host of the first MX record in the answer.
    async fn resolve_mx(&self, domain: &str) -> Result<String>;
}

/// Builds a Tokio resolver from [`Config`]. An empty server list falls back to
/// the system configuration.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    if config.dns_servers.is_empty() {
        tracing::debug!(target: "dns_task", "Using system DNS configuration.");
        return TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
            AppError::Initialization(format!("Failed to read system DNS configuration: {}", e))
        });
    }

    let ips = config
        .dns_servers
        .iter()
        .map(|s| {
            s.trim().parse::<IpAddr>().map_err(|e| {
                AppError::Config(format!("Invalid DNS server address '{}': {}", s, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
    let resolver_config = ResolverConfig::from_parts(None, vec![], group);
    tracing::debug!(target: "dns_task", "Using {} configured DNS servers.", ips.len());
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// [`MxResolver`] backed by a shared [`TokioAsyncResolver`].
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            resolver: create_resolver(config)?,
        })
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<String> {
        tracing::debug!(target: "dns_task", "Resolving MX for {}", domain);
        let lookup = self.resolver.mx_lookup(domain).await.map_err(|e| {
            let mapped = match e.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. }
                    if *response_code == ResponseCode::NXDomain =>
                {
                    AppError::NxDomain(domain.to_string())
                }
                ResolveErrorKind::NoRecordsFound { .. } => AppError::NoDnsRecords(domain.to_string()),
                ResolveErrorKind::Timeout => AppError::DnsTimeout(domain.to_string()),
                _ => AppError::Dns(e),
            };
            tracing::debug!(target: "dns_task", "MX lookup for {} failed: {}", domain, mapped);
            mapped
        })?;

        // The first record of the answer is used as-is, without preference sorting.
        let first = lookup
            .iter()
            .next()
            .ok_or_else(|| AppError::NoDnsRecords(domain.to_string()))?;
        let exchange = first.exchange().to_utf8();
        let host = exchange.trim_end_matches('.').to_string();
        if host.is_empty() {
            // Null MX (RFC 7505): the domain explicitly accepts no mail.
            return Err(AppError::NoDnsRecords(domain.to_string()));
        }

        tracing::debug!(target: "dns_task", "MX for {} is {} (preference {})", domain, host, first.preference());
        Ok(host)
    }
}
