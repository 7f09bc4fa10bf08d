//! # Email Prober Core Library
//!
//! This crate classifies email addresses by deliverability (syntax and policy
//! checks, MX lookup, SMTP catch-all and RCPT probes) and discovers likely
//! addresses for named people from common patterns and a web search fallback.
//!
//! Single lookups go through [`EmailSleuth`]; batches of up to
//! `max_bulk_rows` rows run as background jobs on its [`JobRunner`].

mod core;
mod jobs;
mod utils;

pub use crate::core::classifier::{DeliverabilityClassifier, EmailVerifier};
pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::discovery::{DiscoveryEngine, EmailFinder};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    DiscoveryOutcome, DiscoveryReason, EmailAddress, PersonQuery, Reason, VerificationOutcome,
    VerificationStatus,
};
pub use crate::core::sleuth::EmailSleuth;
pub use crate::jobs::{
    InMemoryJobStore, InputRow, Job, JobKind, JobProgress, JobReceipt, JobRunner, JobStatus,
    JobStore, ResultFilter, ResultRow,
};
pub use crate::utils::dns::{DnsMxResolver, MxResolver};
pub use crate::utils::patterns::generate_email_patterns;
pub use crate::utils::scrape::{HttpSearcher, WebSearcher};
pub use crate::utils::smtp::{outcome_for_code, ProbeCode, RetryPolicy, SmtpProber, SmtpVerifier};

use crate::utils::smtp::test_smtp_connectivity;

/// Builds the DNS resolver, SMTP prober and HTTP searcher, and starts the job
/// dispatcher. Must be called from within a Tokio runtime.
pub async fn initialize_sleuth(config: &Config) -> Result<EmailSleuth> {
    EmailSleuth::new(config).await
}

/// Performs an early check for outbound SMTP connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    test_smtp_connectivity(config).await
}
