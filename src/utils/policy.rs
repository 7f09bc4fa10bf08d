//! Cheap local checks run before any DNS or SMTP work.

use crate::core::config::Config;
use crate::core::models::{EmailAddress, Reason, VerificationOutcome};

/// Returns a terminal outcome when the address fails syntax, sits on a
/// disposable domain, or uses a role-based local part. `None` means the
/// address should continue to DNS and SMTP checks.
///
/// Checks run in that order. Domain and local part are compared
/// case-insensitively by exact match against the configured sets.
pub(crate) fn classify_local(config: &Config, email: &str) -> Option<VerificationOutcome> {
    let address = match EmailAddress::parse(email) {
        Some(addr) if config.syntax_regex.is_match(addr.as_str()) => addr,
        _ => {
            tracing::debug!(target: "classifier", "<{}> failed syntax check", email);
            return Some(VerificationOutcome::invalid(Reason::BadSyntax));
        }
    };

    if config
        .disposable_domains
        .contains(&address.domain().to_lowercase())
    {
        tracing::debug!(target: "classifier", "<{}> uses a disposable domain", email);
        return Some(VerificationOutcome::invalid(Reason::DisposableDomain));
    }

    if config
        .role_based_prefixes
        .contains(&address.local().to_lowercase())
    {
        tracing::debug!(target: "classifier", "<{}> is a role-based address", email);
        return Some(VerificationOutcome::invalid(Reason::RoleBased));
    }

    None
}
