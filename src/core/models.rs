//! Core value types shared by the classifier, the discovery engine and the job runner.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// An address split into its local part and domain.
///
/// Construction does not check syntax; the policy filter decides whether the
/// raw string is acceptable before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    raw: String,
    local: String,
    domain: String,
}

impl EmailAddress {
    /// Splits `raw` on its first `@`. Returns `None` when there is no `@`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (local, domain) = trimmed.split_once('@')?;
        Some(Self {
            raw: trimmed.to_string(),
            local: local.to_string(),
            domain: domain.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for EmailAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Deliverability verdict. Consumers branch on this, humans read the [`Reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Valid,
    Risky,
    Invalid,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Risky => "risky",
            VerificationStatus::Invalid => "invalid",
        }
    }

    /// `valid` and `risky` both count as a usable address during discovery.
    pub fn is_deliverable(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::Risky)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason attached to a [`VerificationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    BadSyntax,
    DisposableDomain,
    RoleBased,
    NoMx,
    DomainAcceptsAll,
    SmtpOk,
    SmtpTimeout,
    SmtpSoftFail(u16),
    SmtpReject,
    SmtpCode(u16),
    EmptyEmail,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::BadSyntax => f.write_str("bad_syntax"),
            Reason::DisposableDomain => f.write_str("disposable_domain"),
            Reason::RoleBased => f.write_str("role_based"),
            Reason::NoMx => f.write_str("no_mx"),
            Reason::DomainAcceptsAll => f.write_str("domain_accepts_all"),
            Reason::SmtpOk => f.write_str("smtp_ok"),
            Reason::SmtpTimeout => f.write_str("smtp_timeout"),
            Reason::SmtpSoftFail(code) => write!(f, "smtp_soft_fail_{}", code),
            Reason::SmtpReject => f.write_str("smtp_reject"),
            Reason::SmtpCode(code) => write!(f, "smtp_{}", code),
            Reason::EmptyEmail => f.write_str("empty_email"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Final status/reason pair for one address. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub reason: Reason,
}

impl VerificationOutcome {
    pub fn new(status: VerificationStatus, reason: Reason) -> Self {
        Self { status, reason }
    }

    pub fn valid(reason: Reason) -> Self {
        Self::new(VerificationStatus::Valid, reason)
    }

    pub fn risky(reason: Reason) -> Self {
        Self::new(VerificationStatus::Risky, reason)
    }

    pub fn invalid(reason: Reason) -> Self {
        Self::new(VerificationStatus::Invalid, reason)
    }
}

/// Longest error excerpt carried in a [`DiscoveryReason::SearchError`] tag.
pub const SEARCH_ERROR_EXCERPT_CHARS: usize = 50;

/// Machine-readable reason attached to a [`DiscoveryOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryReason {
    /// A generated pattern verified; carries the inner verification reason.
    FoundPattern(Reason),
    /// A scraped candidate verified; carries the inner verification reason.
    FoundScraping(Reason),
    /// Nothing verified.
    NotFound,
    /// The search fallback itself failed; carries the truncated error text.
    SearchError(String),
    /// A required name or domain was empty.
    MissingData,
}

impl DiscoveryReason {
    /// Builds a [`DiscoveryReason::SearchError`], keeping at most
    /// [`SEARCH_ERROR_EXCERPT_CHARS`] characters of the message.
    pub fn search_error(message: &str) -> Self {
        DiscoveryReason::SearchError(message.chars().take(SEARCH_ERROR_EXCERPT_CHARS).collect())
    }
}

impl fmt::Display for DiscoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryReason::FoundPattern(inner) => write!(f, "found_pattern_{}", inner),
            DiscoveryReason::FoundScraping(inner) => write!(f, "found_scraping_{}", inner),
            DiscoveryReason::NotFound => f.write_str("not_valid_email_found"),
            DiscoveryReason::SearchError(msg) => write!(f, "no_valid_email_found_error_{}", msg),
            DiscoveryReason::MissingData => f.write_str("missing_data"),
        }
    }
}

impl Serialize for DiscoveryReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of a discovery attempt. `found_email` is set only when a candidate
/// reached `valid` or `risky`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    pub found_email: Option<EmailAddress>,
    pub reason: DiscoveryReason,
}

impl DiscoveryOutcome {
    pub fn found(email: EmailAddress, reason: DiscoveryReason) -> Self {
        Self {
            found_email: Some(email),
            reason,
        }
    }

    pub fn not_found(reason: DiscoveryReason) -> Self {
        Self {
            found_email: None,
            reason,
        }
    }
}

/// A person to look up. All three fields must be non-empty for discovery to
/// get past local validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonQuery {
    pub firstname: String,
    pub lastname: String,
    pub domain: String,
}

impl PersonQuery {
    pub fn new(
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
            domain: domain.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.firstname.trim().is_empty()
            && !self.lastname.trim().is_empty()
            && !self.domain.trim().is_empty()
    }
}
