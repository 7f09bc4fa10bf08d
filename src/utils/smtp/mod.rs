//! SMTP probing: session client, reply interpretation and retry policy.

pub(crate) mod client;
mod error;
pub(crate) mod result;
pub(crate) mod retry;

pub use client::{test_smtp_connectivity, SmtpProber, SmtpVerifier};
pub use result::{outcome_for_code, ProbeCode, TargetProbeResult};
pub use retry::RetryPolicy;
