// src/utils/smtp/result.rs
//! Maps the final RCPT response code of a probe to a verification outcome.

use crate::core::models::{Reason, VerificationOutcome};

/// The only code that counts as acceptance, for both probes.
pub const SMTP_ACCEPTED: u16 = 250;
/// Explicit mailbox rejection.
pub const SMTP_REJECTED: u16 = 550;

/// Code observed for a RCPT probe. `None` is the "no response" sentinel used
/// when the session failed before a reply code could be read.
pub type ProbeCode = Option<u16>;

/// Outcome of the target probe after the retry policy has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProbeResult {
    /// Code from the last attempt made.
    pub code: ProbeCode,
    /// Number of sessions opened, including the first.
    pub attempts: u32,
}

impl TargetProbeResult {
    /// Applies the code table to the final code.
    pub fn outcome(&self, soft_fail_codes: &[u16]) -> VerificationOutcome {
        outcome_for_code(self.code, soft_fail_codes)
    }
}

/// Final code to outcome table.
///
/// | code       | status  | reason                  |
/// |------------|---------|-------------------------|
/// | 250        | valid   | smtp_ok                 |
/// | none       | risky   | smtp_timeout            |
/// | soft-fail  | risky   | smtp_soft_fail_\<code\> |
/// | 550        | invalid | smtp_reject             |
/// | other      | invalid | smtp_\<code\>           |
pub fn outcome_for_code(code: ProbeCode, soft_fail_codes: &[u16]) -> VerificationOutcome {
    match code {
        Some(SMTP_ACCEPTED) => VerificationOutcome::valid(Reason::SmtpOk),
        None => VerificationOutcome::risky(Reason::SmtpTimeout),
        Some(c) if soft_fail_codes.contains(&c) => {
            VerificationOutcome::risky(Reason::SmtpSoftFail(c))
        }
        Some(SMTP_REJECTED) => VerificationOutcome::invalid(Reason::SmtpReject),
        Some(c) => VerificationOutcome::invalid(Reason::SmtpCode(c)),
    }
}
