//! Bounded retry policy for the target RCPT probe.

use super::result::ProbeCode;
use crate::core::config::Config;
use std::time::Duration;

/// Retry only on soft-fail codes, with a fixed backoff, up to `max_attempts`
/// sessions in total. The "no response" sentinel is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub soft_fail_codes: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_verification_attempts.max(1),
            backoff: config.retry_backoff,
            soft_fail_codes: config.soft_fail_codes.clone(),
        }
    }

    pub fn is_soft_fail(&self, code: ProbeCode) -> bool {
        code.is_some_and(|c| self.soft_fail_codes.contains(&c))
    }

    /// Whether another session should be opened after `attempts_made` attempts
    /// that ended with `code`.
    pub fn should_retry(&self, code: ProbeCode, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts && self.is_soft_fail(code)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
