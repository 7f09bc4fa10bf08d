//! Deliverability classifier: policy filter, MX resolution, catch-all probe,
//! then the target probe with bounded retry. Each stage is terminal once it
//! reaches a decision.

use crate::core::config::Config;
use crate::core::models::{EmailAddress, Reason, VerificationOutcome};
use crate::utils::dns::MxResolver;
use crate::utils::policy::classify_local;
use crate::utils::smtp::result::SMTP_ACCEPTED;
use crate::utils::smtp::{RetryPolicy, SmtpProber, TargetProbeResult};

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

/// Produces a [`VerificationOutcome`] for one address. Never fails: network
/// trouble degrades the outcome instead.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, email: &str) -> VerificationOutcome;
}

/// Local part for the catch-all probe. A random mailbox that should not exist.
fn synthetic_local_part() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "no-reply-does-not-exist-{}-{:x}",
        rng.gen_range(10000..99999),
        rng.gen::<u32>()
    )
}

/// Orchestrates the checks that decide whether an address is deliverable.
#[derive(Clone)]
pub struct DeliverabilityClassifier {
    config: Arc<Config>,
    resolver: Arc<dyn MxResolver>,
    prober: Arc<dyn SmtpProber>,
    retry_policy: RetryPolicy,
}

impl DeliverabilityClassifier {
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<dyn MxResolver>,
        prober: Arc<dyn SmtpProber>,
    ) -> Self {
        let retry_policy = RetryPolicy::from_config(&config);
        Self {
            config,
            resolver,
            prober,
            retry_policy,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Runs the full pipeline for `email`.
    pub async fn classify(&self, email: &str) -> VerificationOutcome {
        let start_time = Instant::now();
        let outcome = self.run_pipeline(email.trim()).await;
        tracing::info!(target: "classifier",
            "<{}> -> {} ({}) in {:.2?}", email, outcome.status, outcome.reason, start_time.elapsed());
        outcome
    }

    async fn run_pipeline(&self, email: &str) -> VerificationOutcome {
        if let Some(outcome) = classify_local(&self.config, email) {
            return outcome;
        }
        let Some(address) = EmailAddress::parse(email) else {
            return VerificationOutcome::invalid(Reason::BadSyntax);
        };

        let mail_server = match self.resolver.resolve_mx(address.domain()).await {
            Ok(host) => host,
            Err(e) => {
                tracing::debug!(target: "classifier", "<{}> no usable MX: {}", email, e);
                return VerificationOutcome::invalid(Reason::NoMx);
            }
        };

        if self.is_accept_all(address.domain(), &mail_server).await {
            return VerificationOutcome::risky(Reason::DomainAcceptsAll);
        }

        let probe = self.probe_target(address.as_str(), &mail_server).await;
        probe.outcome(&self.retry_policy.soft_fail_codes)
    }

    /// Probes a synthetic mailbox. Only an explicit 250 flags the domain as
    /// accept-all; any failure counts as "not accept-all".
    async fn is_accept_all(&self, domain: &str, mail_server: &str) -> bool {
        let synthetic = format!("{}@{}", synthetic_local_part(), domain);
        let code = self.prober.rcpt_probe(mail_server, &synthetic).await;
        let accept_all = code == Some(SMTP_ACCEPTED);
        if accept_all {
            tracing::info!(target: "classifier",
                "Domain {} (MX: {}) accepted synthetic mailbox {}", domain, mail_server, synthetic);
        } else {
            tracing::debug!(target: "classifier",
                "Catch-all probe for {} returned {:?}; treating as not accept-all", domain, code);
        }
        accept_all
    }

    /// Target RCPT probe under the retry policy.
    async fn probe_target(&self, email: &str, mail_server: &str) -> TargetProbeResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let code = self.prober.rcpt_probe(mail_server, email).await;
            tracing::debug!(target: "classifier",
                "Target probe {}/{} for <{}> via {} returned {:?}",
                attempts, self.retry_policy.max_attempts, email, mail_server, code);

            if !self.retry_policy.should_retry(code, attempts) {
                return TargetProbeResult { code, attempts };
            }
            tracing::debug!(target: "classifier",
                "Soft-fail for <{}>; retrying in {:?}", email, self.retry_policy.backoff);
            tokio::time::sleep(self.retry_policy.backoff).await;
        }
    }
}

#[async_trait]
impl EmailVerifier for DeliverabilityClassifier {
    async fn verify(&self, email: &str) -> VerificationOutcome {
        self.classify(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;
    use crate::core::error::{AppError, Result};
    use crate::core::models::VerificationStatus;
    use crate::utils::smtp::ProbeCode;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    struct StubResolver {
        hosts: HashMap<String, String>,
    }

    impl StubResolver {
        fn with(domain: &str, host: &str) -> Self {
            Self {
                hosts: HashMap::from([(domain.to_string(), host.to_string())]),
            }
        }
    }

    #[async_trait]
    impl MxResolver for StubResolver {
        async fn resolve_mx(&self, domain: &str) -> Result<String> {
            self.hosts
                .get(domain)
                .cloned()
                .ok_or_else(|| AppError::NxDomain(domain.to_string()))
        }
    }

    /// Answers catch-all probes with a fixed code and target probes from a script.
    struct ScriptedProber {
        catch_all_code: ProbeCode,
        target_codes: Mutex<VecDeque<ProbeCode>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn new(catch_all_code: ProbeCode, target_codes: Vec<ProbeCode>) -> Self {
            Self {
                catch_all_code,
                target_codes: Mutex::new(target_codes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn target_calls(&self) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|r| !r.starts_with("no-reply-does-not-exist-"))
                .count()
        }
    }

    #[async_trait]
    impl SmtpProber for ScriptedProber {
        async fn rcpt_probe(&self, _mail_server: &str, recipient: &str) -> ProbeCode {
            self.calls.lock().push(recipient.to_string());
            if recipient.starts_with("no-reply-does-not-exist-") {
                return self.catch_all_code;
            }
            self.target_codes.lock().pop_front().unwrap_or(None)
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(
            ConfigBuilder::new()
                .retry_backoff(Duration::ZERO)
                .build()
                .unwrap(),
        )
    }

    fn classifier(prober: Arc<ScriptedProber>) -> DeliverabilityClassifier {
        DeliverabilityClassifier::new(
            test_config(),
            Arc::new(StubResolver::with("example.com", "mx.example.com")),
            prober,
        )
    }

    #[tokio::test]
    async fn test_local_rejections_skip_network() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(250)]));
        let c = classifier(prober.clone());

        assert_eq!(c.classify("not-an-email").await.reason, Reason::BadSyntax);
        assert_eq!(
            c.classify("x@MAILINATOR.com").await.reason,
            Reason::DisposableDomain
        );
        assert_eq!(c.classify("Admin@example.com").await.reason, Reason::RoleBased);
        assert!(prober.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_domain_is_no_mx() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(250)]));
        let outcome = classifier(prober.clone()).classify("john@nowhere.test").await;
        assert_eq!(outcome, VerificationOutcome::invalid(Reason::NoMx));
        assert!(prober.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_accept_all_short_circuits() {
        let prober = Arc::new(ScriptedProber::new(Some(250), vec![Some(550)]));
        let outcome = classifier(prober.clone()).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::risky(Reason::DomainAcceptsAll));
        assert_eq!(prober.target_calls(), 0);
    }

    #[tokio::test]
    async fn test_catch_all_failure_is_ignored() {
        let prober = Arc::new(ScriptedProber::new(None, vec![Some(250)]));
        let outcome = classifier(prober).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::valid(Reason::SmtpOk));
    }

    #[tokio::test]
    async fn test_soft_fail_then_ok_is_valid() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(450), Some(250)]));
        let outcome = classifier(prober.clone()).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::valid(Reason::SmtpOk));
        assert_eq!(prober.target_calls(), 2);
    }

    #[tokio::test]
    async fn test_soft_fail_twice_retries_once() {
        let prober = Arc::new(ScriptedProber::new(
            Some(550),
            vec![Some(450), Some(450), Some(250)],
        ));
        let outcome = classifier(prober.clone()).classify("john@example.com").await;
        assert_eq!(outcome.status, VerificationStatus::Risky);
        assert_eq!(outcome.reason.to_string(), "smtp_soft_fail_450");
        assert_eq!(prober.target_calls(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_timeout_or_reject() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![None, Some(250)]));
        let outcome = classifier(prober.clone()).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::risky(Reason::SmtpTimeout));
        assert_eq!(prober.target_calls(), 1);

        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(550), Some(250)]));
        let outcome = classifier(prober.clone()).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::invalid(Reason::SmtpReject));
        assert_eq!(prober.target_calls(), 1);
    }

    #[tokio::test]
    async fn test_other_codes_are_invalid() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(553)]));
        let outcome = classifier(prober).classify("john@example.com").await;
        assert_eq!(outcome, VerificationOutcome::invalid(Reason::SmtpCode(553)));
    }

    #[tokio::test]
    async fn test_catch_all_runs_before_target() {
        let prober = Arc::new(ScriptedProber::new(Some(550), vec![Some(250)]));
        classifier(prober.clone()).classify("john@example.com").await;
        let calls = prober.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("no-reply-does-not-exist-"));
        assert!(calls[0].ends_with("@example.com"));
        assert_eq!(calls[1], "john@example.com");
    }
}
