use crate::core::classifier::{DeliverabilityClassifier, EmailVerifier};
use crate::core::config::Config;
use crate::core::discovery::{DiscoveryEngine, EmailFinder};
use crate::core::error::Result;
use crate::core::models::{DiscoveryOutcome, PersonQuery, VerificationOutcome};
use crate::jobs::{InMemoryJobStore, JobRunner, JobStore};
use crate::utils::dns::{DnsMxResolver, MxResolver};
use crate::utils::scrape::{HttpSearcher, WebSearcher};
use crate::utils::smtp::{SmtpProber, SmtpVerifier};

use std::sync::Arc;

/// Entry point that wires the classifier, discovery engine and job runner
/// to a shared configuration.
#[derive(Clone)]
pub struct EmailSleuth {
    config: Arc<Config>,
    classifier: Arc<DeliverabilityClassifier>,
    discovery: Arc<DiscoveryEngine>,
    jobs: JobRunner,
}

impl EmailSleuth {
    /// Creates an instance backed by the real DNS, SMTP and HTTP adapters.
    pub(crate) async fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Initializing EmailSleuth components...");
        let resolver = Arc::new(DnsMxResolver::new(config)?);
        tracing::debug!("DNS resolver initialized.");
        let prober = Arc::new(SmtpVerifier::new(config)?);
        tracing::debug!("SMTP prober initialized.");
        let searcher = Arc::new(HttpSearcher::new(config)?);
        tracing::debug!("HTTP searcher initialized.");

        let sleuth = Self::with_components(
            Arc::new(config.clone()),
            resolver,
            prober,
            searcher,
            Arc::new(InMemoryJobStore::new()),
        );
        tracing::info!("EmailSleuth initialized successfully.");
        Ok(sleuth)
    }

    /// Assembles an instance from caller-supplied adapters. Must run inside a
    /// Tokio runtime.
    pub fn with_components(
        config: Arc<Config>,
        resolver: Arc<dyn MxResolver>,
        prober: Arc<dyn SmtpProber>,
        searcher: Arc<dyn WebSearcher>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let classifier = Arc::new(DeliverabilityClassifier::new(
            Arc::clone(&config),
            resolver,
            prober,
        ));
        let discovery = Arc::new(DiscoveryEngine::new(
            Arc::clone(&config),
            classifier.clone() as Arc<dyn EmailVerifier>,
            searcher,
        ));
        let jobs = JobRunner::new(
            Arc::clone(&config),
            store,
            classifier.clone() as Arc<dyn EmailVerifier>,
            discovery.clone() as Arc<dyn EmailFinder>,
        );
        Self {
            config,
            classifier,
            discovery,
            jobs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classifies a single address. The proxy hint is accepted for API
    /// symmetry; probes always connect directly.
    pub async fn verify_email(&self, email: &str, proxy: Option<&str>) -> VerificationOutcome {
        if let Some(proxy) = proxy {
            tracing::debug!(target: "classifier", "Ignoring proxy {} for SMTP verification", proxy);
        }
        self.classifier.classify(email).await
    }

    /// Looks up an address for a person, routing the search fallback through
    /// `proxy` when given.
    pub async fn find_email(&self, query: &PersonQuery, proxy: Option<&str>) -> DiscoveryOutcome {
        self.discovery.find(query, proxy).await
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.jobs
    }
}
