//! Discovery engine: tries generated patterns first, then falls back to
//! scraping a web search page for candidates.

use crate::core::classifier::EmailVerifier;
use crate::core::config::Config;
use crate::core::models::{DiscoveryOutcome, DiscoveryReason, EmailAddress, PersonQuery, Reason};
use crate::utils::patterns::generate_email_patterns;
use crate::utils::scrape::{extract_candidates, WebSearcher};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Looks up a deliverable address for a person.
#[async_trait]
pub trait EmailFinder: Send + Sync {
    async fn discover(&self, query: &PersonQuery, proxy: Option<&str>) -> DiscoveryOutcome;
}

/// Builds the search query sent to the search engine.
pub(crate) fn search_query(query: &PersonQuery) -> String {
    format!(
        "\"{} {}\" \"{}\" email",
        query.firstname.trim(),
        query.lastname.trim(),
        query.domain.trim()
    )
}

#[derive(Clone)]
pub struct DiscoveryEngine {
    config: Arc<Config>,
    verifier: Arc<dyn EmailVerifier>,
    searcher: Arc<dyn WebSearcher>,
}

impl DiscoveryEngine {
    pub fn new(
        config: Arc<Config>,
        verifier: Arc<dyn EmailVerifier>,
        searcher: Arc<dyn WebSearcher>,
    ) -> Self {
        Self {
            config,
            verifier,
            searcher,
        }
    }

    /// Verifies `candidates` in order and returns the first deliverable one
    /// together with its inner reason.
    async fn first_deliverable(&self, candidates: &[String]) -> Option<(EmailAddress, Reason)> {
        for candidate in candidates {
            let outcome = self.verifier.verify(candidate).await;
            if outcome.status.is_deliverable() {
                if let Some(address) = EmailAddress::parse(candidate) {
                    return Some((address, outcome.reason));
                }
            }
            tracing::debug!(target: "discovery_task",
                "Candidate {} rejected: {} ({})", candidate, outcome.status, outcome.reason);
        }
        None
    }

    async fn scrape_fallback(&self, query: &PersonQuery, proxy: Option<&str>) -> DiscoveryOutcome {
        let text = match self.searcher.search_text(&search_query(query), proxy).await {
            Ok(Some(text)) => text,
            Ok(None) => return DiscoveryOutcome::not_found(DiscoveryReason::NotFound),
            Err(e) => {
                tracing::warn!(target: "discovery_task",
                    "Search fallback failed for {} {}: {}", query.firstname, query.lastname, e);
                return DiscoveryOutcome::not_found(DiscoveryReason::search_error(&e.to_string()));
            }
        };

        let candidates = extract_candidates(
            &self.config.email_regex,
            &text,
            &query.firstname,
            &query.lastname,
            &query.domain,
        );

        match self.first_deliverable(&candidates).await {
            Some((address, reason)) => {
                DiscoveryOutcome::found(address, DiscoveryReason::FoundScraping(reason))
            }
            None => DiscoveryOutcome::not_found(DiscoveryReason::NotFound),
        }
    }

    pub async fn find(&self, query: &PersonQuery, proxy: Option<&str>) -> DiscoveryOutcome {
        if !query.is_complete() {
            return DiscoveryOutcome::not_found(DiscoveryReason::MissingData);
        }
        let task_label = format!("{} {}@{}", query.firstname, query.lastname, query.domain);
        tracing::info!(target: "discovery_task", "[{}] Starting email discovery", task_label);
        let start_time = Instant::now();

        let patterns = generate_email_patterns(&query.firstname, &query.lastname, &query.domain);
        let outcome = match self.first_deliverable(&patterns).await {
            Some((address, reason)) => {
                DiscoveryOutcome::found(address, DiscoveryReason::FoundPattern(reason))
            }
            None => {
                tracing::debug!(target: "discovery_task",
                    "[{}] No pattern verified, trying search fallback", task_label);
                self.scrape_fallback(query, proxy).await
            }
        };

        tracing::info!(target: "discovery_task",
            "[{}] Finished in {:.2?}: {} ({})",
            task_label,
            start_time.elapsed(),
            outcome.found_email.as_ref().map(|e| e.as_str()).unwrap_or("Not Found"),
            outcome.reason);
        outcome
    }
}

#[async_trait]
impl EmailFinder for DiscoveryEngine {
    async fn discover(&self, query: &PersonQuery, proxy: Option<&str>) -> DiscoveryOutcome {
        self.find(query, proxy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{AppError, Result};
    use crate::core::models::VerificationOutcome;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Verifies addresses from a fixed table; unknown addresses are invalid.
    struct TableVerifier {
        table: HashMap<String, VerificationOutcome>,
        seen: Mutex<Vec<String>>,
    }

    impl TableVerifier {
        fn new(entries: &[(&str, VerificationOutcome)]) -> Self {
            Self {
                table: entries.iter().map(|(e, o)| (e.to_string(), *o)).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmailVerifier for TableVerifier {
        async fn verify(&self, email: &str) -> VerificationOutcome {
            self.seen.lock().push(email.to_string());
            self.table
                .get(email)
                .copied()
                .unwrap_or(VerificationOutcome::invalid(Reason::SmtpReject))
        }
    }

    enum SearchScript {
        Page(&'static str),
        Status,
        Fail,
    }

    struct StubSearcher {
        script: SearchScript,
        queries: Mutex<Vec<(String, Option<String>)>>,
    }

    impl StubSearcher {
        fn new(script: SearchScript) -> Self {
            Self {
                script,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WebSearcher for StubSearcher {
        async fn search_text(&self, query: &str, proxy: Option<&str>) -> Result<Option<String>> {
            self.queries
                .lock()
                .push((query.to_string(), proxy.map(str::to_string)));
            match self.script {
                SearchScript::Page(text) => Ok(Some(text.to_string())),
                SearchScript::Status => Ok(None),
                SearchScript::Fail => Err(AppError::Generic(anyhow::anyhow!(
                    "connection reset by peer while reading the search results page body"
                ))),
            }
        }
    }

    fn engine(verifier: Arc<TableVerifier>, searcher: Arc<StubSearcher>) -> DiscoveryEngine {
        DiscoveryEngine::new(Arc::new(Config::default()), verifier, searcher)
    }

    fn john() -> PersonQuery {
        PersonQuery::new("John", "Doe", "example.com")
    }

    #[tokio::test]
    async fn test_first_deliverable_pattern_wins() {
        let verifier = Arc::new(TableVerifier::new(&[
            ("johndoe@example.com", VerificationOutcome::risky(Reason::DomainAcceptsAll)),
            ("jdoe@example.com", VerificationOutcome::valid(Reason::SmtpOk)),
        ]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Fail));
        let outcome = engine(verifier.clone(), searcher.clone())
            .find(&john(), None)
            .await;

        assert_eq!(outcome.found_email.unwrap().as_str(), "johndoe@example.com");
        assert_eq!(outcome.reason.to_string(), "found_pattern_domain_accepts_all");
        assert_eq!(
            *verifier.seen.lock(),
            vec!["john.doe@example.com", "john@example.com", "johndoe@example.com"]
        );
        assert!(searcher.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_scraping_fallback() {
        let verifier = Arc::new(TableVerifier::new(&[(
            "doe.john@example.com",
            VerificationOutcome::valid(Reason::SmtpOk),
        )]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Page(
            "Team: sales@example.com john@other.org doe.john@example.com",
        )));
        let outcome = engine(verifier.clone(), searcher.clone())
            .find(&john(), Some("http://proxy.local:8080"))
            .await;

        assert_eq!(outcome.found_email.unwrap().as_str(), "doe.john@example.com");
        assert_eq!(outcome.reason.to_string(), "found_scraping_smtp_ok");
        // seven patterns, then the single surviving candidate
        assert_eq!(verifier.seen.lock().len(), 8);

        let queries = searcher.queries.lock();
        assert_eq!(queries[0].0, "\"John Doe\" \"example.com\" email");
        assert_eq!(queries[0].1.as_deref(), Some("http://proxy.local:8080"));
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let verifier = Arc::new(TableVerifier::new(&[]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Page("no addresses")));
        let outcome = engine(verifier, searcher).find(&john(), None).await;
        assert_eq!(outcome, DiscoveryOutcome::not_found(DiscoveryReason::NotFound));

        let verifier = Arc::new(TableVerifier::new(&[]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Status));
        let outcome = engine(verifier, searcher).find(&john(), None).await;
        assert_eq!(outcome.reason.to_string(), "not_valid_email_found");
    }

    #[tokio::test]
    async fn test_search_error_is_truncated() {
        let verifier = Arc::new(TableVerifier::new(&[]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Fail));
        let outcome = engine(verifier, searcher).find(&john(), None).await;

        assert!(outcome.found_email.is_none());
        let reason = outcome.reason.to_string();
        let detail = reason
            .strip_prefix("no_valid_email_found_error_")
            .expect("error prefix");
        assert_eq!(detail.chars().count(), 50);
        assert!(detail.starts_with("Generic Error: connection reset"));
    }

    #[tokio::test]
    async fn test_incomplete_query_is_missing_data() {
        let verifier = Arc::new(TableVerifier::new(&[]));
        let searcher = Arc::new(StubSearcher::new(SearchScript::Fail));
        let outcome = engine(verifier.clone(), searcher)
            .find(&PersonQuery::new("John", "", "example.com"), None)
            .await;
        assert_eq!(outcome, DiscoveryOutcome::not_found(DiscoveryReason::MissingData));
        assert!(verifier.seen.lock().is_empty());
    }
}
