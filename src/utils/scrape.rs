//! Web search fallback: fetches a search result page and pulls candidate
//! addresses out of its visible text.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Runs a web search and returns the result page as plain text.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// `Ok(None)` means the search engine answered with a non-success status,
    /// which is not an error but yields no candidates. `proxy` is an optional
    /// proxy URL to route the request through.
    async fn search_text(&self, query: &str, proxy: Option<&str>) -> Result<Option<String>>;
}

/// [`WebSearcher`] that issues `GET <search_url>?q=<query>` and strips the HTML.
#[derive(Clone)]
pub struct HttpSearcher {
    client: Client,
    search_url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpSearcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
        })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        match proxy.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(self.client.clone()),
            Some(proxy_url) => {
                tracing::debug!(target: "discovery_task", "Routing search through proxy {}", proxy_url);
                Ok(Client::builder()
                    .user_agent(&self.user_agent)
                    .timeout(self.timeout)
                    .proxy(reqwest::Proxy::all(proxy_url)?)
                    .build()?)
            }
        }
    }
}

#[async_trait]
impl WebSearcher for HttpSearcher {
    async fn search_text(&self, query: &str, proxy: Option<&str>) -> Result<Option<String>> {
        let url = Url::parse_with_params(&self.search_url, &[("q", query)])?;
        tracing::debug!(target: "discovery_task", "Searching: {}", url);

        let response = self.client_for(proxy)?.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "discovery_task", "Search returned HTTP {} for query {}", status, query);
            return Ok(None);
        }

        let body = response.text().await?;
        Ok(Some(html_to_text(&body)))
    }
}

/// Concatenates every text node of the document with no separator, so an
/// address split by inline highlighting (`jane@<em>acme.io</em>`) stays whole.
pub(crate) fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect()
}

/// Finds addresses in `text` that sit on `domain` and whose local part
/// contains the first or last name, case-insensitively.
///
/// Returns unique matches (compared case-insensitively) in page order.
pub(crate) fn extract_candidates(
    email_regex: &Regex,
    text: &str,
    first_name: &str,
    last_name: &str,
    domain: &str,
) -> Vec<String> {
    let first = first_name.trim().to_lowercase();
    let last = last_name.trim().to_lowercase();
    let domain = domain.trim();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for found in email_regex.find_iter(text) {
        let email = found.as_str();
        let Some((local, email_domain)) = email.rsplit_once('@') else {
            continue;
        };
        if !email_domain.eq_ignore_ascii_case(domain) {
            continue;
        }
        let local_lower = local.to_lowercase();
        let name_match = (!first.is_empty() && local_lower.contains(&first))
            || (!last.is_empty() && local_lower.contains(&last));
        if name_match && seen.insert(email.to_lowercase()) {
            candidates.push(email.to_string());
        }
    }

    tracing::debug!(target: "discovery_task", "Extracted {} candidate(s) on {}", candidates.len(), domain);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex() -> Regex {
        Config::default().email_regex
    }

    #[test]
    fn test_html_to_text() {
        let text = html_to_text("<html><body><p>Reach <b>jane.roe@acme.io</b></p></body></html>");
        assert!(text.contains("jane.roe@acme.io"));
        assert!(!text.contains("<b>"));
    }

    #[test]
    fn test_inline_highlighting_keeps_address_whole() {
        let text = html_to_text(
            "<div><span>jane.roe@<em>acme.io</em></span> or <b>roe</b>@acme.io</div>",
        );
        assert!(text.contains("jane.roe@acme.io"));
        let found = extract_candidates(&regex(), &text, "Jane", "Roe", "acme.io");
        assert_eq!(found, vec!["jane.roe@acme.io", "roe@acme.io"]);
    }

    #[test]
    fn test_extract_filters_domain_and_name() {
        let text = "Contact Jane.Roe@ACME.io or jroe@acme.io, \
                    sales@acme.io, jane@other.com, roe.j@acme.io.evil.com, jane.roe@acme.io";
        let found = extract_candidates(&regex(), text, "Jane", "Roe", "acme.io");
        assert_eq!(found, vec!["Jane.Roe@ACME.io", "jroe@acme.io"]);
    }

    #[test]
    fn test_extract_empty_when_nothing_matches() {
        let found = extract_candidates(&regex(), "no addresses here", "Jane", "Roe", "acme.io");
        assert!(found.is_empty());
    }
}
