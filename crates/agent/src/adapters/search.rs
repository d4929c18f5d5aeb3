use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use atlas_core::config::SearchConfig;
use atlas_core::domain::results::WebSearchResult;
use atlas_core::errors::truncate_for_log;
use atlas_core::language::ResponseLanguage;
use atlas_core::sanitizer;

use super::AdapterError;

const SERVICE: &str = "web search";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[async_trait]
pub trait WebSearchApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, AdapterError>;
}

pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    max_results: usize,
    search_depth: String,
}

impl TavilyClient {
    pub fn from_config(config: &SearchConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| AdapterError::Transport { service: SERVICE, message: error.to_string() })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
        })
    }
}

#[async_trait]
impl WebSearchApi for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, AdapterError> {
        let api_key = self.api_key.as_ref().ok_or(AdapterError::NotConfigured { service: SERVICE })?;
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&json!({
                "query": query,
                "max_results": self.max_results,
                "search_depth": self.search_depth,
                "include_answer": true,
            }))
            .send()
            .await
            .map_err(|error| AdapterError::Transport {
                service: SERVICE,
                message: truncate_for_log(&error.without_url().to_string(), 200),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AdapterError::RateLimited { service: SERVICE });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message: truncate_for_log(&body, 200),
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|error| AdapterError::Decode { service: SERVICE, message: error.to_string() })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchSettings {
    pub max_links: usize,
    pub max_content_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { max_links: 5, max_content_chars: 1_000 }
    }
}

impl From<&SearchConfig> for SearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self { max_links: config.max_results, max_content_chars: config.max_content_chars }
    }
}

/// Consolidated search result. Failures are folded into a localized summary with no links.
pub async fn run_web_search(
    api: &dyn WebSearchApi,
    query: &str,
    settings: SearchSettings,
    language: ResponseLanguage,
) -> WebSearchResult {
    let started = Instant::now();
    let response = match api.search(query).await {
        Ok(response) => response,
        Err(error) => {
            warn!(
                event_name = "agent.adapter.search.failed",
                duration_ms = started.elapsed().as_millis() as u64,
                error = %truncate_for_log(&error.to_string(), 200),
                "web search failed"
            );
            let summary = match error {
                AdapterError::NotConfigured { .. } => language.search_not_configured().to_string(),
                AdapterError::RateLimited { .. } => language.rate_limited().to_string(),
                other => language.search_failed(&truncate_for_log(&other.to_string(), 100)),
            };
            return WebSearchResult { summary, links: Vec::new(), answer: None, found: false };
        }
    };

    let links: Vec<String> = response
        .results
        .iter()
        .map(|hit| hit.url.trim())
        .filter(|url| !url.is_empty())
        .take(settings.max_links)
        .map(str::to_string)
        .collect();

    info!(
        event_name = "agent.adapter.search.completed",
        result_count = response.results.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "web search completed"
    );

    if let Some(answer) = response.answer.as_deref().map(str::trim).filter(|answer| !answer.is_empty()) {
        return WebSearchResult {
            summary: answer.to_string(),
            links,
            answer: Some(answer.to_string()),
            found: true,
        };
    }

    let snippets: Vec<String> = response
        .results
        .iter()
        .map(|hit| sanitizer::clean(&hit.content, settings.max_content_chars))
        .filter(|snippet| !snippet.is_empty())
        .collect();
    let found = !snippets.is_empty();
    let summary = if found { snippets.join("\n") } else { language.search_no_results().to_string() };
    WebSearchResult { summary, links, answer: None, found }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use atlas_core::language::ResponseLanguage;

    use super::{run_web_search, SearchHit, SearchResponse, SearchSettings, WebSearchApi};
    use crate::adapters::AdapterError;

    struct Fixed(Result<SearchResponse, fn() -> AdapterError>);

    #[async_trait]
    impl WebSearchApi for Fixed {
        async fn search(&self, _query: &str) -> Result<SearchResponse, AdapterError> {
            match &self.0 {
                Ok(response) => Ok(response.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn hit(url: &str, content: &str) -> SearchHit {
        SearchHit { url: url.to_string(), content: content.to_string() }
    }

    #[tokio::test]
    async fn pre_synthesized_answer_wins() {
        let api = Fixed(Ok(SearchResponse {
            answer: Some("  Brasília is the capital of Brazil.  ".to_string()),
            results: vec![hit("https://a.example", "ignored"), hit("", "no url")],
        }));

        let result = run_web_search(&api, "capital of brazil", SearchSettings::default(), ResponseLanguage::En).await;

        assert_eq!(result.answer.as_deref(), Some("Brasília is the capital of Brazil."));
        assert_eq!(result.summary, "Brasília is the capital of Brazil.");
        assert_eq!(result.links, vec!["https://a.example".to_string()]);
    }

    #[tokio::test]
    async fn snippets_are_sanitized_and_links_capped() {
        let results = (0..7)
            .map(|index| {
                hit(
                    &format!("https://site{index}.example"),
                    "Accept all cookies to continue browsing.\nThe river crosses the whole metropolitan region.",
                )
            })
            .collect();
        let api = Fixed(Ok(SearchResponse { answer: None, results }));
        let settings = SearchSettings { max_links: 5, max_content_chars: 1_000 };

        let result = run_web_search(&api, "river", settings, ResponseLanguage::En).await;

        assert_eq!(result.links.len(), 5);
        assert!(result.answer.is_none());
        assert!(!result.summary.to_lowercase().contains("cookies"));
        assert!(result.summary.starts_with("The river crosses"));
        assert!(result.found);
    }

    #[tokio::test]
    async fn failures_become_localized_summaries() {
        let limited = Fixed(Err(|| AdapterError::RateLimited { service: "web search" }));
        let result = run_web_search(&limited, "q", SearchSettings::default(), ResponseLanguage::PtBr).await;
        assert_eq!(result.summary, ResponseLanguage::PtBr.rate_limited());
        assert!(result.links.is_empty());
        assert!(!result.found);

        let broken = Fixed(Err(|| AdapterError::Status {
            service: "web search",
            status: 500,
            message: "x".repeat(500),
        }));
        let result = run_web_search(&broken, "q", SearchSettings::default(), ResponseLanguage::PtBr).await;
        assert!(result.summary.starts_with("Erro na busca: "));
        assert!(result.summary.chars().count() < 180);
    }

    #[tokio::test]
    async fn empty_results_report_nothing_found() {
        let api = Fixed(Ok(SearchResponse::default()));
        let result = run_web_search(&api, "q", SearchSettings::default(), ResponseLanguage::PtBr).await;
        assert_eq!(result.summary, "Nenhum resultado encontrado.");
        assert!(!result.found);
    }
}
