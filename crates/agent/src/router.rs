use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use atlas_core::domain::conversation::ConversationState;
use atlas_core::domain::route::{RouteCategory, RouteDecision};
use atlas_core::errors::truncate_for_log;
use atlas_core::persona;

use crate::llm::{ChatMessage, LlmClient};

/// Substring vocabulary, matched case-insensitively against the query.
pub const WEATHER_KEYWORDS: &[&str] = &[
    "clima", "weather", "temperatura", "temperature", "tempo", "forecast", "previsão", "chuva",
    "rain", "frio", "quente", "hot", "cold", "sol", "sun", "nublado", "cloudy", "vento", "wind",
    "°c", "celsius", "fahrenheit",
];

pub struct Router {
    llm: Arc<dyn LlmClient>,
    query_max_chars: usize,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>, query_max_chars: usize) -> Self {
        Self { llm, query_max_chars }
    }

    /// First match wins: persona pattern, weather vocabulary, then one model call.
    pub async fn classify(&self, state: &ConversationState) -> RouteDecision {
        let started = Instant::now();
        let query: String = state
            .latest_user_text()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(self.query_max_chars)
            .collect();

        let (category, reason) = if query.is_empty() {
            (RouteCategory::FallbackSearch, "empty_query")
        } else if persona::detect(&query).is_some() {
            (RouteCategory::Conversational, "pattern_match")
        } else if is_weather_query(&query) {
            (RouteCategory::Weather, "weather_keyword_match")
        } else {
            (self.ask_model(&query).await, "model")
        };

        info!(
            event_name = "agent.router.decided",
            category = category.as_str(),
            reason,
            duration_ms = started.elapsed().as_millis() as u64,
            "route decided"
        );
        RouteDecision::from(category)
    }

    async fn ask_model(&self, query: &str) -> RouteCategory {
        match self.llm.complete(&[ChatMessage::user(routing_prompt(query))]).await {
            Ok(reply) if reply.to_uppercase().contains("FALLBACK") => RouteCategory::FallbackSearch,
            Ok(_) => RouteCategory::Execute,
            Err(error) => {
                warn!(
                    event_name = "agent.router.model_failed",
                    error = %truncate_for_log(&error.to_string(), 200),
                    "routing call failed, using web fallback"
                );
                RouteCategory::FallbackSearch
            }
        }
    }
}

pub fn is_weather_query(query: &str) -> bool {
    let lowered = query.to_lowercase();
    WEATHER_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

fn routing_prompt(query: &str) -> String {
    format!(
        "You are a router. Given the user question below, answer with exactly one word:\n\n\
         EXECUTE: for questions that need specialized tools:\n\
         \x20 * Internal docs/FAQs -> use search_docs tool\n\
         \x20 * Database queries/SQL -> use sql_db tool\n\
         \x20 Examples: 'What products are in database?', 'Search internal docs'\n\n\
         WEB_FALLBACK: ONLY for general knowledge, current events, news\n\
         \x20 Examples: 'Who won the election?', 'Latest AI news'\n\n\
         User question: {query}"
    )
}
