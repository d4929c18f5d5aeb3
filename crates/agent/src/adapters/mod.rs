use std::time::Duration;

use thiserror::Error;

use atlas_core::config::RetryConfig;
use atlas_core::errors::ApplicationError;

pub mod search;
pub mod vector;
pub mod weather;

pub use search::{run_web_search, SearchHit, SearchResponse, SearchSettings, TavilyClient, WebSearchApi};
pub use vector::{search_docs, ChromaClient, VectorStore};
pub use weather::{fetch_weather, OpenWeatherClient, WeatherApi};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
    #[error("{service} rate limited the request")]
    RateLimited { service: &'static str },
    #[error("{service} transport failure: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} returned {status}: {message}")]
    Status { service: &'static str, status: u16, message: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: &'static str, message: String },
}

impl From<AdapterError> for ApplicationError {
    fn from(error: AdapterError) -> Self {
        match error {
            AdapterError::NotConfigured { .. } => Self::Configuration(error.to_string()),
            AdapterError::RateLimited { .. } => Self::RateLimited(error.to_string()),
            other => Self::Integration(other.to_string()),
        }
    }
}

/// Exponential backoff with a fixed attempt cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}
