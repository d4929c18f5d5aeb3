use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info, warn};

use atlas_core::config::WeatherConfig;
use atlas_core::domain::results::{WeatherReport, WeatherResult};
use atlas_core::errors::truncate_for_log;
use atlas_core::language::ResponseLanguage;
use atlas_core::weather::{
    daily_min_max, sanitize_location, summarize, CurrentConditions, DailyRange, ForecastSeries,
};

use super::{AdapterError, RetryPolicy};

const SERVICE: &str = "weather api";

/// Raw OpenWeatherMap bodies. Implementations retry internally.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(&self, city: &str, country: Option<&str>) -> Result<Value, AdapterError>;
    async fn forecast(&self, city: &str, country: Option<&str>) -> Result<Value, AdapterError>;
}

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    units: String,
    lang: String,
    retry: RetryPolicy,
}

impl OpenWeatherClient {
    pub fn from_config(config: &WeatherConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| AdapterError::Transport { service: SERVICE, message: error.to_string() })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            units: config.units.clone(),
            lang: config.lang.clone(),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn get_json(
        &self,
        path: &str,
        city: &str,
        country: Option<&str>,
    ) -> Result<Value, AdapterError> {
        let api_key = self.api_key.as_ref().ok_or(AdapterError::NotConfigured { service: SERVICE })?;
        let location = match country {
            Some(country) => format!("{city},{country}"),
            None => city.to_string(),
        };
        let url = format!("{}/{path}", self.base_url);

        let mut last_error = AdapterError::Transport { service: SERVICE, message: "no attempt made".to_string() };
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.backoff(attempt - 1);
                warn!(
                    event_name = "agent.adapter.weather.retry",
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying weather request"
                );
                tokio::time::sleep(delay).await;
            }

            let sent = self
                .client
                .get(&url)
                .query(&[
                    ("q", location.as_str()),
                    ("appid", api_key.expose_secret()),
                    ("units", self.units.as_str()),
                    ("lang", self.lang.as_str()),
                ])
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(error) if error.is_timeout() || error.is_connect() || error.is_request() => {
                    last_error = AdapterError::Transport {
                        service: SERVICE,
                        message: truncate_for_log(&error.without_url().to_string(), 200),
                    };
                    continue;
                }
                Err(error) => {
                    return Err(AdapterError::Transport {
                        service: SERVICE,
                        message: truncate_for_log(&error.without_url().to_string(), 200),
                    })
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                last_error = AdapterError::RateLimited { service: SERVICE };
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or(body);
                return Err(AdapterError::Status {
                    service: SERVICE,
                    status: status.as_u16(),
                    message: truncate_for_log(&message, 200),
                });
            }

            return response
                .json::<Value>()
                .await
                .map_err(|error| AdapterError::Decode { service: SERVICE, message: error.to_string() });
        }

        Err(last_error)
    }
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    async fn current(&self, city: &str, country: Option<&str>) -> Result<Value, AdapterError> {
        self.get_json("weather", city, country).await
    }

    async fn forecast(&self, city: &str, country: Option<&str>) -> Result<Value, AdapterError> {
        self.get_json("forecast", city, country).await
    }
}

/// Current conditions plus today's min/max. Never fails: problems become the summary.
pub async fn fetch_weather(
    api: &dyn WeatherApi,
    city: &str,
    country: Option<&str>,
    language: ResponseLanguage,
) -> WeatherResult {
    let started = Instant::now();
    let city = sanitize_location(city);
    let country = country.map(sanitize_location).filter(|country| !country.is_empty());
    if city.is_empty() {
        return WeatherResult::failed(language.invalid_city());
    }

    let current = match api.current(&city, country.as_deref()).await {
        Ok(current) => current,
        Err(error) => {
            warn!(
                event_name = "agent.adapter.weather.failed",
                city = %city,
                duration_ms = started.elapsed().as_millis() as u64,
                error = %truncate_for_log(&error.to_string(), 200),
                "current conditions unavailable"
            );
            return match error {
                AdapterError::NotConfigured { .. } => WeatherResult::failed(language.weather_not_configured()),
                AdapterError::RateLimited { .. } => WeatherResult::failed(language.rate_limited()),
                _ => WeatherResult::failed(language.weather_unavailable()),
            };
        }
    };

    let daily = match api.forecast(&city, country.as_deref()).await {
        Ok(forecast) => daily_min_max(&ForecastSeries::from_value(&forecast), None),
        Err(error) => {
            warn!(
                event_name = "agent.adapter.weather.forecast_failed",
                city = %city,
                error = %truncate_for_log(&error.to_string(), 200),
                "forecast unavailable, daily range omitted"
            );
            DailyRange::default()
        }
    };

    let conditions = CurrentConditions::from_value(&current);
    let summary = summarize(&conditions, &city, language);
    info!(
        event_name = "agent.adapter.weather.completed",
        city = %city,
        duration_ms = started.elapsed().as_millis() as u64,
        "weather fetched"
    );
    WeatherResult { summary, raw_data: Some(WeatherReport { current: conditions, daily }) }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use atlas_core::config::{RetryConfig, WeatherConfig};
    use atlas_core::language::ResponseLanguage;

    use super::{fetch_weather, OpenWeatherClient, WeatherApi};
    use crate::adapters::AdapterError;

    #[derive(Default)]
    struct Counters {
        current_calls: AtomicUsize,
    }

    async fn current_handler(
        State(counters): State<Arc<Counters>>,
        Query(params): Query<std::collections::HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let call = counters.current_calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "message": "slow down" })));
        }
        let city = params.get("q").cloned().unwrap_or_default();
        (
            StatusCode::OK,
            Json(json!({ "name": city, "main": { "temp": 21.5 }, "weather": [{ "description": "clear sky" }] })),
        )
    }

    async fn spawn_server(counters: Arc<Counters>) -> String {
        let app = Router::new()
            .route("/weather", get(current_handler))
            .route(
                "/forecast",
                get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "message": "city not found" }))) }),
            )
            .with_state(counters);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}")
    }

    fn config(base_url: String, api_key: Option<&str>) -> WeatherConfig {
        WeatherConfig {
            api_key: api_key.map(|key| key.to_string().into()),
            base_url,
            units: "metric".to_string(),
            lang: "pt_br".to_string(),
            timeout_secs: 5,
            retry: RetryConfig { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 4 },
        }
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let counters = Arc::new(Counters::default());
        let base_url = spawn_server(counters.clone()).await;
        let client = OpenWeatherClient::from_config(&config(base_url, Some("key"))).expect("client");

        let body = client.current("Recife", Some("BR")).await.expect("current after retry");

        assert_eq!(body["name"], "Recife,BR");
        assert_eq!(counters.current_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_fast() {
        let counters = Arc::new(Counters::default());
        let base_url = spawn_server(counters).await;
        let client = OpenWeatherClient::from_config(&config(base_url, Some("key"))).expect("client");

        let error = client.forecast("Recife", None).await.expect_err("404 is terminal");
        assert!(matches!(error, AdapterError::Status { status: 404, ref message, .. } if message == "city not found"));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let client =
            OpenWeatherClient::from_config(&config("http://127.0.0.1:9".to_string(), None)).expect("client");
        let result = fetch_weather(&client, "Recife", None, ResponseLanguage::PtBr).await;

        assert!(result.raw_data.is_none());
        assert_eq!(result.summary, ResponseLanguage::PtBr.weather_not_configured());
    }

    struct FailingForecast;

    #[async_trait]
    impl WeatherApi for FailingForecast {
        async fn current(&self, city: &str, _country: Option<&str>) -> Result<Value, AdapterError> {
            Ok(json!({ "name": city, "main": { "temp": 12.0, "humidity": 80 } }))
        }

        async fn forecast(&self, _city: &str, _country: Option<&str>) -> Result<Value, AdapterError> {
            Err(AdapterError::Transport { service: "weather api", message: "reset".to_string() })
        }
    }

    #[tokio::test]
    async fn forecast_failure_keeps_current_conditions() {
        let result = fetch_weather(&FailingForecast, "Porto Alegre!", Some("  "), ResponseLanguage::En).await;
        let report = result.raw_data.expect("current succeeded");

        assert_eq!(report.current.name.as_deref(), Some("Porto Alegre"));
        assert_eq!(report.daily.min, None);
        assert_eq!(result.summary, "In Porto Alegre: 12°C.");
    }

    #[tokio::test]
    async fn blank_city_is_rejected_without_calls() {
        let result = fetch_weather(&FailingForecast, "?!", None, ResponseLanguage::PtBr).await;
        assert_eq!(result.summary, ResponseLanguage::PtBr.invalid_city());
    }
}
