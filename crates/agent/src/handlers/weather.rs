use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use atlas_core::city;
use atlas_core::domain::conversation::{ConversationState, StateDelta};
use atlas_core::language::ResponseLanguage;
use atlas_core::weather::compose_reply;

use super::{latest_query, Handler};
use crate::adapters::{fetch_weather, WeatherApi};

/// Answers weather questions straight from the weather API. Never calls the model.
pub struct WeatherHandler {
    api: Arc<dyn WeatherApi>,
    language: ResponseLanguage,
}

impl WeatherHandler {
    pub fn new(api: Arc<dyn WeatherApi>, language: ResponseLanguage) -> Self {
        Self { api, language }
    }
}

#[async_trait]
impl Handler for WeatherHandler {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn handle(&self, state: &ConversationState) -> StateDelta {
        let started = Instant::now();
        let (city, country) = city::extract(latest_query(state));
        let Some(city) = city else {
            info!(
                event_name = "agent.handler.weather.no_city",
                duration_ms = started.elapsed().as_millis() as u64,
                "no city found in weather query"
            );
            return StateDelta::reply(self.language.city_not_identified());
        };

        let result = fetch_weather(self.api.as_ref(), &city, country.as_deref(), self.language).await;
        let reply = match &result.raw_data {
            Some(report) => compose_reply(&report.current, &report.daily, &city, self.language),
            None => result.summary,
        };

        info!(
            event_name = "agent.handler.weather.completed",
            city = %city,
            country = country.as_deref().unwrap_or_default(),
            duration_ms = started.elapsed().as_millis() as u64,
            "weather reply produced"
        );
        StateDelta::reply(reply)
    }
}
