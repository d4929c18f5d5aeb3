use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::weather::{CurrentConditions, DailyRange};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub daily: DailyRange,
}

/// `raw_data` is present exactly when the current-conditions fetch succeeded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub summary: String,
    pub raw_data: Option<WeatherReport>,
}

impl WeatherResult {
    pub fn failed(summary: impl Into<String>) -> Self {
        Self { summary: summary.into(), raw_data: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub summary: String,
    pub links: Vec<String>,
    pub answer: Option<String>,
    /// False when `summary` is a failure or "no results" notice rather than search content.
    #[serde(default)]
    pub found: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResult {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
