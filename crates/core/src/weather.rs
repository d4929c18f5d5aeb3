//! Weather payload interpretation: daily min/max aggregation over forecast
//! buckets, current-condition extraction, description localization and the
//! reply text. Everything here is lenient: malformed fields are skipped.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::ResponseLanguage;

const MAX_LOCATION_CHARS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// UTC unix seconds.
    pub timestamp: i64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub entries: Vec<ForecastEntry>,
    /// Seconds east of UTC for every entry in the series.
    pub timezone_offset: i64,
}

impl ForecastSeries {
    /// Reads an OpenWeatherMap `/forecast` body. Entries without a timestamp are dropped.
    pub fn from_value(body: &Value) -> Self {
        let timezone_offset =
            body.pointer("/city/timezone").and_then(as_i64).unwrap_or_default();
        let entries = body
            .get("list")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(ForecastEntry::from_value).collect())
            .unwrap_or_default();
        Self { entries, timezone_offset }
    }
}

impl ForecastEntry {
    fn from_value(entry: &Value) -> Option<Self> {
        let timestamp = entry.get("dt").and_then(as_i64)?;
        let main = entry.get("main");
        let point = main.and_then(|main| main.get("temp")).and_then(Value::as_f64);
        let min = main.and_then(|main| main.get("temp_min")).and_then(Value::as_f64).or(point);
        let max = main.and_then(|main| main.get("temp_max")).and_then(Value::as_f64).or(point);
        Some(Self { timestamp, min, max })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRange {
    #[serde(rename = "temp_min")]
    pub min: Option<f64>,
    #[serde(rename = "temp_max")]
    pub max: Option<f64>,
}

/// Min and max over every bucket whose local calendar date equals `target_date`
/// (today in the series' local time when `None`), rounded to one decimal.
pub fn daily_min_max(series: &ForecastSeries, target_date: Option<NaiveDate>) -> DailyRange {
    daily_min_max_at(series, target_date, Utc::now())
}

pub fn daily_min_max_at(
    series: &ForecastSeries,
    target_date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> DailyRange {
    if series.entries.is_empty() {
        return DailyRange::default();
    }
    let Some(target) =
        target_date.or_else(|| local_date(now.timestamp(), series.timezone_offset))
    else {
        return DailyRange::default();
    };

    let readings: Vec<f64> = series
        .entries
        .iter()
        .filter(|entry| local_date(entry.timestamp, series.timezone_offset) == Some(target))
        .flat_map(|entry| [entry.min, entry.max])
        .flatten()
        .filter(|reading| reading.is_finite())
        .collect();

    let min = readings.iter().copied().reduce(f64::min);
    let max = readings.iter().copied().reduce(f64::max);
    DailyRange { min: min.map(round_one), max: max.map(round_one) }
}

fn local_date(timestamp: i64, offset: i64) -> Option<NaiveDate> {
    let local = timestamp.checked_add(offset)?;
    DateTime::from_timestamp(local, 0).map(|moment| moment.date_naive())
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|float| float as i64))
}

/// Fields of an OpenWeatherMap `/weather` body that the reply uses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl CurrentConditions {
    pub fn from_value(body: &Value) -> Self {
        let number = |pointer: &str| body.pointer(pointer).and_then(Value::as_f64);
        Self {
            name: body
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(str::to_owned),
            description: body.pointer("/weather/0/description").and_then(Value::as_str).map(str::to_owned),
            temp: number("/main/temp"),
            feels_like: number("/main/feels_like"),
            humidity: number("/main/humidity"),
            wind_speed: number("/wind/speed"),
        }
    }
}

const DESCRIPTIONS_PT: &[(&str, &str)] = &[
    ("clear sky", "Céu limpo"),
    ("few clouds", "Poucas nuvens"),
    ("scattered clouds", "Nuvens dispersas"),
    ("broken clouds", "Nublado parcial"),
    ("overcast clouds", "Nublado"),
    ("shower rain", "Chuva rápida"),
    ("rain", "Chuva"),
    ("light rain", "Chuva leve"),
    ("moderate rain", "Chuva moderada"),
    ("heavy intensity rain", "Chuva forte"),
    ("thunderstorm", "Tempestade"),
    ("snow", "Neve"),
    ("light snow", "Neve leve"),
    ("mist", "Névoa"),
    ("haze", "Neblina"),
    ("fog", "Nevoeiro"),
    ("drizzle", "Garoa"),
    ("light intensity drizzle", "Garoa leve"),
    ("smoke", "Fumaça"),
    ("dust", "Poeira"),
    ("sand", "Areia"),
    ("tornado", "Tornado"),
    ("squall", "Ventania"),
];

pub fn localize_description(description: &str, language: ResponseLanguage) -> String {
    if language == ResponseLanguage::PtBr {
        let lower = description.trim().to_lowercase();
        if let Some((_, translated)) = DESCRIPTIONS_PT.iter().find(|(key, _)| *key == lower) {
            return (*translated).to_owned();
        }
        if let Some((_, translated)) = DESCRIPTIONS_PT.iter().find(|(key, _)| lower.contains(key)) {
            return (*translated).to_owned();
        }
    }
    title_case(description)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

static LOCATION_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-]").expect("valid location noise regex"));

/// Keeps word characters, whitespace and hyphens, capped at 100 chars.
pub fn sanitize_location(text: &str) -> String {
    let cleaned = LOCATION_NOISE.replace_all(text.trim(), "");
    cleaned.chars().take(MAX_LOCATION_CHARS).collect::<String>().trim().to_owned()
}

/// One-line reply for the weather handler. Absent fields are left out.
pub fn compose_reply(
    conditions: &CurrentConditions,
    daily: &DailyRange,
    requested_city: &str,
    language: ResponseLanguage,
) -> String {
    let labels = ReplyLabels::for_language(language);
    let description = conditions
        .description
        .as_deref()
        .map(|description| localize_description(description, language));

    let mut reply = format!("🌤️ {}", headline(conditions, description, requested_city, labels.prefix));
    if let (Some(min), Some(max)) = (daily.min, daily.max) {
        reply.push_str(&format!(" ({} {min:.1}°C / {} {max:.1}°C)", labels.min, labels.max));
    }
    if let Some(feels_like) = conditions.feels_like {
        reply.push_str(&format!(". {}: {feels_like}°C", labels.feels_like));
    }
    if let Some(humidity) = conditions.humidity {
        reply.push_str(&format!(". {}: {humidity}%", labels.humidity));
    }
    if let Some(wind_speed) = conditions.wind_speed {
        reply.push_str(&format!(". {}: {wind_speed} m/s", labels.wind));
    }
    reply.push('.');
    reply
}

/// Short summary carried on `WeatherResult` and returned by the weather tool.
pub fn summarize(conditions: &CurrentConditions, requested_city: &str, language: ResponseLanguage) -> String {
    let prefix = ReplyLabels::for_language(language).prefix;
    format!("{}.", headline(conditions, conditions.description.clone(), requested_city, prefix))
}

/// `"<prefix> <city>"`, followed by `": <description>, <temp>°C"` with only the parts present.
fn headline(
    conditions: &CurrentConditions,
    description: Option<String>,
    requested_city: &str,
    prefix: &str,
) -> String {
    let city = conditions.name.as_deref().unwrap_or(requested_city);
    let parts: Vec<String> = description
        .filter(|description| !description.trim().is_empty())
        .into_iter()
        .chain(conditions.temp.map(|temp| format!("{temp}°C")))
        .collect();

    if parts.is_empty() {
        format!("{prefix} {city}")
    } else {
        format!("{prefix} {city}: {}", parts.join(", "))
    }
}

struct ReplyLabels {
    prefix: &'static str,
    min: &'static str,
    max: &'static str,
    feels_like: &'static str,
    humidity: &'static str,
    wind: &'static str,
}

impl ReplyLabels {
    fn for_language(language: ResponseLanguage) -> Self {
        match language {
            ResponseLanguage::PtBr => Self {
                prefix: "Em",
                min: "mín",
                max: "máx",
                feels_like: "Sensação térmica",
                humidity: "Umidade",
                wind: "Vento",
            },
            ResponseLanguage::En => Self {
                prefix: "In",
                min: "min",
                max: "max",
                feels_like: "Feels like",
                humidity: "Humidity",
                wind: "Wind",
            },
        }
    }
}
