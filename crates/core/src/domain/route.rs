use serde::{Deserialize, Serialize};

use crate::domain::conversation::RouteFlags;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Conversational,
    Weather,
    FallbackSearch,
    Execute,
}

impl RouteCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conversational => "conversational",
            Self::Weather => "weather",
            Self::FallbackSearch => "fallback_search",
            Self::Execute => "execute",
        }
    }

    pub fn flags(self) -> RouteFlags {
        RouteFlags {
            needs_web_fallback: self == Self::FallbackSearch,
            is_conversational: self == Self::Conversational,
            is_weather_query: self == Self::Weather,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub category: RouteCategory,
    pub flags: RouteFlags,
}

impl From<RouteCategory> for RouteDecision {
    fn from(category: RouteCategory) -> Self {
        Self { category, flags: category.flags() }
    }
}
