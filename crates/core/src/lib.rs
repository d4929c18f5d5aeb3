pub mod city;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod language;
pub mod persona;
pub mod sanitizer;
pub mod weather;

pub use domain::conversation::{
    AssistantMessage, ConversationId, ConversationState, Message, Role, RouteFlags, StateDelta,
    UserMessage,
};
pub use domain::results::{VectorSearchResult, WeatherReport, WeatherResult, WebSearchResult};
pub use domain::route::{RouteCategory, RouteDecision};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use language::ResponseLanguage;
pub use persona::{PatternTag, ASSISTANT_NAME};
pub use weather::{CurrentConditions, DailyRange, ForecastSeries};
