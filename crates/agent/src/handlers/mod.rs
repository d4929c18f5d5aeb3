//! Terminal nodes. Each one reads the turn state and hands back a delta that
//! carries exactly one assistant reply, even when every dependency failed.
//! The tool-execution handler is the exception: it may return several
//! messages, or none when the model never produced text.

use async_trait::async_trait;

use atlas_core::domain::conversation::{ConversationState, StateDelta};

pub mod conversation;
pub mod executor;
pub mod fallback;
pub mod weather;

pub use conversation::ConversationHandler;
pub use executor::ExecutorHandler;
pub use fallback::{FallbackSearchHandler, FallbackSettings};
pub use weather::WeatherHandler;

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, state: &ConversationState) -> StateDelta;
}

pub(crate) fn latest_query(state: &ConversationState) -> &str {
    state.latest_user_text().map(str::trim).unwrap_or_default()
}
