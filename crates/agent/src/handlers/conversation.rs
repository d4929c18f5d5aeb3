use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use atlas_core::domain::conversation::{ConversationState, StateDelta};
use atlas_core::persona::{self, PatternTag};

use super::{latest_query, Handler};

/// Canned persona replies. A query that no longer matches gets the greeting.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConversationHandler;

#[async_trait]
impl Handler for ConversationHandler {
    fn name(&self) -> &'static str {
        "conversation"
    }

    async fn handle(&self, state: &ConversationState) -> StateDelta {
        let started = Instant::now();
        let query = latest_query(state);
        let tag = persona::detect(query).unwrap_or(PatternTag::GreetingPt);
        let reply = persona::respond(tag, query);
        info!(
            event_name = "agent.handler.conversation.completed",
            pattern = tag.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "persona reply produced"
        );
        StateDelta::reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use atlas_core::domain::conversation::{ConversationState, Message};
    use atlas_core::persona::ASSISTANT_NAME;

    use super::ConversationHandler;
    use crate::handlers::Handler;

    #[tokio::test]
    async fn replies_in_the_language_of_the_pattern() {
        let state = ConversationState::new(vec![Message::user("what's your name?")]);
        let delta = ConversationHandler.handle(&state).await;

        assert_eq!(delta.messages.len(), 1);
        let reply = delta.messages[0].content();
        assert!(reply.starts_with("My name is"));
        assert!(reply.contains(ASSISTANT_NAME));
    }
}
