use std::collections::HashMap;

use tokio::sync::RwLock;

use atlas_core::domain::conversation::{ConversationId, ConversationState};

use super::{ConversationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, ConversationState>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationState>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn save(&self, id: &ConversationId, state: ConversationState) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(id.0.clone(), state);
        Ok(())
    }
}
