use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use atlas_core::domain::conversation::{ConversationId, ConversationState};

pub mod memory;
pub mod query;

pub use memory::InMemoryConversationRepository;
pub use query::{QueryRows, SqliteQueryExecutor};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Checkpoints of the trimmed conversation between turns.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationState>, RepositoryError>;
    async fn save(&self, id: &ConversationId, state: ConversationState) -> Result<(), RepositoryError>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum QueryParams {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl QueryParams {
    /// Accepts a JSON array, a JSON object or null.
    pub fn from_json(value: Option<&Value>) -> Result<Self, RepositoryError> {
        match value {
            None | Some(Value::Null) => Ok(Self::None),
            Some(Value::Array(values)) => Ok(Self::Positional(values.clone())),
            Some(Value::Object(map)) => Ok(Self::Named(map.clone())),
            Some(other) => Err(RepositoryError::Decode(format!(
                "params must be an array or an object, got `{other}`"
            ))),
        }
    }
}

/// Runs a statement that has already been allow-listed. Values are always bound.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryRows, RepositoryError>;
}
