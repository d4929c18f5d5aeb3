use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use atlas_core::config::VectorConfig;
use atlas_core::domain::results::VectorSearchResult;
use atlas_core::errors::truncate_for_log;

use super::AdapterError;
use crate::llm::Embedder;

const SERVICE: &str = "vector store";

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query_similar(&self, text: &str, k: usize) -> Result<Vec<VectorSearchResult>, AdapterError>;

    /// Cheap liveness probe used by readiness checks.
    async fn heartbeat(&self) -> Result<(), AdapterError>;
}

/// Chroma over its HTTP API. Query text is embedded client-side.
pub struct ChromaClient {
    client: Client,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct CollectionBody {
    id: String,
}

#[derive(Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Map<String, Value>>>>,
}

impl ChromaClient {
    pub fn from_config(config: &VectorConfig, embedder: Arc<dyn Embedder>) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| AdapterError::Transport { service: SERVICE, message: error.to_string() })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            collection_id: OnceCell::new(),
            embedder,
        })
    }

    async fn collection_id(&self) -> Result<&str, AdapterError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .post(format!("{}/api/v1/collections", self.base_url))
                    .json(&json!({ "name": self.collection, "get_or_create": true }))
                    .send()
                    .await
                    .map_err(transport)?;
                let body: CollectionBody = checked(response).await?.json().await.map_err(decode)?;
                Ok::<_, AdapterError>(body.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

fn transport(error: reqwest::Error) -> AdapterError {
    AdapterError::Transport { service: SERVICE, message: truncate_for_log(&error.to_string(), 200) }
}

fn decode(error: reqwest::Error) -> AdapterError {
    AdapterError::Decode { service: SERVICE, message: error.to_string() }
}

async fn checked(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Status { service: SERVICE, status: status.as_u16(), message: truncate_for_log(&body, 200) })
}

#[async_trait]
impl VectorStore for ChromaClient {
    async fn query_similar(&self, text: &str, k: usize) -> Result<Vec<VectorSearchResult>, AdapterError> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|error| AdapterError::Transport { service: SERVICE, message: error.to_string() })?;
        let collection_id = self.collection_id().await?;

        let response = self
            .client
            .post(format!("{}/api/v1/collections/{collection_id}/query", self.base_url))
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": k,
                "include": ["documents", "metadatas"],
            }))
            .send()
            .await
            .map_err(transport)?;
        let body: QueryBody = checked(response).await?.json().await.map_err(decode)?;

        let documents = body.documents.into_iter().next().unwrap_or_default();
        let mut metadatas = body.metadatas.into_iter().next().unwrap_or_default().into_iter();
        Ok(documents
            .into_iter()
            .map(|document| VectorSearchResult {
                content: document.unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
            })
            .collect())
    }

    async fn heartbeat(&self) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(format!("{}/api/v1/heartbeat", self.base_url))
            .send()
            .await
            .map_err(transport)?;
        checked(response).await.map(|_| ())
    }
}

/// Top-k documents for the query. Store failures degrade to an empty list.
pub async fn search_docs(store: &dyn VectorStore, query: &str, k: usize) -> Vec<VectorSearchResult> {
    let started = Instant::now();
    match store.query_similar(query, k).await {
        Ok(results) => {
            info!(
                event_name = "agent.adapter.vector.completed",
                result_count = results.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "document search completed"
            );
            results
        }
        Err(error) => {
            warn!(
                event_name = "agent.adapter.vector.failed",
                duration_ms = started.elapsed().as_millis() as u64,
                error = %truncate_for_log(&error.to_string(), 200),
                "document search failed, returning no documents"
            );
            Vec::new()
        }
    }
}
