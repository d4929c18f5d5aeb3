//! Model invocation seam plus an OpenAI-compatible HTTP client.
//!
//! The client speaks `/chat/completions` and `/embeddings` for OpenAI, Azure
//! OpenAI deployments and Ollama's OpenAI-compatible endpoint. Calls fail fast;
//! the callers decide how to degrade.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use atlas_core::config::{LlmConfig, LlmProvider};
use atlas_core::domain::conversation::Message;
use atlas_core::errors::{truncate_for_log, ApplicationError};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ERROR_BODY_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text as produced by the model. May be malformed.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: Option<String>, tool_calls: Vec<ToolCall> },
    Tool { tool_call_id: String, content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: Some(content.into()), tool_calls: Vec::new() }
    }

    fn to_wire(&self) -> Value {
        match self {
            Self::System { content } => json!({ "role": "system", "content": content }),
            Self::User { content } => json!({ "role": "user", "content": content }),
            Self::Assistant { content, tool_calls } => {
                let mut message = json!({ "role": "assistant", "content": content });
                if !tool_calls.is_empty() {
                    message["tool_calls"] = tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": { "name": call.name, "arguments": call.arguments },
                            })
                        })
                        .collect();
                }
                message
            }
            Self::Tool { tool_call_id, content } => {
                json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content })
            }
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::User(user) => Self::user(user.content.clone()),
            Message::Assistant(assistant) => Self::assistant(assistant.content.clone()),
        }
    }
}

/// Function schema advertised to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("model rate limited: {0}")]
    RateLimited(String),
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
}

impl From<LlmError> for ApplicationError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::QuotaExceeded(message) => Self::QuotaExceeded(message),
            LlmError::RateLimited(message) => Self::RateLimited(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate text for a prompt sequence.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// One step of tool calling: either tool calls, final text or both.
    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, LlmError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

pub struct OpenAiCompatibleClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    embedding_model: String,
    api_version: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig, embedding_model: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let base_url = match (config.provider, config.base_url.as_deref()) {
            (LlmProvider::OpenAi, None) => OPENAI_BASE_URL.to_string(),
            (LlmProvider::Ollama, Some(base)) if !base.trim_end_matches('/').ends_with("/v1") => {
                format!("{}/v1", base.trim_end_matches('/'))
            }
            (_, Some(base)) => base.trim_end_matches('/').to_string(),
            (_, None) => {
                return Err(LlmError::Transport(format!(
                    "llm.base_url is required for provider {:?}",
                    config.provider
                )))
            }
        };

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embedding_model: embedding_model.to_string(),
            api_version: config.api_version.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self, operation: &str, deployment: &str) -> String {
        match self.provider {
            LlmProvider::AzureOpenAi => format!(
                "{}/openai/deployments/{deployment}/{operation}?api-version={}",
                self.base_url, self.api_version
            ),
            LlmProvider::OpenAi | LlmProvider::Ollama => format!("{}/{operation}", self.base_url),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.api_key, self.provider) {
            (Some(key), LlmProvider::AzureOpenAi) => request.header("api-key", key.expose_secret()),
            (Some(key), _) => request.bearer_auth(key.expose_secret()),
            (None, _) => request,
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(truncate_for_log(&error.to_string(), ERROR_BODY_CHARS)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        response.json::<Value>().await.map_err(|error| LlmError::Decode(error.to_string()))
    }
}

fn classify_failure(status: StatusCode, body: &str) -> LlmError {
    let message = truncate_for_log(body, ERROR_BODY_CHARS);
    if status == StatusCode::TOO_MANY_REQUESTS {
        if body.contains("insufficient_quota") {
            return LlmError::QuotaExceeded(message);
        }
        return LlmError::RateLimited(message);
    }
    LlmError::Provider { status: status.as_u16(), message }
}

fn parse_reply(body: &Value) -> Result<ModelReply, LlmError> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(index, call)| {
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments = match function.get("arguments") {
                        Some(Value::String(text)) => text.clone(),
                        Some(other) => other.to_string(),
                        None => "{}".to_string(),
                    };
                    let id = call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{index}"));
                    Some(ToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelReply { content, tool_calls })
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.complete_with_tools(messages, &[])
            .await?
            .content
            .ok_or_else(|| LlmError::Decode("completion had no text content".to_string()))
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, LlmError> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages.iter().map(ChatMessage::to_wire).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }

        let url = self.endpoint("chat/completions", &self.model);
        let response = self.post(&url, &body).await?;
        parse_reply(&response)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = json!({ "model": self.embedding_model, "input": text });
        let url = self.endpoint("embeddings", &self.embedding_model);
        let response = self.post(&url, &body).await?;

        response
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_f64).map(|value| value as f32).collect())
            .ok_or_else(|| LlmError::Decode("embedding response has no vector".to_string()))
    }
}
