//! End-to-end turns through `AgentRuntime` with recorded model and adapter doubles.
//! The SQL path runs against an in-memory SQLite database seeded by the migrations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};

use atlas_agent::adapters::{AdapterError, SearchHit, SearchResponse, VectorStore, WeatherApi, WebSearchApi};
use atlas_agent::{
    AgentDependencies, AgentRuntime, ChatMessage, LlmClient, LlmError, ModelReply, ToolCall, ToolSpec,
};
use atlas_core::config::AppConfig;
use atlas_core::domain::conversation::ConversationId;
use atlas_core::domain::results::VectorSearchResult;
use atlas_core::language::ResponseLanguage;
use atlas_core::persona::ASSISTANT_NAME;
use atlas_db::{connect_with_settings, migrations, InMemoryConversationRepository, QueryExecutor, SqliteQueryExecutor};

#[derive(Default)]
struct RecordingLlm {
    routes: Mutex<VecDeque<Result<String, LlmError>>>,
    tool_steps: Mutex<VecDeque<ModelReply>>,
    complete_calls: AtomicUsize,
    tool_transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingLlm {
    fn scripted(routes: Vec<Result<String, LlmError>>, tool_steps: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(routes.into()),
            tool_steps: Mutex::new(tool_steps.into()),
            ..Self::default()
        })
    }

    fn total_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst) + self.tool_transcripts.lock().expect("transcripts").len()
    }
}

#[async_trait]
impl LlmClient for RecordingLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .lock()
            .expect("routes")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("unscripted completion".to_string())))
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply, LlmError> {
        self.tool_transcripts.lock().expect("transcripts").push(messages.to_vec());
        self.tool_steps
            .lock()
            .expect("tool steps")
            .pop_front()
            .ok_or_else(|| LlmError::Transport("unscripted tool step".to_string()))
    }
}

struct ParisWeather;

#[async_trait]
impl WeatherApi for ParisWeather {
    async fn current(&self, city: &str, _country: Option<&str>) -> Result<Value, AdapterError> {
        Ok(json!({
            "name": city,
            "weather": [{ "description": "clear sky" }],
            "main": { "temp": 18.0, "feels_like": 17.0, "humidity": 60 },
            "wind": { "speed": 2.5 },
        }))
    }

    async fn forecast(&self, _city: &str, _country: Option<&str>) -> Result<Value, AdapterError> {
        Ok(json!({
            "city": { "timezone": 0 },
            "list": [{ "dt": Utc::now().timestamp(), "main": { "temp_min": 14.0, "temp_max": 20.0 } }],
        }))
    }
}

struct StaticSearch {
    response: SearchResponse,
    calls: AtomicUsize,
}

#[async_trait]
impl WebSearchApi for StaticSearch {
    async fn search(&self, _query: &str) -> Result<SearchResponse, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct NoDocuments;

#[async_trait]
impl VectorStore for NoDocuments {
    async fn query_similar(&self, _text: &str, _k: usize) -> Result<Vec<VectorSearchResult>, AdapterError> {
        Ok(Vec::new())
    }

    async fn heartbeat(&self) -> Result<(), AdapterError> {
        Err(AdapterError::Transport { service: "vector store", message: "connection refused".to_string() })
    }
}

struct Harness {
    runtime: AgentRuntime,
    llm: Arc<RecordingLlm>,
    search: Arc<StaticSearch>,
}

async fn harness(llm: Arc<RecordingLlm>) -> Harness {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    let sql: Arc<dyn QueryExecutor> = Arc::new(SqliteQueryExecutor::new(pool));

    let search = Arc::new(StaticSearch {
        response: SearchResponse {
            answer: Some("The final was played on Sunday.".to_string()),
            results: vec![SearchHit {
                url: "https://sports.example/final".to_string(),
                content: "Match report from the final played on Sunday evening.".to_string(),
            }],
        },
        calls: AtomicUsize::new(0),
    });

    let mut config = AppConfig::default();
    config.agent.response_language = ResponseLanguage::En;

    let runtime = AgentRuntime::new(
        &config,
        AgentDependencies {
            llm: llm.clone(),
            weather: Arc::new(ParisWeather),
            search: search.clone(),
            vector: Arc::new(NoDocuments),
            sql,
            conversations: Arc::new(InMemoryConversationRepository::default()),
        },
    );
    Harness { runtime, llm, search }
}

fn sql_call(query: &str) -> ModelReply {
    ModelReply {
        content: None,
        tool_calls: vec![ToolCall {
            id: "call-1".to_string(),
            name: "sql_db".to_string(),
            arguments: json!({ "query": query }).to_string(),
        }],
    }
}

fn final_answer(text: &str) -> ModelReply {
    ModelReply { content: Some(text.to_string()), tool_calls: Vec::new() }
}

fn last_tool_output(transcript: &[ChatMessage]) -> String {
    transcript
        .iter()
        .rev()
        .find_map(|message| match message {
            ChatMessage::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .expect("tool result in transcript")
}

#[tokio::test]
async fn weather_turn_never_calls_the_model() {
    let harness = harness(RecordingLlm::scripted(Vec::new(), Vec::new())).await;
    let id = ConversationId("weather".to_string());

    let reply = harness.runtime.chat("Weather in Paris", &id).await;

    for expected in ["Paris", "18", "14.0", "20.0"] {
        assert!(reply.contains(expected), "{expected} missing from {reply}");
    }
    assert_eq!(harness.llm.total_calls(), 0);
}

#[tokio::test]
async fn persona_reply_carries_the_pinned_name() {
    let harness = harness(RecordingLlm::scripted(Vec::new(), Vec::new())).await;
    let id = ConversationId("persona".to_string());

    let first = harness.runtime.chat("Qual é o seu nome?", &id).await;
    let second = harness.runtime.chat("what's your name", &id).await;

    assert!(first.contains(ASSISTANT_NAME));
    assert!(second.contains(ASSISTANT_NAME));
    assert_eq!(harness.llm.total_calls(), 0);
}

#[tokio::test]
async fn executor_reads_the_seeded_products_through_the_guard() {
    let llm = RecordingLlm::scripted(
        vec![Ok("EXECUTE".to_string())],
        vec![
            sql_call("SELECT name FROM products ORDER BY id"),
            final_answer("There are 3 products: Widget A, Widget B and Gadget X."),
        ],
    );
    let harness = harness(llm).await;

    let reply = harness
        .runtime
        .chat("Which products are in the database?", &ConversationId("sql".to_string()))
        .await;

    assert_eq!(reply, "There are 3 products: Widget A, Widget B and Gadget X.");
    let transcripts = harness.llm.tool_transcripts.lock().expect("transcripts");
    assert_eq!(transcripts.len(), 2);
    assert_eq!(last_tool_output(&transcripts[1]), "name\nWidget A\nWidget B\nGadget X");
}

#[tokio::test]
async fn rejected_sql_is_reported_back_to_the_model() {
    let llm = RecordingLlm::scripted(
        vec![Ok("EXECUTE".to_string())],
        vec![sql_call("DROP TABLE products"), final_answer("I can only read data.")],
    );
    let harness = harness(llm).await;

    let reply = harness
        .runtime
        .chat("Please remove the products table", &ConversationId("drop".to_string()))
        .await;

    assert_eq!(reply, "I can only read data.");
    let transcripts = harness.llm.tool_transcripts.lock().expect("transcripts");
    assert_eq!(
        last_tool_output(&transcripts[1]),
        "Query not allowed: Query contains forbidden keyword or pattern: DROP"
    );
}

#[tokio::test]
async fn routing_outage_degrades_to_web_search() {
    let llm = RecordingLlm::scripted(vec![Err(LlmError::QuotaExceeded("insufficient_quota".to_string()))], Vec::new());
    let harness = harness(llm).await;

    let reply = harness.runtime.chat("Who won the final?", &ConversationId("news".to_string())).await;

    assert_eq!(reply, "The final was played on Sunday.\n\nSources:\n[1] https://sports.example/final");
    assert_eq!(harness.search.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tool_loop_outage_asks_to_try_again() {
    let llm = RecordingLlm::scripted(vec![Ok("EXECUTE".to_string())], Vec::new());
    let harness = harness(llm).await;

    let reply = harness.runtime.chat("Summarize the internal FAQ", &ConversationId("faq".to_string())).await;

    assert_eq!(reply, ResponseLanguage::En.try_again());
}

#[tokio::test]
async fn stream_reports_each_node_and_history_persists() {
    let harness = harness(RecordingLlm::scripted(Vec::new(), Vec::new())).await;
    let id = ConversationId("stream".to_string());

    harness.runtime.chat("hello", &id).await;
    let snapshots: Vec<_> = harness.runtime.stream("Weather in Paris", id.clone()).collect().await;

    let nodes: Vec<&str> = snapshots.iter().map(|snapshot| snapshot.node).collect();
    assert_eq!(nodes, vec!["router", "weather", "memory"]);
    let final_state = &snapshots[2].state;
    assert_eq!(final_state.messages.len(), 4);
    assert_eq!(final_state.messages[0].content(), "hello");
    assert!(final_state.flags.is_weather_query);
    assert!(harness.runtime.vector_heartbeat().await.is_err());
}
