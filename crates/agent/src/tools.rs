use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use atlas_core::errors::truncate_for_log;
use atlas_core::language::ResponseLanguage;
use atlas_core::weather::compose_reply;
use atlas_db::{QueryExecutor, QueryParams};

use crate::adapters::{
    fetch_weather, run_web_search, search_docs, SearchSettings, VectorStore, WeatherApi, WebSearchApi,
};
use crate::guardrails::SqlGuard;
use crate::llm::ToolSpec;

const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";
const TOOL_LINKS: usize = 3;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    /// Err only for malformed arguments. Service failures come back as text.
    async fn execute(&self, args: Value) -> Result<String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        specs.sort_by(|left, right| left.name.cmp(&right.name));
        specs
    }

    /// Runs one model-requested call. Every outcome is a string the model can read.
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(event_name = "agent.tool.unknown", tool = name, "model requested an unknown tool");
            return format!("Unknown tool: {name}");
        };

        let started = Instant::now();
        let outcome = match parse_arguments(raw_arguments) {
            Ok(arguments) => tool.execute(arguments).await,
            Err(error) => Err(error),
        };
        match outcome {
            Ok(output) => {
                info!(
                    event_name = "agent.tool.completed",
                    tool = name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    output_chars = output.chars().count(),
                    "tool call completed"
                );
                output
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tool.invalid_arguments",
                    tool = name,
                    error = %truncate_for_log(&format!("{error:#}"), 200),
                    "tool call rejected"
                );
                format!("Invalid arguments for {name}: {error:#}")
            }
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).context("arguments are not valid JSON")
}

fn arguments<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T> {
    serde_json::from_value(args).context("arguments do not match the tool schema")
}

#[derive(Deserialize)]
struct SqlArgs {
    query: String,
    #[serde(default)]
    params: Option<Value>,
}

pub struct SqlTool {
    guard: SqlGuard,
    executor: Arc<dyn QueryExecutor>,
}

impl SqlTool {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { guard: SqlGuard, executor }
    }
}

#[async_trait]
impl Tool for SqlTool {
    fn name(&self) -> &'static str {
        "sql_db"
    }

    fn description(&self) -> &'static str {
        "Run a read-only SELECT query on the database. Use for questions about data in tables. \
         Only SELECT is allowed. Pass values in params (array for ?1, ?2 or object for :name) instead of inlining them."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "SQL SELECT query with placeholders like ?1 or :name" },
                "params": { "description": "Values bound to the placeholders", "type": ["array", "object", "null"] },
            },
            "required": ["query"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let SqlArgs { query, params } = arguments(args)?;
        let verdict = self.guard.validate(&query);
        if !verdict.allowed {
            warn!(event_name = "agent.tool.sql.rejected", reason = %verdict.reason, "sql guard rejected query");
            return Ok(format!("Query not allowed: {}", verdict.reason));
        }

        let params = match QueryParams::from_json(params.as_ref()) {
            Ok(params) => params,
            Err(error) => return Ok(format!("Execution error: {error}")),
        };
        match self.executor.execute(&query, &params).await {
            Ok(rows) => Ok(rows.render()),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.sql.failed",
                    error = %truncate_for_log(&error.to_string(), 200),
                    "sql execution failed"
                );
                Ok(format!("Execution error: {error}"))
            }
        }
    }
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

pub struct SearchDocsTool {
    store: Arc<dyn VectorStore>,
    top_k: usize,
    language: ResponseLanguage,
}

impl SearchDocsTool {
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize, language: ResponseLanguage) -> Self {
        Self { store, top_k, language }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &'static str {
        "search_docs"
    }

    fn description(&self) -> &'static str {
        "Search the internal knowledge base (documents, FAQs, policies). \
         Do not use for current facts from the web; use web_search for that."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Natural language question for the knowledge base" },
            },
            "required": ["query"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let QueryArgs { query } = arguments(args)?;
        let parts: Vec<String> = search_docs(self.store.as_ref(), &query, self.top_k)
            .await
            .into_iter()
            .map(|chunk| chunk.content)
            .filter(|content| !content.is_empty())
            .collect();
        if parts.is_empty() {
            return Ok(self.language.no_documents().to_string());
        }
        Ok(parts.join(DOCUMENT_SEPARATOR))
    }
}

#[derive(Deserialize)]
struct WeatherArgs {
    city: String,
    #[serde(default)]
    country: Option<String>,
}

pub struct WeatherTool {
    api: Arc<dyn WeatherApi>,
    language: ResponseLanguage,
}

impl WeatherTool {
    pub fn new(api: Arc<dyn WeatherApi>, language: ResponseLanguage) -> Self {
        Self { api, language }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "weather_api"
    }

    fn description(&self) -> &'static str {
        "Get current weather and today's min/max for a city. Use when the user asks about weather, temperature or climate."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City name" },
                "country": { "type": "string", "description": "Country or state code (optional)" },
            },
            "required": ["city"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let WeatherArgs { city, country } = arguments(args)?;
        let result = fetch_weather(self.api.as_ref(), &city, country.as_deref(), self.language).await;
        Ok(match result.raw_data {
            Some(report) => compose_reply(&report.current, &report.daily, &city, self.language),
            None => result.summary,
        })
    }
}

pub struct WebSearchTool {
    api: Arc<dyn WebSearchApi>,
    settings: SearchSettings,
    language: ResponseLanguage,
}

impl WebSearchTool {
    pub fn new(api: Arc<dyn WebSearchApi>, settings: SearchSettings, language: ResponseLanguage) -> Self {
        Self { api, settings, language }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for current information: recent events or facts not in the knowledge base. \
         Returns text with numbered source URLs."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query or question to look up on the web" },
            },
            "required": ["query"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let QueryArgs { query } = arguments(args)?;
        let result = run_web_search(self.api.as_ref(), &query, self.settings, self.language).await;
        let mut output = result.answer.unwrap_or(result.summary);
        if !result.links.is_empty() {
            output.push_str("\n\n");
            output.push_str(self.language.sources_heading());
            for (index, link) in result.links.iter().take(TOOL_LINKS).enumerate() {
                output.push_str(&format!("\n[{}] {link}", index + 1));
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use atlas_core::language::ResponseLanguage;
    use atlas_db::{QueryExecutor, QueryParams, QueryRows, RepositoryError};

    use super::{SqlTool, ToolRegistry, WebSearchTool};
    use crate::adapters::{AdapterError, SearchHit, SearchResponse, SearchSettings, WebSearchApi};

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, QueryParams)>>,
    }

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryRows, RepositoryError> {
            self.calls.lock().expect("calls lock").push((sql.to_string(), params.clone()));
            Ok(QueryRows {
                columns: vec!["name".to_string()],
                rows: vec![vec!["Widget A".to_string()]],
            })
        }
    }

    fn sql_registry(executor: Arc<RecordingExecutor>) -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.register(SqlTool::new(executor));
        registry
    }

    #[tokio::test]
    async fn rejected_sql_never_reaches_the_executor() {
        let executor = Arc::new(RecordingExecutor::default());
        let registry = sql_registry(executor.clone());

        let output = registry.execute("sql_db", r#"{"query":"DELETE FROM products"}"#).await;

        assert_eq!(output, "Query not allowed: Query contains forbidden keyword or pattern: DELETE");
        assert!(executor.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn approved_sql_binds_params() {
        let executor = Arc::new(RecordingExecutor::default());
        let registry = sql_registry(executor.clone());

        let output = registry
            .execute("sql_db", r#"{"query":"SELECT name FROM products WHERE price > ?1","params":[20]}"#)
            .await;

        assert_eq!(output, "name\nWidget A");
        let calls = executor.calls.lock().expect("calls lock");
        assert_eq!(calls[0].1, QueryParams::Positional(vec![json!(20)]));
    }

    #[tokio::test]
    async fn bad_arguments_and_unknown_tools_are_reported_as_text() {
        let registry = sql_registry(Arc::new(RecordingExecutor::default()));

        assert!(registry.execute("sql_db", "{not json").await.starts_with("Invalid arguments for sql_db"));
        assert!(registry.execute("sql_db", r#"{"sql":"SELECT 1"}"#).await.starts_with("Invalid arguments"));
        assert_eq!(registry.execute("shell", "{}").await, "Unknown tool: shell");
    }

    struct ManyLinks;

    #[async_trait]
    impl WebSearchApi for ManyLinks {
        async fn search(&self, _query: &str) -> Result<SearchResponse, AdapterError> {
            Ok(SearchResponse {
                answer: Some("Lisbon is the capital of Portugal.".to_string()),
                results: (1..=5)
                    .map(|index| SearchHit { url: format!("https://s{index}.example"), content: String::new() })
                    .collect(),
            })
        }
    }

    #[tokio::test]
    async fn web_search_tool_lists_at_most_three_sources() {
        let mut registry = ToolRegistry::default();
        registry.register(WebSearchTool::new(Arc::new(ManyLinks), SearchSettings::default(), ResponseLanguage::En));

        let output = registry.execute("web_search", r#"{"query":"capital of portugal"}"#).await;

        assert_eq!(
            output,
            "Lisbon is the capital of Portugal.\n\nSources:\n[1] https://s1.example\n[2] https://s2.example\n[3] https://s3.example"
        );
        let specs = registry.specs();
        assert_eq!(specs[0].name, "web_search");
        assert_eq!(specs[0].parameters["required"], Value::from(vec!["query"]));
    }
}
