use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;

use atlas_core::config::AppConfig;
use atlas_core::domain::conversation::{ConversationId, ConversationState, Message, Role};
use atlas_core::errors::ApplicationError;
use atlas_core::language::ResponseLanguage;
use atlas_db::{ConversationRepository, DbPool, InMemoryConversationRepository, QueryExecutor, SqliteQueryExecutor};

use crate::adapters::{
    AdapterError, ChromaClient, OpenWeatherClient, SearchSettings, TavilyClient, VectorStore, WeatherApi,
    WebSearchApi,
};
use crate::graph::{GraphHandlers, OrchestrationGraph, StateSnapshot};
use crate::handlers::{ConversationHandler, ExecutorHandler, FallbackSearchHandler, FallbackSettings, WeatherHandler};
use crate::llm::{LlmClient, OpenAiCompatibleClient};
use crate::memory::MemorySink;
use crate::router::Router;
use crate::tools::{SearchDocsTool, SqlTool, ToolRegistry, WeatherTool, WebSearchTool};

/// External capabilities the graph is wired against.
pub struct AgentDependencies {
    pub llm: Arc<dyn LlmClient>,
    pub weather: Arc<dyn WeatherApi>,
    pub search: Arc<dyn WebSearchApi>,
    pub vector: Arc<dyn VectorStore>,
    pub sql: Arc<dyn QueryExecutor>,
    pub conversations: Arc<dyn ConversationRepository>,
}

/// Context object built once at process start and shared by every request.
#[derive(Clone)]
pub struct AgentRuntime {
    graph: Arc<OrchestrationGraph>,
    vector: Arc<dyn VectorStore>,
    language: ResponseLanguage,
}

impl AgentRuntime {
    pub fn new(config: &AppConfig, dependencies: AgentDependencies) -> Self {
        let agent = &config.agent;
        let language = agent.response_language;
        let search_settings = SearchSettings::from(&config.search);

        let mut tools = ToolRegistry::default();
        tools.register(SqlTool::new(Arc::clone(&dependencies.sql)));
        tools.register(SearchDocsTool::new(Arc::clone(&dependencies.vector), config.vector.top_k, language));
        tools.register(WeatherTool::new(Arc::clone(&dependencies.weather), language));
        tools.register(WebSearchTool::new(Arc::clone(&dependencies.search), search_settings, language));

        let handlers = GraphHandlers {
            conversational: Arc::new(ConversationHandler),
            weather: Arc::new(WeatherHandler::new(Arc::clone(&dependencies.weather), language)),
            fallback_search: Arc::new(FallbackSearchHandler::new(
                Arc::clone(&dependencies.search),
                Arc::clone(&dependencies.llm),
                FallbackSettings {
                    search: search_settings,
                    synthesis_context_chars: agent.synthesis_context_chars,
                    max_links: agent.max_links,
                    language,
                },
            )),
            executor: Arc::new(ExecutorHandler::new(
                Arc::clone(&dependencies.llm),
                tools,
                agent.max_tool_iterations,
                language,
            )),
        };

        let graph = OrchestrationGraph::new(
            Router::new(Arc::clone(&dependencies.llm), agent.router_query_max_chars),
            handlers,
            MemorySink::new(agent.history_window),
            dependencies.conversations,
        );

        Self { graph: Arc::new(graph), vector: dependencies.vector, language }
    }

    /// Wires the HTTP clients named in `config` over an already migrated pool.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, ApplicationError> {
        let model = Arc::new(OpenAiCompatibleClient::from_config(&config.llm, &config.vector.embedding_model)?);
        let vector = ChromaClient::from_config(&config.vector, model.clone())?;
        let dependencies = AgentDependencies {
            llm: model,
            weather: Arc::new(OpenWeatherClient::from_config(&config.weather)?),
            search: Arc::new(TavilyClient::from_config(&config.search)?),
            vector: Arc::new(vector),
            sql: Arc::new(SqliteQueryExecutor::new(pool)),
            conversations: Arc::new(InMemoryConversationRepository::default()),
        };
        Ok(Self::new(config, dependencies))
    }

    pub fn graph(&self) -> &Arc<OrchestrationGraph> {
        &self.graph
    }

    /// Runs one turn for `message` and returns the reply text.
    pub async fn chat(&self, message: &str, id: &ConversationId) -> String {
        let state = self.graph.run(single_message(message), id).await;
        match state.messages.last() {
            Some(last) if last.role() == Role::Assistant => last.content().to_string(),
            _ => self.language.try_again().to_string(),
        }
    }

    pub fn stream(&self, message: &str, id: ConversationId) -> ReceiverStream<StateSnapshot> {
        self.graph.run_stream(single_message(message), id)
    }

    pub async fn vector_heartbeat(&self) -> Result<(), AdapterError> {
        self.vector.heartbeat().await
    }
}

fn single_message(message: &str) -> ConversationState {
    ConversationState::new(vec![Message::user(message)])
}
