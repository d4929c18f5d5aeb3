use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language::ResponseLanguage;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub weather: WeatherConfig,
    pub search: SearchConfig,
    pub vector: VectorConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    /// Only read for `azure_openai`, where `model` names the deployment.
    pub api_version: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub units: String,
    pub lang: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

/// Exponential backoff for adapters that retry rate limits and transient network errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub max_results: usize,
    pub search_depth: String,
    pub timeout_secs: u64,
    pub max_content_chars: usize,
}

#[derive(Clone, Debug)]
pub struct VectorConfig {
    pub base_url: String,
    pub collection: String,
    pub top_k: usize,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub response_language: ResponseLanguage,
    pub history_window: usize,
    pub max_tool_iterations: u32,
    pub router_query_max_chars: usize,
    pub synthesis_context_chars: usize,
    pub max_links: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    AzureOpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub response_language: Option<ResponseLanguage>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://atlas.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                api_version: "2024-02-15-preview".to_string(),
                timeout_secs: 60,
                temperature: 0.0,
            },
            weather: WeatherConfig {
                api_key: None,
                base_url: "https://api.openweathermap.org/data/2.5".to_string(),
                units: "metric".to_string(),
                lang: "pt_br".to_string(),
                timeout_secs: 10,
                retry: RetryConfig::default(),
            },
            search: SearchConfig {
                api_key: None,
                base_url: "https://api.tavily.com".to_string(),
                max_results: 5,
                search_depth: "advanced".to_string(),
                timeout_secs: 20,
                max_content_chars: 1_000,
            },
            vector: VectorConfig {
                base_url: "http://localhost:8000".to_string(),
                collection: "atlas_docs".to_string(),
                top_k: 4,
                embedding_model: "nomic-embed-text".to_string(),
                timeout_secs: 15,
            },
            agent: AgentConfig {
                response_language: ResponseLanguage::PtBr,
                history_window: 20,
                max_tool_iterations: 6,
                router_query_max_chars: 500,
                synthesis_context_chars: 1_500,
                max_links: 3,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 2_000, max_delay_ms: 8_000 }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "azure_openai" | "azure" => Ok(Self::AzureOpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|azure_openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("atlas.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(api_version) = llm.api_version {
                self.llm.api_version = api_version;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(api_key) = weather.api_key {
                self.weather.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = weather.base_url {
                self.weather.base_url = base_url;
            }
            if let Some(units) = weather.units {
                self.weather.units = units;
            }
            if let Some(lang) = weather.lang {
                self.weather.lang = lang;
            }
            if let Some(timeout_secs) = weather.timeout_secs {
                self.weather.timeout_secs = timeout_secs;
            }
            if let Some(max_attempts) = weather.max_attempts {
                self.weather.retry.max_attempts = max_attempts;
            }
            if let Some(base_delay_ms) = weather.base_delay_ms {
                self.weather.retry.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = weather.max_delay_ms {
                self.weather.retry.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(search) = patch.search {
            if let Some(api_key) = search.api_key {
                self.search.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(max_results) = search.max_results {
                self.search.max_results = max_results;
            }
            if let Some(search_depth) = search.search_depth {
                self.search.search_depth = search_depth;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
            if let Some(max_content_chars) = search.max_content_chars {
                self.search.max_content_chars = max_content_chars;
            }
        }

        if let Some(vector) = patch.vector {
            if let Some(base_url) = vector.base_url {
                self.vector.base_url = base_url;
            }
            if let Some(collection) = vector.collection {
                self.vector.collection = collection;
            }
            if let Some(top_k) = vector.top_k {
                self.vector.top_k = top_k;
            }
            if let Some(embedding_model) = vector.embedding_model {
                self.vector.embedding_model = embedding_model;
            }
            if let Some(timeout_secs) = vector.timeout_secs {
                self.vector.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(response_language) = agent.response_language {
                self.agent.response_language = response_language;
            }
            if let Some(history_window) = agent.history_window {
                self.agent.history_window = history_window;
            }
            if let Some(max_tool_iterations) = agent.max_tool_iterations {
                self.agent.max_tool_iterations = max_tool_iterations;
            }
            if let Some(router_query_max_chars) = agent.router_query_max_chars {
                self.agent.router_query_max_chars = router_query_max_chars;
            }
            if let Some(synthesis_context_chars) = agent.synthesis_context_chars {
                self.agent.synthesis_context_chars = synthesis_context_chars;
            }
            if let Some(max_links) = agent.max_links {
                self.agent.max_links = max_links;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ATLAS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ATLAS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ATLAS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ATLAS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ATLAS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ATLAS_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ATLAS_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY")) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATLAS_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ATLAS_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ATLAS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ATLAS_LLM_TIMEOUT_SECS", &value)?;
        }

        let weather_key =
            read_env("ATLAS_WEATHER_API_KEY").or_else(|| read_env("OPENWEATHERMAP_API_KEY"));
        if let Some(value) = weather_key {
            self.weather.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATLAS_WEATHER_BASE_URL") {
            self.weather.base_url = value;
        }
        if let Some(value) = read_env("ATLAS_WEATHER_MAX_ATTEMPTS") {
            self.weather.retry.max_attempts = parse_u32("ATLAS_WEATHER_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("ATLAS_SEARCH_API_KEY").or_else(|| read_env("TAVILY_API_KEY"))
        {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATLAS_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }

        if let Some(value) = read_env("ATLAS_VECTOR_BASE_URL") {
            self.vector.base_url = value;
        }
        if let Some(value) = read_env("ATLAS_VECTOR_COLLECTION") {
            self.vector.collection = value;
        }

        if let Some(value) = read_env("ATLAS_AGENT_RESPONSE_LANGUAGE") {
            self.agent.response_language = value.parse()?;
        }
        if let Some(value) = read_env("ATLAS_AGENT_HISTORY_WINDOW") {
            self.agent.history_window = parse_usize("ATLAS_AGENT_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("ATLAS_AGENT_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations =
                parse_u32("ATLAS_AGENT_MAX_TOOL_ITERATIONS", &value)?;
        }

        if let Some(value) = read_env("ATLAS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ATLAS_SERVER_PORT") {
            self.server.port = parse_u16("ATLAS_SERVER_PORT", &value)?;
        }

        let log_level = read_env("ATLAS_LOGGING_LEVEL").or_else(|| read_env("ATLAS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("ATLAS_LOGGING_FORMAT").or_else(|| read_env("ATLAS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(weather_api_key) = overrides.weather_api_key {
            self.weather.api_key = Some(secret_value(weather_api_key));
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = Some(secret_value(search_api_key));
        }
        if let Some(response_language) = overrides.response_language {
            self.agent.response_language = response_language;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_weather(&self.weather)?;
        validate_search(&self.search)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("atlas.toml"), PathBuf::from("config/atlas.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let missing_base_url =
        llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::AzureOpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/azure_openai providers".to_string(),
                ));
            }
            if llm.provider == LlmProvider::AzureOpenAi && missing_base_url {
                return Err(ConfigError::Validation(
                    "llm.base_url (the Azure endpoint) is required for azure_openai provider"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            if missing_base_url {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    validate_http_url("weather.base_url", &weather.base_url)?;

    if weather.timeout_secs == 0 || weather.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "weather.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if weather.retry.max_attempts == 0 || weather.retry.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "weather.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    validate_http_url("search.base_url", &search.base_url)?;

    if search.max_results == 0 {
        return Err(ConfigError::Validation(
            "search.max_results must be greater than zero".to_string(),
        ));
    }

    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.history_window < 2 {
        return Err(ConfigError::Validation(
            "agent.history_window must keep at least one exchange (>= 2)".to_string(),
        ));
    }

    if agent.max_tool_iterations == 0 || agent.max_tool_iterations > 16 {
        return Err(ConfigError::Validation(
            "agent.max_tool_iterations must be in range 1..=16".to_string(),
        ));
    }

    if agent.router_query_max_chars == 0 || agent.synthesis_context_chars == 0 {
        return Err(ConfigError::Validation(
            "agent.router_query_max_chars and agent.synthesis_context_chars must be positive"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    weather: Option<WeatherPatch>,
    search: Option<SearchPatch>,
    vector: Option<VectorPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    units: Option<String>,
    lang: Option<String>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    max_results: Option<usize>,
    search_depth: Option<String>,
    timeout_secs: Option<u64>,
    max_content_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorPatch {
    base_url: Option<String>,
    collection: Option<String>,
    top_k: Option<usize>,
    embedding_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    response_language: Option<ResponseLanguage>,
    history_window: Option<usize>,
    max_tool_iterations: Option<u32>,
    router_query_max_chars: Option<usize>,
    synthesis_context_chars: Option<usize>,
    max_links: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
