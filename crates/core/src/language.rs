//! Fixed user-facing text, keyed by the configured response language.
//!
//! Handlers never build apology or clarification text inline; they ask the
//! catalogue so the two supported languages stay in lockstep.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseLanguage {
    #[default]
    #[serde(rename = "pt-br", alias = "pt_br", alias = "pt")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

impl std::str::FromStr for ResponseLanguage {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pt-br" | "pt_br" | "pt" => Ok(Self::PtBr),
            "en" | "en-us" | "en_us" => Ok(Self::En),
            other => Err(ConfigError::Validation(format!(
                "unsupported response language `{other}` (expected pt-br|en)"
            ))),
        }
    }
}

impl ResponseLanguage {
    pub fn code(self) -> &'static str {
        match self {
            Self::PtBr => "pt-br",
            Self::En => "en",
        }
    }

    pub fn empty_question(self) -> &'static str {
        match self {
            Self::PtBr => "Não recebi uma pergunta. Por favor, pergunte algo.",
            Self::En => "I did not receive a question. Please ask me something.",
        }
    }

    pub fn city_not_identified(self) -> &'static str {
        match self {
            Self::PtBr => {
                "Desculpe, não consegui identificar a cidade. Por favor, especifique a cidade (ex: 'clima em São Paulo')."
            }
            Self::En => {
                "Sorry, I could not identify the city. Please name the city (e.g. 'weather in London')."
            }
        }
    }

    pub fn invalid_city(self) -> &'static str {
        match self {
            Self::PtBr => "Por favor, forneça um nome de cidade válido.",
            Self::En => "Please provide a valid city name.",
        }
    }

    pub fn weather_not_configured(self) -> &'static str {
        match self {
            Self::PtBr => "A API do clima não está configurada. Defina ATLAS_WEATHER_API_KEY.",
            Self::En => "The weather API is not configured. Set ATLAS_WEATHER_API_KEY.",
        }
    }

    pub fn weather_unavailable(self) -> &'static str {
        match self {
            Self::PtBr => "Não foi possível obter dados do clima. Tente novamente.",
            Self::En => "I could not fetch weather data. Please try again.",
        }
    }

    pub fn search_not_configured(self) -> &'static str {
        match self {
            Self::PtBr => "A busca na web não está configurada. Defina ATLAS_SEARCH_API_KEY.",
            Self::En => "Web search is not configured. Set ATLAS_SEARCH_API_KEY.",
        }
    }

    pub fn search_no_results(self) -> &'static str {
        match self {
            Self::PtBr => "Nenhum resultado encontrado.",
            Self::En => "No results found.",
        }
    }

    pub fn rate_limited(self) -> &'static str {
        match self {
            Self::PtBr => "Limite de requisições atingido. Tente novamente em alguns instantes.",
            Self::En => "Request limit reached. Please try again in a moment.",
        }
    }

    pub fn search_failed(self, detail: &str) -> String {
        match self {
            Self::PtBr => format!("Erro na busca: {detail}. Tente reformular a pergunta."),
            Self::En => format!("Search failed: {detail}. Try rephrasing the question."),
        }
    }

    pub fn quota_exceeded(self) -> &'static str {
        match self {
            Self::PtBr => {
                "Desculpe, a cota do provedor de modelo foi excedida. Verifique os créditos da conta ou atualize a chave da API e tente novamente."
            }
            Self::En => {
                "Sorry, the model provider quota has been exceeded. Check the account credits or update the API key and try again."
            }
        }
    }

    pub fn try_again(self) -> &'static str {
        match self {
            Self::PtBr => "Desculpe, não consegui concluir sua solicitação agora. Tente novamente.",
            Self::En => "Sorry, I could not complete your request right now. Please try again.",
        }
    }

    pub fn sources_heading(self) -> &'static str {
        match self {
            Self::PtBr => "Fontes:",
            Self::En => "Sources:",
        }
    }

    pub fn no_documents(self) -> &'static str {
        match self {
            Self::PtBr => "Nenhum documento relevante encontrado na base de conhecimento.",
            Self::En => "No relevant documents found in the knowledge base.",
        }
    }

    /// Instruction appended to model prompts so replies land in this language.
    pub fn answer_rule(self) -> &'static str {
        match self {
            Self::PtBr => {
                "REGRA OBRIGATÓRIA: Responda SEMPRE em português brasileiro (PT-BR), independentemente do idioma da pergunta."
            }
            Self::En => "MANDATORY RULE: Always answer in English, whatever the language of the question.",
        }
    }
}
