//! Social-utterance detection and the assistant's canned persona replies.
//!
//! The pattern table is data: each tag owns an ordered list of regexes and the
//! table is scanned in declaration order, first hit wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pinned self-reported name. Every persona reply carries this literal.
pub const ASSISTANT_NAME: &str = "Atlas";

const ROLE_PT: &str = "assistente de IA especializado";
const ROLE_EN: &str = "specialized AI assistant";

const CAPABILITIES_PT: [&str; 4] = [
    "pesquisar informações na web",
    "consultar documentos internos",
    "acessar bancos de dados",
    "fornecer previsões do tempo",
];

const CAPABILITIES_EN: [&str; 4] = [
    "search the web",
    "query internal documents",
    "access databases",
    "provide weather forecasts",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    NamePt,
    NameEn,
    GreetingPt,
    GreetingEn,
    CapabilitiesPt,
    CapabilitiesEn,
    ThanksPt,
    ThanksEn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topic {
    Name,
    Greeting,
    Capabilities,
    Thanks,
}

impl PatternTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NamePt => "name_pt",
            Self::NameEn => "name_en",
            Self::GreetingPt => "greeting_pt",
            Self::GreetingEn => "greeting_en",
            Self::CapabilitiesPt => "capabilities_pt",
            Self::CapabilitiesEn => "capabilities_en",
            Self::ThanksPt => "thanks_pt",
            Self::ThanksEn => "thanks_en",
        }
    }

    pub fn topic(self) -> Topic {
        match self {
            Self::NamePt | Self::NameEn => Topic::Name,
            Self::GreetingPt | Self::GreetingEn => Topic::Greeting,
            Self::CapabilitiesPt | Self::CapabilitiesEn => Topic::Capabilities,
            Self::ThanksPt | Self::ThanksEn => Topic::Thanks,
        }
    }

    pub fn is_portuguese(self) -> bool {
        self.as_str().ends_with("_pt")
    }
}

const PATTERN_SOURCES: &[(PatternTag, &[&str])] = &[
    (
        PatternTag::NamePt,
        &[
            r"\bqual\s+(é|eh|e)?\s*o\s+seu\s+nome\b",
            r"\bcomo\s+(você|vc|voce)\s+se\s+chama\b",
            r"\bqual\s+seu\s+nome\b",
            r"\b(me\s+)?diz\s+seu\s+nome\b",
            r"\bseu\s+nome\s+(é|eh)\s+o?\s*qu[eê]\b",
            r"\bquem\s+(é|eh)\s+(você|vc|voce)\b",
        ],
    ),
    (
        PatternTag::NameEn,
        &[
            r"\bwhat'?s?\s+your\s+name\b",
            r"\bwhat\s+(is|are)\s+you(r)?\s+(name|called)\b",
            r"\bwho\s+are\s+you\b",
            r"\btell\s+me\s+your\s+name\b",
        ],
    ),
    (
        PatternTag::GreetingPt,
        &[r"^(oi|olá|ola|e aí|e ai|eae)\b", r"\bbom\s+dia\b", r"\bboa\s+tarde\b", r"\bboa\s+noite\b"],
    ),
    (
        PatternTag::GreetingEn,
        &[r"^(hi|hello|hey|howdy)[\s!?]*$", r"\bgood\s+(morning|afternoon|evening|day)\b"],
    ),
    (
        PatternTag::CapabilitiesPt,
        &[
            r"\bo\s+que\s+(você|vc|voce)\s+(pode|consegue|sabe)\s+(fazer|me\s+ajudar)\b",
            r"\bquais\s+(são|sao)\s+(suas|as\s+suas)\s+funcionalidades\b",
            r"\bcomo\s+(você|vc|voce)\s+(funciona|trabalha)\b",
        ],
    ),
    (
        PatternTag::CapabilitiesEn,
        &[
            r"\bwhat\s+can\s+you\s+do\b",
            r"\bwhat\s+are\s+your\s+(capabilities|features)\b",
            r"\bhow\s+do\s+you\s+work\b",
        ],
    ),
    (PatternTag::ThanksPt, &[r"\b(obrigad[oa]|valeu|brigad[oa])\b"]),
    (PatternTag::ThanksEn, &[r"\b(thank\s+you|thanks|thx)\b"]),
];

static PATTERNS: LazyLock<Vec<(PatternTag, Vec<Regex>)>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .map(|(tag, sources)| {
            let compiled = sources
                .iter()
                .map(|source| {
                    Regex::new(&format!("(?i){source}")).expect("valid persona pattern regex")
                })
                .collect();
            (*tag, compiled)
        })
        .collect()
});

/// Returns the first tag whose pattern matches the lowercased, trimmed query.
pub fn detect(query: &str) -> Option<PatternTag> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|pattern| pattern.is_match(&normalized)))
        .map(|(tag, _)| *tag)
}

/// Canned reply for `tag`. The query is accepted for symmetry with `detect` and unused.
pub fn respond(tag: PatternTag, _query: &str) -> String {
    let portuguese = tag.is_portuguese();
    match (tag.topic(), portuguese) {
        (Topic::Name, true) => format!(
            "Meu nome é {ASSISTANT_NAME}! Sou um {ROLE_PT} e estou aqui para ajudar você com diversas tarefas. Como posso ajudar?"
        ),
        (Topic::Name, false) => format!(
            "My name is {ASSISTANT_NAME}! I'm a {ROLE_EN} and I'm here to help you with various tasks. How can I assist you?"
        ),
        (Topic::Greeting, true) => format!(
            "Olá! Eu sou {ASSISTANT_NAME}, seu assistente de IA. Estou aqui para ajudar! O que você gostaria de saber?"
        ),
        (Topic::Greeting, false) => format!(
            "Hello! I'm {ASSISTANT_NAME}, your AI assistant. I'm here to help! What would you like to know?"
        ),
        (Topic::Capabilities, true) => format!(
            "Sou {ASSISTANT_NAME}, e posso ajudar você a:\n{}\n\nO que você precisa?",
            bullets(&CAPABILITIES_PT)
        ),
        (Topic::Capabilities, false) => format!(
            "I'm {ASSISTANT_NAME}, and I can help you:\n{}\n\nWhat do you need?",
            bullets(&CAPABILITIES_EN)
        ),
        (Topic::Thanks, true) => {
            format!("De nada! Sou {ASSISTANT_NAME} e estou aqui sempre que precisar. 😊")
        }
        (Topic::Thanks, false) => {
            format!("You're welcome! I'm {ASSISTANT_NAME} and I'm here whenever you need. 😊")
        }
    }
}

fn bullets(items: &[&str]) -> String {
    items.iter().map(|item| format!("• {item}")).collect::<Vec<_>>().join("\n")
}
