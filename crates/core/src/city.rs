//! City and optional country extraction from a free-text weather question.
//!
//! Tier 1 looks for a preposition followed by a capitalized phrase, optionally
//! suffixed with `/Country` or `, Country`. Inside the phrase only a short
//! connector (`de`, `da`, `dos`, `del`, `e`, ...) may be lowercase. Tier 2 joins every capitalized token
//! that is not a known question or weather word. Tier 2 is permissive and can
//! pick up unrelated proper nouns.

use std::sync::LazyLock;

use regex::Regex;

static PREPOSITION_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:em|in|de|for|para|at)\s+",
        r"([A-ZÀ-ÚÑ][a-záàâãéèêíïóôõöúçñ]+",
        r"(?:(?:[\s\-]+(?:d[aeo]s?|del|e))?[\s\-]+[A-ZÀ-ÚÑ][a-záàâãéèêíïóôõöúçñ]+)*",
        r"(?:[/,]\s*[A-Za-zÀ-ÚÑà-úñ]+)?)",
    ))
    .expect("valid city extraction regex")
});

static TOKEN_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?.!,/]").expect("valid token punctuation regex"));

const STOP_WORDS: &[&str] = &[
    "Como",
    "Qual",
    "What",
    "How",
    "The",
    "Uma",
    "Está",
    "Sera",
    "Será",
    "Vai",
    "Will",
    "Does",
    "Can",
    "Que",
    "Por",
    "Não",
    "Para",
    "Hoje",
    "Amanhã",
    "Clima",
    "Weather",
    "Tempo",
    "Temperature",
    "Temperatura",
    "Previsão",
];

/// Returns `(city, country)`. `country` is only ever set by the preposition form.
pub fn extract(query: &str) -> (Option<String>, Option<String>) {
    let query = query.trim();

    if let Some(raw) = PREPOSITION_CITY.captures(query).and_then(|captures| captures.get(1)) {
        let raw = raw.as_str().trim().trim_end_matches(['?', '!', '.']);
        if let Some((city, country)) = raw.split_once('/').or_else(|| raw.split_once(',')) {
            return (non_empty(city), non_empty(country));
        }
        return (non_empty(raw), None);
    }

    let candidates: Vec<String> = query
        .split_whitespace()
        .map(|word| TOKEN_PUNCTUATION.replace_all(word, "").into_owned())
        .filter(|word| {
            word.chars().next().is_some_and(char::is_uppercase)
                && word.chars().count() > 2
                && !STOP_WORDS.contains(&word.as_str())
        })
        .collect();

    if candidates.is_empty() {
        return (None, None);
    }
    (Some(candidates.join(" ")), None)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
