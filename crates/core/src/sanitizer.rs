//! Scraped-page cleanup for web search snippets.
//!
//! Output is empty or free of raw URLs, and no two kept lines share the same
//! case-insensitive 60-char prefix.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

const MIN_LINE_CHARS: usize = 30;
const DEDUP_PREFIX_CHARS: usize = 60;
const MAX_SEPARATORS: usize = 2;
const ECHO_MIN_CHARS: usize = 6;
const ECHO_MAX_CHARS: usize = 51;

struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

static REWRITES: LazyLock<Vec<Rewrite>> = LazyLock::new(|| {
    [
        (r"#{1,6}\s*", ""),
        (r"(?m)^\d+\.\s+", ""),
        (r"\*{1,2}([^*]+)\*{1,2}", "$1"),
        (r"\[\.{2,3}\]", ""),
        (r"https?://\S+", ""),
        (r"\\[nrt]", " "),
    ]
    .into_iter()
    .map(|(source, replacement)| Rewrite {
        pattern: Regex::new(source).expect("valid sanitizer rewrite regex"),
        replacement,
    })
    .collect()
});

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(",
        r"cnpj|cep\s*:?\s*\d|telefone\s*:?\s*\(|fone\s*:?\s*\(|whatsapp|",
        r"rodap[eé]|cookie|consent|acessibilidade|pol[ií]tica de privacidade|privacy policy|",
        r"termos? de uso|terms of use|fale conosco|ouvidoria|copyright|©|",
        r"facebook\s+twitter|linkedin\s+twitter|instagram\s+facebook|",
        r"icone marca|favicon|\.png\b|\.jpg\b|\.svg\b|",
        r"pular para o conte[uú]do|skip to content|",
        r"todos os direitos|all rights reserved|",
        r"portal da prefeitura|menu\s+oculto|gabinete do prefeito|",
        r"n[uú]cleo de comunica[cç][aã]o|hor[aá]rios?\s+de\s+funcionamento|",
        r"lista de respons[aá]veis|acesso [àa] informa[cç][aã]o|",
        r"ative o javascript|enable javascript|download on the app\s*store|",
        r"google play|app store|escolha a cor|escolha o tamanho|",
        r"c[oó]digo fornecido|iframe|embed\s+code|",
        r"\d{2,4}x\d{2,4}\b|",
        r"voltar ao topo|back to top|leia mais|read more|saiba mais|",
        r"clique aqui|click here|menu principal|main menu|",
        r"logotipo|banner|slider|carousel|",
        r"rel[oó]gio online|hora exata|fuso hor[aá]rio|timezone|",
        r"inscreva.se|subscribe|newsletter|",
        r"compartilh[ae]|share this|tweet this",
        r")",
    ))
    .expect("valid sanitizer noise regex")
});

static RUNS_OF_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));

pub fn clean(text: &str, max_chars: usize) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut rewritten = text.to_owned();
    for rewrite in REWRITES.iter() {
        rewritten = rewrite.pattern.replace_all(&rewritten, rewrite.replacement).into_owned();
    }

    let mut seen = HashSet::new();
    let kept: Vec<&str> = rewritten
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .filter(|line| !NOISE.is_match(line))
        .filter(|line| line.matches('|').count() <= MAX_SEPARATORS)
        .filter(|line| line.matches('\u{2014}').count() <= MAX_SEPARATORS)
        .filter(|line| {
            let key: String = line.to_lowercase().chars().take(DEDUP_PREFIX_CHARS).collect();
            seen.insert(key)
        })
        .collect();

    let joined = kept.join(" ");
    let collapsed = RUNS_OF_WHITESPACE.replace_all(&joined, " ");
    let unechoed = collapse_echoes(&collapsed);
    unechoed.chars().take(max_chars).collect::<String>().trim().to_owned()
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Collapses a phrase of 6..=51 word/space chars repeated back to back into
/// one copy. The longest phrase at each position wins.
fn collapse_echoes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len());
    let mut index = 0;

    while index < chars.len() {
        let at_word_start =
            is_word(chars[index]) && (index == 0 || !is_word(chars[index - 1]));
        let echo = if at_word_start { echo_length(&chars, index) } else { None };

        match echo {
            Some(length) => {
                output.extend(&chars[index..index + length]);
                let mut next = index + length;
                while chars.get(next..next + length) == Some(&chars[index..index + length]) {
                    next += length;
                }
                index = next;
            }
            None => {
                output.push(chars[index]);
                index += 1;
            }
        }
    }
    output
}

fn echo_length(chars: &[char], start: usize) -> Option<usize> {
    let available = chars.len().saturating_sub(start) / 2;
    let longest = ECHO_MAX_CHARS.min(available);
    (ECHO_MIN_CHARS..=longest).rev().find(|&length| {
        let phrase = &chars[start..start + length];
        phrase[1..].iter().all(|c| is_word(*c) || c.is_whitespace())
            && chars[start + length..start + 2 * length] == *phrase
    })
}
