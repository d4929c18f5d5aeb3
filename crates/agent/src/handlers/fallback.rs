use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use atlas_core::domain::conversation::{ConversationState, StateDelta};
use atlas_core::errors::truncate_for_log;
use atlas_core::language::ResponseLanguage;

use super::{latest_query, Handler};
use crate::adapters::{run_web_search, SearchSettings, WebSearchApi};
use crate::llm::{ChatMessage, LlmClient};

const EXTRACT_MIN_SENTENCE_CHARS: usize = 40;
const EXTRACT_MAX_SENTENCES: usize = 3;
const EXTRACT_FALLBACK_CHARS: usize = 300;
const CHROME_PREFIXES: &[&str] = &["Portal", "Menu", "Perfil do", "Foto "];

#[derive(Clone, Copy, Debug)]
pub struct FallbackSettings {
    pub search: SearchSettings,
    pub synthesis_context_chars: usize,
    pub max_links: usize,
    pub language: ResponseLanguage,
}

/// Web-search-only route. The model may only rephrase what the search returned.
pub struct FallbackSearchHandler {
    search: Arc<dyn WebSearchApi>,
    llm: Arc<dyn LlmClient>,
    settings: FallbackSettings,
}

impl FallbackSearchHandler {
    pub fn new(search: Arc<dyn WebSearchApi>, llm: Arc<dyn LlmClient>, settings: FallbackSettings) -> Self {
        Self { search, llm, settings }
    }

    async fn synthesize(&self, query: &str, context: &str) -> String {
        let language = self.settings.language;
        let prompt = synthesis_prompt(query, context, language);
        match self.llm.complete(&[ChatMessage::user(prompt)]).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => extract_brief(context),
            Err(error) => {
                warn!(
                    event_name = "agent.handler.fallback.synthesis_failed",
                    error = %truncate_for_log(&error.to_string(), 200),
                    "synthesis failed, extracting sentences"
                );
                extract_brief(context)
            }
        }
    }
}

#[async_trait]
impl Handler for FallbackSearchHandler {
    fn name(&self) -> &'static str {
        "fallback_search"
    }

    async fn handle(&self, state: &ConversationState) -> StateDelta {
        let language = self.settings.language;
        let query = latest_query(state);
        if query.is_empty() {
            return StateDelta::reply(language.empty_question());
        }

        let started = Instant::now();
        let result = run_web_search(self.search.as_ref(), query, self.settings.search, language).await;

        let answer = match result.answer.as_deref() {
            Some(answer) => answer.to_string(),
            // Failure or empty-result summaries are already user-facing.
            None if !result.found => result.summary.clone(),
            None => {
                let context: String =
                    result.summary.chars().take(self.settings.synthesis_context_chars).collect();
                self.synthesize(query, &context).await
            }
        };
        let reply = with_sources(answer, &result.links, self.settings.max_links, language);

        info!(
            event_name = "agent.handler.fallback.completed",
            link_count = result.links.len(),
            pre_synthesized = result.answer.is_some(),
            duration_ms = started.elapsed().as_millis() as u64,
            "fallback search reply produced"
        );
        StateDelta::reply(reply)
    }
}

fn synthesis_prompt(query: &str, context: &str, language: ResponseLanguage) -> String {
    match language {
        ResponseLanguage::PtBr => format!(
            "Com base nos resultados de pesquisa web abaixo, forneça uma resposta concisa e direta \
             à pergunta do usuário em 2-4 frases.\n\n{rule}\n\nPergunta do usuário: {query}\n\n\
             Resultados da pesquisa web:\n{context}\n\nInstruções:\n\
             - Sintetize apenas as informações CHAVE, ignore formatação, menus e rodapés\n\
             - Seja conciso e natural (2-4 frases no máximo)\n\
             - Cite fontes como [1], [2] se usar múltiplas\n\nResposta:",
            rule = language.answer_rule()
        ),
        ResponseLanguage::En => format!(
            "Using the web search results below, give a concise, direct answer to the user's \
             question in 2-4 sentences.\n\n{rule}\n\nUser question: {query}\n\n\
             Web search results:\n{context}\n\nInstructions:\n\
             - Keep only the KEY facts, ignore formatting, menus and footers\n\
             - Be concise and natural (2-4 sentences at most)\n\
             - Cite sources as [1], [2] when using several\n\nAnswer:",
            rule = language.answer_rule()
        ),
    }
}

/// Deterministic stand-in for synthesis: the first few substantial sentences.
fn extract_brief(context: &str) -> String {
    let useful: Vec<&str> = split_sentences(context)
        .into_iter()
        .filter(|sentence| sentence.chars().count() > EXTRACT_MIN_SENTENCE_CHARS)
        .filter(|sentence| !CHROME_PREFIXES.iter().any(|prefix| sentence.starts_with(prefix)))
        .take(EXTRACT_MAX_SENTENCES)
        .collect();

    let mut brief = if useful.is_empty() {
        context.chars().take(EXTRACT_FALLBACK_CHARS).collect::<String>().trim().to_string()
    } else {
        useful.join(" ")
    };
    if !brief.is_empty() && !brief.ends_with(['.', '!', '?']) {
        brief.push('.');
    }
    brief
}

/// Splits after a run of `.`, `!` or `?` that is followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;
    for (index, ch) in text.char_indices() {
        if after_terminal && ch.is_whitespace() {
            let sentence = text[start..index].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = index;
        }
        after_terminal = matches!(ch, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn with_sources(mut answer: String, links: &[String], max_links: usize, language: ResponseLanguage) -> String {
    let heading = language.sources_heading();
    let already_listed = answer.contains(heading) || links.iter().any(|link| answer.contains(link.as_str()));
    if links.is_empty() || already_listed {
        return answer;
    }
    answer.push_str("\n\n");
    answer.push_str(heading);
    for (index, link) in links.iter().take(max_links).enumerate() {
        answer.push_str(&format!("\n[{}] {link}", index + 1));
    }
    answer
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use atlas_core::domain::conversation::{ConversationState, Message};
    use atlas_core::language::ResponseLanguage;

    use super::{extract_brief, FallbackSearchHandler, FallbackSettings};
    use crate::adapters::{AdapterError, SearchHit, SearchResponse, SearchSettings, WebSearchApi};
    use crate::handlers::Handler;
    use crate::llm::{ChatMessage, LlmClient, LlmError, ModelReply, ToolSpec};

    struct CountingSearch {
        response: SearchResponse,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebSearchApi for CountingSearch {
        async fn search(&self, _query: &str) -> Result<SearchResponse, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    struct FixedLlm {
        reply: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .map_err(|()| LlmError::QuotaExceeded("insufficient_quota".to_string()))
        }

        async fn complete_with_tools(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelReply, LlmError> {
            unreachable!("fallback search never offers tools")
        }
    }

    fn settings() -> FallbackSettings {
        FallbackSettings {
            search: SearchSettings::default(),
            synthesis_context_chars: 1_500,
            max_links: 3,
            language: ResponseLanguage::En,
        }
    }

    fn hits(count: usize) -> Vec<SearchHit> {
        (1..=count)
            .map(|index| SearchHit {
                url: format!("https://news{index}.example/article"),
                content: format!(
                    "Report number {index} says the bridge reopened to traffic on Monday morning."
                ),
            })
            .collect()
    }

    fn handler(
        response: SearchResponse,
        reply: Result<&'static str, ()>,
    ) -> (FallbackSearchHandler, Arc<CountingSearch>, Arc<FixedLlm>) {
        let search = Arc::new(CountingSearch { response, calls: AtomicUsize::new(0) });
        let llm = Arc::new(FixedLlm { reply, calls: AtomicUsize::new(0) });
        (FallbackSearchHandler::new(search.clone(), llm.clone(), settings()), search, llm)
    }

    fn ask(text: &str) -> ConversationState {
        ConversationState::new(vec![Message::user(text)])
    }

    #[tokio::test]
    async fn empty_query_asks_for_a_question_without_searching() {
        let (handler, search, _) = handler(SearchResponse::default(), Ok("unused"));
        let delta = handler.handle(&ask("   ")).await;

        assert_eq!(delta.messages[0].content(), ResponseLanguage::En.empty_question());
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pre_synthesized_answer_skips_the_model_and_lists_sources() {
        let response = SearchResponse { answer: Some("The bridge reopened Monday.".to_string()), results: hits(5) };
        let (handler, _, llm) = handler(response, Ok("unused"));

        let delta = handler.handle(&ask("did the bridge reopen?")).await;

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            delta.messages[0].content(),
            "The bridge reopened Monday.\n\nSources:\n[1] https://news1.example/article\n\
             [2] https://news2.example/article\n[3] https://news3.example/article"
        );
    }

    #[tokio::test]
    async fn synthesized_answer_keeps_an_embedded_source_list() {
        let response = SearchResponse { answer: None, results: hits(2) };
        let synthesized = "It reopened on Monday [1].\n\nSources:\n[1] https://news1.example/article";
        let (handler, _, llm) = handler(response, Ok(synthesized));

        let delta = handler.handle(&ask("did the bridge reopen?")).await;

        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(delta.messages[0].content().matches("Sources:").count(), 1);
    }

    #[tokio::test]
    async fn model_failure_still_reads_as_an_answer() {
        let response = SearchResponse { answer: None, results: hits(2) };
        let (handler, _, _) = handler(response, Err(()));

        let delta = handler.handle(&ask("did the bridge reopen?")).await;
        let reply = delta.messages[0].content();

        assert!(reply.starts_with("Report number 1 says the bridge reopened"));
        assert!(reply.contains("\n\nSources:\n[1] https://news1.example/article"));
    }

    #[tokio::test]
    async fn no_results_returns_the_summary_as_is() {
        let (handler, _, llm) = handler(SearchResponse::default(), Ok("unused"));
        let delta = handler.handle(&ask("zxqv")).await;

        assert_eq!(delta.messages[0].content(), "No results found.");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn snippets_without_urls_are_still_synthesized() {
        let results = hits(2).into_iter().map(|hit| SearchHit { url: String::new(), ..hit }).collect();
        let response = SearchResponse { answer: None, results };
        let (handler, _, llm) = handler(response, Ok("It reopened on Monday."));

        let delta = handler.handle(&ask("did the bridge reopen?")).await;

        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(delta.messages[0].content(), "It reopened on Monday.");
    }

    #[test]
    fn extraction_skips_short_and_chrome_sentences() {
        let text = "Menu Home Contact us and everything else that is navigation. Short one. \
                    The council approved the new budget after a long debate on Tuesday! \
                    Critics said the plan underfunds public transport in the suburbs";
        assert_eq!(
            extract_brief(text),
            "The council approved the new budget after a long debate on Tuesday! \
             Critics said the plan underfunds public transport in the suburbs."
        );
        assert_eq!(extract_brief("tiny"), "tiny.");
    }
}
