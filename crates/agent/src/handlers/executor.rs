use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use atlas_core::domain::conversation::{ConversationState, Message, StateDelta};
use atlas_core::errors::{truncate_for_log, ApplicationError};
use atlas_core::flows::{FlowAction, FlowContext, FlowEngine, FlowEvent, FlowState, ToolExecutionFlow};
use atlas_core::language::ResponseLanguage;

use super::Handler;
use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::tools::ToolRegistry;

/// Bounded tool-calling loop over the registry.
pub struct ExecutorHandler {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    engine: FlowEngine<ToolExecutionFlow>,
    max_model_calls: u32,
    language: ResponseLanguage,
}

impl ExecutorHandler {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        max_model_calls: u32,
        language: ResponseLanguage,
    ) -> Self {
        Self { llm, tools, engine: FlowEngine::default(), max_model_calls: max_model_calls.max(1), language }
    }

    fn model_failure(&self, error: LlmError) -> StateDelta {
        let error = ApplicationError::from(error);
        warn!(
            event_name = "agent.handler.executor.model_failed",
            error = %truncate_for_log(&error.to_string(), 200),
            "tool loop aborted"
        );
        if error.is_quota_or_rate_limit() {
            StateDelta::reply(self.language.quota_exceeded())
        } else {
            StateDelta::reply(self.language.try_again())
        }
    }
}

#[async_trait]
impl Handler for ExecutorHandler {
    fn name(&self) -> &'static str {
        "executor"
    }

    async fn handle(&self, state: &ConversationState) -> StateDelta {
        let started = Instant::now();
        let specs = self.tools.specs();
        let mut transcript = vec![ChatMessage::system(system_prompt(self.language))];
        transcript.extend(state.messages.iter().map(ChatMessage::from));
        let seed_len = transcript.len();

        let mut context = FlowContext::new(self.max_model_calls);
        let mut current = self.engine.initial_state();
        let mut tool_calls_made = 0_usize;
        let mut forced = false;
        let mut failure = None;

        while current != FlowState::Done {
            context.model_calls += 1;
            let reply = match self.llm.complete_with_tools(&transcript, &specs).await {
                Ok(reply) => reply,
                Err(error) => {
                    failure = Some(error);
                    match self.engine.apply(&current, &FlowEvent::ModelFailed, &context) {
                        Ok(outcome) => {
                            current = outcome.to;
                            continue;
                        }
                        Err(error) => {
                            warn!(event_name = "agent.handler.executor.invalid_transition", error = %error, "tool loop stopped");
                            break;
                        }
                    }
                }
            };

            let event = if reply.tool_calls.is_empty() {
                FlowEvent::FinalAnswerProduced
            } else {
                FlowEvent::ToolCallsRequested
            };
            let calls = reply.tool_calls.clone();
            let content = reply.content.filter(|content| !content.trim().is_empty());
            if content.is_some() || !calls.is_empty() {
                transcript.push(ChatMessage::Assistant { content, tool_calls: reply.tool_calls });
            }

            let outcome = match self.engine.apply(&current, &event, &context) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(event_name = "agent.handler.executor.invalid_transition", error = %error, "tool loop stopped");
                    break;
                }
            };
            current = outcome.to;
            if !outcome.actions.contains(&FlowAction::ExecuteTools) {
                continue;
            }

            for call in &calls {
                let output = self.tools.execute(&call.name, &call.arguments).await;
                transcript.push(ChatMessage::Tool { tool_call_id: call.id.clone(), content: output });
                tool_calls_made += 1;
            }
            match self.engine.apply(&current, &FlowEvent::ToolResultsRecorded, &context) {
                Ok(outcome) => {
                    forced = outcome.forced;
                    current = outcome.to;
                }
                Err(error) => {
                    warn!(event_name = "agent.handler.executor.invalid_transition", error = %error, "tool loop stopped");
                    break;
                }
            }
        }

        if let Some(error) = failure {
            return self.model_failure(error);
        }

        let new_messages: Vec<Message> = transcript[seed_len..]
            .iter()
            .filter_map(|message| match message {
                ChatMessage::Assistant { content: Some(content), .. } => Some(Message::assistant(content.trim())),
                _ => None,
            })
            .collect();
        let messages = if new_messages.is_empty() {
            state.last_assistant_text().map(Message::assistant).into_iter().collect()
        } else {
            new_messages
        };

        if forced {
            warn!(
                event_name = "agent.handler.executor.iteration_cap",
                max_model_calls = self.max_model_calls,
                "tool loop stopped at the iteration cap"
            );
        }
        info!(
            event_name = "agent.handler.executor.completed",
            model_calls = context.model_calls,
            tool_calls = tool_calls_made,
            reply_count = messages.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "tool loop finished"
        );
        StateDelta::messages(messages)
    }
}

fn system_prompt(language: ResponseLanguage) -> String {
    match language {
        ResponseLanguage::PtBr => format!(
            "Você é um assistente de IA útil que fornece respostas concisas e precisas.\n\n{rule}\n\n\
             Ao responder perguntas:\n\
             1. Seja direto e conciso: sintetize as informações, não repita os outputs das ferramentas\n\
             2. Responda em 2-4 frases no máximo, a menos que mais detalhes sejam solicitados\n\
             3. Se usar múltiplas fontes, cite com [1], [2] etc. ao final\n\
             4. Formato: resposta primeiro, depois a lista de fontes se aplicável\n\n\
             Exemplos:\n\
             - Clima: \"Em Londres, está 15°C e nublado com chuva leve esperada.\"\n\
             - Banco de dados: \"Há 3 produtos no banco: Widget A (10,50), Widget B (25,00) e Gadget X (99,99).\"",
            rule = language.answer_rule()
        ),
        ResponseLanguage::En => format!(
            "You are a helpful AI assistant that gives concise, accurate answers.\n\n{rule}\n\n\
             When answering:\n\
             1. Be direct: synthesize the information, do not repeat raw tool output\n\
             2. Answer in 2-4 sentences unless more detail is requested\n\
             3. When using several sources, cite them as [1], [2] at the end\n\
             4. Format: answer first, then the source list if any\n\n\
             Examples:\n\
             - Weather: \"In London it is 15°C and cloudy with light rain expected.\"\n\
             - Database: \"There are 3 products: Widget A (10.50), Widget B (25.00) and Gadget X (99.99).\"",
            rule = language.answer_rule()
        ),
    }
}
