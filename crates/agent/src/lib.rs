//! Intent routing and tool orchestration.
//!
//! Every turn goes through [`graph::OrchestrationGraph`]: the [`router`]
//! picks one of four [`handlers`], the handler talks to the external
//! [`adapters`] (or runs the bounded tool loop over [`tools`]), and the
//! [`memory`] sink trims the history kept for the next turn. Model-authored
//! SQL only reaches the database after [`guardrails::SqlGuard`] accepts it.

pub mod adapters;
pub mod graph;
pub mod guardrails;
pub mod handlers;
pub mod llm;
pub mod memory;
pub mod router;
pub mod runtime;
pub mod tools;

pub use graph::{GraphHandlers, OrchestrationGraph, StateSnapshot};
pub use guardrails::{SqlGuard, SqlGuardVerdict};
pub use handlers::Handler;
pub use llm::{ChatMessage, Embedder, LlmClient, LlmError, ModelReply, OpenAiCompatibleClient, ToolCall, ToolSpec};
pub use memory::MemorySink;
pub use router::Router;
pub use runtime::{AgentDependencies, AgentRuntime};
pub use tools::{Tool, ToolRegistry};
