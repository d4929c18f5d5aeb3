//! Single-pass orchestration: router, exactly one handler, then the memory sink.
//!
//! A turn loads the checkpoint for its conversation id, appends the incoming
//! messages, runs the three nodes in order and saves the trimmed result. Turns
//! that share an id are serialized; different ids run concurrently. Every turn
//! runs on its own task, so a caller that goes away does not cut a turn short.
//! Nothing in here returns an error to the caller: storage failures are logged
//! and the turn proceeds with whatever state it has.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex as TurnLock, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use atlas_core::domain::conversation::{ConversationId, ConversationState, StateDelta};
use atlas_core::domain::route::RouteCategory;
use atlas_core::errors::truncate_for_log;
use atlas_db::ConversationRepository;

use crate::handlers::Handler;
use crate::memory::MemorySink;
use crate::router::Router;

const SNAPSHOT_BUFFER: usize = 8;

/// State after one node finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub node: &'static str,
    pub state: ConversationState,
}

/// One terminal handler per route category.
pub struct GraphHandlers {
    pub conversational: Arc<dyn Handler>,
    pub weather: Arc<dyn Handler>,
    pub fallback_search: Arc<dyn Handler>,
    pub executor: Arc<dyn Handler>,
}

impl GraphHandlers {
    fn for_category(&self, category: RouteCategory) -> &Arc<dyn Handler> {
        match category {
            RouteCategory::Conversational => &self.conversational,
            RouteCategory::Weather => &self.weather,
            RouteCategory::FallbackSearch => &self.fallback_search,
            RouteCategory::Execute => &self.executor,
        }
    }
}

pub struct OrchestrationGraph {
    router: Router,
    handlers: GraphHandlers,
    memory: MemorySink,
    conversations: Arc<dyn ConversationRepository>,
    turn_locks: Mutex<HashMap<ConversationId, Arc<TurnLock<()>>>>,
}

impl OrchestrationGraph {
    pub fn new(
        router: Router,
        handlers: GraphHandlers,
        memory: MemorySink,
        conversations: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self { router, handlers, memory, conversations, turn_locks: Mutex::new(HashMap::new()) }
    }

    /// Runs one turn and returns the final (trimmed) state.
    pub async fn run(self: &Arc<Self>, input: ConversationState, id: &ConversationId) -> ConversationState {
        let graph = Arc::clone(self);
        let turn_id = id.clone();
        let turn = tokio::spawn(async move { graph.execute_turn(input, &turn_id, None).await });
        match turn.await {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    event_name = "agent.graph.turn_aborted",
                    correlation_id = %id,
                    error = %error,
                    "turn task did not finish"
                );
                self.load_checkpoint(id).await
            }
        }
    }

    /// Runs one turn in the background, yielding a snapshot after each node.
    pub fn run_stream(self: &Arc<Self>, input: ConversationState, id: ConversationId) -> ReceiverStream<StateSnapshot> {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let graph = Arc::clone(self);
        tokio::spawn(async move {
            graph.execute_turn(input, &id, Some(&sender)).await;
        });
        ReceiverStream::new(receiver)
    }

    async fn execute_turn(
        &self,
        input: ConversationState,
        id: &ConversationId,
        snapshots: Option<&mpsc::Sender<StateSnapshot>>,
    ) -> ConversationState {
        let _permit = self.acquire_turn(id).await;
        let started = Instant::now();

        let mut state = self.load_checkpoint(id).await;
        state.messages.extend(input.messages);

        let decision = self.router.classify(&state).await;
        state = state.merge(StateDelta::flags(decision.flags));
        emit(snapshots, "router", &state).await;

        let handler = self.handlers.for_category(decision.category);
        let delta = handler.handle(&state).await;
        let reply_count = delta.messages.len();
        state = state.merge(delta);
        emit(snapshots, handler.name(), &state).await;

        let trim = self.memory.apply(&state);
        state = state.merge(trim);
        emit(snapshots, "memory", &state).await;

        if let Err(error) = self.conversations.save(id, state.clone()).await {
            warn!(
                event_name = "agent.graph.checkpoint_save_failed",
                correlation_id = %id,
                error = %truncate_for_log(&error.to_string(), 200),
                "conversation checkpoint not saved"
            );
        }

        info!(
            event_name = "agent.graph.turn_completed",
            correlation_id = %id,
            route = decision.category.as_str(),
            handler = handler.name(),
            reply_count,
            history_len = state.messages.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "turn completed"
        );

        state
    }

    async fn load_checkpoint(&self, id: &ConversationId) -> ConversationState {
        match self.conversations.load(id).await {
            Ok(Some(state)) => state,
            Ok(None) => ConversationState::default(),
            Err(error) => {
                warn!(
                    event_name = "agent.graph.checkpoint_load_failed",
                    correlation_id = %id,
                    error = %truncate_for_log(&error.to_string(), 200),
                    "starting from an empty conversation"
                );
                ConversationState::default()
            }
        }
    }

    async fn acquire_turn(&self, id: &ConversationId) -> TurnPermit<'_> {
        let lock = {
            let mut locks = self.turn_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        TurnPermit { locks: &self.turn_locks, id: id.clone(), guard: Some(lock.lock_owned().await) }
    }
}

/// Holds the per-id lock for one turn; dropping it forgets the id once nobody else wants it.
struct TurnPermit<'a> {
    locks: &'a Mutex<HashMap<ConversationId, Arc<TurnLock<()>>>>,
    id: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TurnPermit<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(guard) = self.guard.take() {
            let lock = Arc::clone(OwnedMutexGuard::mutex(&guard));
            drop(guard);
            // Map entry plus `lock`: nobody else holds or waits on this id.
            if Arc::strong_count(&lock) == 2 {
                locks.remove(&self.id);
            }
        }
    }
}

async fn emit(snapshots: Option<&mpsc::Sender<StateSnapshot>>, node: &'static str, state: &ConversationState) {
    if let Some(sender) = snapshots {
        // A dropped receiver only means nobody is watching; the turn still completes.
        let _ = sender.send(StateSnapshot { node, state: state.clone() }).await;
    }
}
