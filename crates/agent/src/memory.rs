use atlas_core::domain::conversation::{ConversationState, StateDelta};

/// Last node of every turn. Keeps the newest `window` messages for the next turn.
#[derive(Clone, Copy, Debug)]
pub struct MemorySink {
    window: usize,
}

impl MemorySink {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1) }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn apply(&self, state: &ConversationState) -> StateDelta {
        let kept = state.messages.len().min(self.window);
        StateDelta {
            context: Some(format!("{kept} messages in context")),
            history_window: Some(self.window),
            ..StateDelta::default()
        }
    }
}
