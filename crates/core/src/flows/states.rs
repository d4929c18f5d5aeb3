use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    ToolExecution,
}

/// Position of the reasoning loop between model calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    /// Waiting on the model to pick tools or answer.
    NeedsToolCall,
    /// Tool output recorded, the model has not seen it yet.
    HasToolResult,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    ToolCallsRequested,
    ToolResultsRecorded,
    FinalAnswerProduced,
    ModelFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    /// Model calls already spent in this turn.
    pub model_calls: u32,
    pub max_model_calls: u32,
}

impl FlowContext {
    pub fn new(max_model_calls: u32) -> Self {
        Self { model_calls: 0, max_model_calls }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.model_calls >= self.max_model_calls
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new(6)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ExecuteTools,
    InvokeModel,
    EmitAnswer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
    /// Set when the iteration cap, not the model, ended the loop.
    pub forced: bool,
}
