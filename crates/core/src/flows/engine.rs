use thiserror::Error;

use crate::flows::states::{
    FlowAction, FlowContext, FlowEvent, FlowState, FlowType, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct ToolExecutionFlow;

impl FlowDefinition for ToolExecutionFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::ToolExecution
    }

    fn initial_state(&self) -> FlowState {
        FlowState::NeedsToolCall
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_tool_execution(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<ToolExecutionFlow> {
    fn default() -> Self {
        Self::new(ToolExecutionFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_tool_execution(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{EmitAnswer, ExecuteTools, InvokeModel};
    use FlowEvent::{FinalAnswerProduced, ModelFailed, ToolCallsRequested, ToolResultsRecorded};
    use FlowState::{Done, HasToolResult, NeedsToolCall};

    let mut forced = false;
    let (to, actions) = match (current, event) {
        (NeedsToolCall, ToolCallsRequested) => (HasToolResult, vec![ExecuteTools]),
        (HasToolResult, ToolResultsRecorded) => {
            if context.budget_exhausted() {
                forced = true;
                (Done, vec![EmitAnswer])
            } else {
                (NeedsToolCall, vec![InvokeModel])
            }
        }
        (NeedsToolCall, FinalAnswerProduced) => (Done, vec![EmitAnswer]),
        (NeedsToolCall, ModelFailed) | (HasToolResult, ModelFailed) => (Done, vec![EmitAnswer]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions, forced })
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{FlowDefinition, FlowEngine, FlowTransitionError, ToolExecutionFlow};
    use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState, FlowType};

    #[test]
    fn tool_round_trip_then_answer() {
        let engine = FlowEngine::new(ToolExecutionFlow);
        let mut context = FlowContext::new(4);
        let mut state = engine.initial_state();

        context.model_calls = 1;
        let requested = engine
            .apply(&state, &FlowEvent::ToolCallsRequested, &context)
            .expect("needs-tool-call -> has-tool-result");
        assert_eq!(requested.actions, vec![FlowAction::ExecuteTools]);
        state = requested.to;

        let recorded = engine
            .apply(&state, &FlowEvent::ToolResultsRecorded, &context)
            .expect("has-tool-result -> needs-tool-call");
        assert_eq!(recorded.to, FlowState::NeedsToolCall);
        assert_eq!(recorded.actions, vec![FlowAction::InvokeModel]);
        state = recorded.to;

        context.model_calls = 2;
        let answered = engine
            .apply(&state, &FlowEvent::FinalAnswerProduced, &context)
            .expect("needs-tool-call -> done");
        assert_eq!(answered.to, FlowState::Done);
        assert!(!answered.forced);
    }

    #[test]
    fn iteration_cap_forces_done() {
        let engine = FlowEngine::default();
        let context = FlowContext { model_calls: 3, max_model_calls: 3 };

        let outcome = engine
            .apply(&FlowState::HasToolResult, &FlowEvent::ToolResultsRecorded, &context)
            .expect("cap reached should still transition");

        assert_eq!(outcome.to, FlowState::Done);
        assert_eq!(outcome.actions, vec![FlowAction::EmitAnswer]);
        assert!(outcome.forced);
    }

    #[test]
    fn model_failure_ends_the_loop() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(&FlowState::NeedsToolCall, &FlowEvent::ModelFailed, &FlowContext::default())
            .expect("failure is terminal");
        assert_eq!(outcome.to, FlowState::Done);
    }

    #[test]
    fn done_is_terminal() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&FlowState::Done, &FlowEvent::ToolCallsRequested, &FlowContext::default())
            .expect_err("done accepts no events");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                state: FlowState::Done,
                event: FlowEvent::ToolCallsRequested
            }
        ));
        assert_eq!(ToolExecutionFlow.flow_type(), FlowType::ToolExecution);
    }
}
