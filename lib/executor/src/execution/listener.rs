use std::time::Duration;

use conductor_query_planner::planner::plan::CompiledStep;

use crate::execution::state::StepState;

/// Observes step transitions of an execution. Callbacks run on the coordinating
/// task and must not block.
pub trait ExecutionListener: Send + Sync {
    fn on_step_started(&self, _step: &CompiledStep) {}

    fn on_step_finished(&self, _step: &CompiledStep, _state: StepState, _elapsed: Duration) {}

    fn on_step_skipped(&self, _step: &CompiledStep) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutionListener;

impl ExecutionListener for NoopExecutionListener {}
