use conductor_query_planner::planner::plan::ExecutionPlan;
use serde_json::{Map, Value};

use crate::{
    execution::state::StepState,
    projection::response::project_by_operation,
    response::{
        graphql_error::{GraphQLError, GraphQLErrorPath},
        null_bubbling::bubble_nulls,
        response::GraphQLResponse,
    },
};

/// Mutable state of one plan execution. Owned by the coordinating task; steps never
/// touch it directly.
pub struct ExecutionContext<'a> {
    pub plan: &'a ExecutionPlan,
    pub data: Value,
    pub errors: Vec<GraphQLError>,
    pub states: Vec<StepState>,
    /// Number of dependencies of each step that have not reached a terminal state.
    pub outstanding: Vec<usize>,
    /// Locations nulled by failed or skipped steps.
    pub nulled_locations: Vec<GraphQLErrorPath>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(plan: &'a ExecutionPlan) -> Self {
        ExecutionContext {
            plan,
            data: Value::Object(Map::new()),
            errors: Vec::new(),
            states: vec![StepState::Pending; plan.len()],
            outstanding: plan.steps.iter().map(|step| step.depends_on.len()).collect(),
            nulled_locations: Vec::new(),
        }
    }

    pub fn state(&self, index: usize) -> StepState {
        self.states[index]
    }

    /// Whether any dependency of step `index` failed or was skipped.
    pub fn has_blocked_dependency(&self, index: usize) -> bool {
        self.plan.steps[index]
            .depends_on
            .iter()
            .any(|dependency| self.states[*dependency].blocks_dependents())
    }

    /// Applies null bubbling and shapes the data by the client operation.
    pub fn finish(mut self) -> GraphQLResponse {
        bubble_nulls(
            &mut self.data,
            &self.plan.operation.selection_set,
            &self.nulled_locations,
        );

        let data = project_by_operation(
            &self.data,
            &self.plan.operation,
            &self.plan.schema,
            &self.plan.root_type_name,
        );

        GraphQLResponse::new(data, self.errors)
    }
}
