pub mod context;
pub mod execution;
pub mod executors;
pub mod gateway;
pub mod introspection;
pub mod node;
pub mod projection;
pub mod response;
pub mod utils;
pub mod variables;

#[cfg(test)]
mod tests;

pub use execution::{listener::ExecutionListener, plan::QueryPlanExecutor, state::StepState};
pub use executors::{
    common::{SubgraphExecutionRequest, SubgraphExecutor},
    map::SubgraphExecutorMap,
};
pub use gateway::Gateway;
pub use response::response::GraphQLResponse;
