use std::{collections::HashMap, sync::Arc};

use conductor_config::{query_planner::SubgraphSelectionStrategy, RouterConfig};
use conductor_query_planner::{
    ast::operation::Operation,
    ownership::{
        policy::{FirstDeclaredOwner, PreferParentSubgraph, SubgraphSelectionPolicy},
        OwnershipIndex,
    },
    planner::Planner,
    utils::cancellation::CancellationToken,
};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::{
    execution::plan::QueryPlanExecutor,
    executors::{common::SubgraphExecutorBoxedArc, map::SubgraphExecutorMap},
    response::{graphql_error::GraphQLError, response::GraphQLResponse},
    variables::collect_variables,
};

pub const PLANNING_FAILED_CODE: &str = "PLANNING_FAILED";
pub const BAD_USER_INPUT_CODE: &str = "BAD_USER_INPUT";

/// Plans and executes client operations. Planning failures and invalid variables
/// fail the request before any subgraph is called.
pub struct Gateway {
    planner: Planner,
    executor: QueryPlanExecutor,
}

impl Gateway {
    pub fn new(planner: Planner, executor: QueryPlanExecutor) -> Self {
        Gateway { planner, executor }
    }

    pub fn from_config(
        config: &RouterConfig,
        index: OwnershipIndex,
        executors: HashMap<String, SubgraphExecutorBoxedArc>,
    ) -> Self {
        let policy: Arc<dyn SubgraphSelectionPolicy> =
            match config.query_planner.subgraph_selection {
                SubgraphSelectionStrategy::PreferParent => Arc::new(PreferParentSubgraph),
                SubgraphSelectionStrategy::FirstDeclared => Arc::new(FirstDeclaredOwner),
            };

        let planner = Planner::new(index)
            .with_policy(policy)
            .with_cache_size(config.query_planner.cache_size)
            .with_timeout(config.query_planner.timeout);
        let executors = SubgraphExecutorMap::from_executors(executors, &config.traffic_shaping);

        Gateway::new(planner, QueryPlanExecutor::new(Arc::new(executors)))
    }

    /// Reconfigures the executor, e.g. to install introspection or a listener.
    pub fn map_executor(mut self, f: impl FnOnce(QueryPlanExecutor) -> QueryPlanExecutor) -> Self {
        self.executor = f(self.executor);
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn executor(&self) -> &QueryPlanExecutor {
        &self.executor
    }

    pub async fn execute(
        &self,
        operation: &Operation,
        variables: Option<Map<String, Value>>,
    ) -> GraphQLResponse {
        self.execute_with_cancellation(operation, variables, &CancellationToken::new())
            .await
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(operation_kind = %operation.kind, operation_name = operation.name.as_deref())
    )]
    pub async fn execute_with_cancellation(
        &self,
        operation: &Operation,
        variables: Option<Map<String, Value>>,
        cancellation: &CancellationToken,
    ) -> GraphQLResponse {
        let variables = match collect_variables(operation, variables) {
            Ok(variables) => variables,
            Err(e) => {
                return GraphQLResponse::from_error(
                    GraphQLError::from_message(e.to_string())
                        .with_extension("code", Value::from(BAD_USER_INPUT_CODE)),
                );
            }
        };

        let plan = match self.planner.plan(operation) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "failed to plan operation");
                return GraphQLResponse::from_error(
                    GraphQLError::from_message(e.to_string())
                        .with_extension("code", Value::from(PLANNING_FAILED_CODE)),
                );
            }
        };

        self.executor.execute(&plan, &variables, cancellation).await
    }
}
