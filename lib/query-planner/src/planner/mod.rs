use std::{sync::Arc, time::Duration};

use moka::sync::Cache;
use tracing::{debug, instrument};

use crate::{
    ast::{hash::operation_hash, operation::Operation},
    ownership::{
        policy::{PreferParentSubgraph, SubgraphSelectionPolicy},
        OwnershipIndex,
    },
    utils::cancellation::CancellationToken,
};

use builder::build_steps;
use compiler::compile_plan;
use dependencies::resolve_dependencies;
use error::PlanningError;
use plan::ExecutionPlan;

pub mod builder;
pub mod compiler;
pub mod dependencies;
pub mod error;
pub mod plan;
pub mod step;

const DEFAULT_CACHE_SIZE: u64 = 1000;

/// Plans operations against one ownership index and caches the compiled plans
/// by operation shape.
pub struct Planner {
    index: Arc<OwnershipIndex>,
    policy: Arc<dyn SubgraphSelectionPolicy>,
    cache: Cache<u64, Arc<ExecutionPlan>>,
    timeout: Option<Duration>,
}

impl Planner {
    pub fn new(index: OwnershipIndex) -> Self {
        Planner {
            index: Arc::new(index),
            policy: Arc::new(PreferParentSubgraph),
            cache: Cache::new(DEFAULT_CACHE_SIZE),
            timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn SubgraphSelectionPolicy>) -> Self {
        self.policy = policy;
        self.cache.invalidate_all();
        self
    }

    pub fn with_cache_size(mut self, max_capacity: u64) -> Self {
        self.cache = Cache::new(max_capacity);
        self
    }

    /// Upper bound for planning a single operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn index(&self) -> &Arc<OwnershipIndex> {
        &self.index
    }

    pub fn plan(&self, operation: &Operation) -> Result<Arc<ExecutionPlan>, PlanningError> {
        let cancellation_token = match self.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };

        self.plan_with_cancellation(operation, &cancellation_token)
    }

    #[instrument(level = "debug", skip_all, fields(operation_name = operation.name.as_deref()))]
    pub fn plan_with_cancellation(
        &self,
        operation: &Operation,
        cancellation_token: &CancellationToken,
    ) -> Result<Arc<ExecutionPlan>, PlanningError> {
        let cache_key = operation_hash(operation);

        if let Some(plan) = self.cache.get(&cache_key) {
            debug!(cache_key, "plan cache hit");
            return Ok(plan);
        }

        debug!(cache_key, "plan cache miss");
        let plan = Arc::new(self.build_plan(operation, cancellation_token)?);
        self.cache.insert(cache_key, plan.clone());

        Ok(plan)
    }

    /// Builds, links and compiles a plan without touching the cache.
    pub fn build_plan(
        &self,
        operation: &Operation,
        cancellation_token: &CancellationToken,
    ) -> Result<ExecutionPlan, PlanningError> {
        let mut graph = build_steps(
            &self.index,
            self.policy.as_ref(),
            operation,
            cancellation_token,
        )?;
        cancellation_token.bail_if_cancelled()?;

        resolve_dependencies(&mut graph)?;
        cancellation_token.bail_if_cancelled()?;

        compile_plan(graph, Arc::new(operation.clone()), self.index.clone())
    }
}
