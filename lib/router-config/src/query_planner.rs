use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct QueryPlannerConfig {
    /// The maximum time for the query planner to create an execution plan.
    /// When the timeout is reached, planning is cancelled and the request fails
    /// before any subgraph is called.
    ///
    /// Default: 10s.
    #[serde(
        default = "default_query_planning_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "String")]
    pub timeout: Duration,

    /// How many compiled plans are kept, keyed by operation shape.
    ///
    /// Default: 1000.
    #[serde(default = "default_plan_cache_size")]
    pub cache_size: u64,

    /// How a field is assigned when more than one subgraph can resolve it.
    #[serde(default)]
    pub subgraph_selection: SubgraphSelectionStrategy,
}

impl Default for QueryPlannerConfig {
    fn default() -> Self {
        Self {
            timeout: default_query_planning_timeout(),
            cache_size: default_plan_cache_size(),
            subgraph_selection: SubgraphSelectionStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubgraphSelectionStrategy {
    /// Stay in the subgraph of the parent selection when it owns the field,
    /// otherwise use the first declared owner.
    #[default]
    PreferParent,
    /// Always use the first declared owner.
    FirstDeclared,
}

fn default_query_planning_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_plan_cache_size() -> u64 {
    1000
}
