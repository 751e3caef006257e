use std::{collections::HashMap, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TrafficShapingConfig {
    /// Applies to every subgraph, unless overridden in `subgraphs`.
    #[serde(default)]
    pub all: SubgraphTrafficShapingConfig,

    /// Per-subgraph overrides, keyed by subgraph name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub subgraphs: HashMap<String, SubgraphTrafficShapingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubgraphTrafficShapingConfig {
    /// Upper bound for one sub-request. A timed out call fails its step only.
    #[serde(
        default,
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,
}

impl TrafficShapingConfig {
    pub fn timeout_for(&self, subgraph_name: &str) -> Option<Duration> {
        self.subgraphs
            .get(subgraph_name)
            .and_then(|subgraph| subgraph.timeout)
            .or(self.all.timeout)
    }
}
