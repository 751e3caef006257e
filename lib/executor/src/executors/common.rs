use std::sync::Arc;

use async_trait::async_trait;
use conductor_query_planner::utils::cancellation::CancellationToken;
use serde_json::{Map, Value};

use crate::{
    executors::error::SubgraphExecutorError, response::subgraph_response::SubgraphResponse,
};

/// Transport to one subgraph. Implementations own the wire format.
#[async_trait]
pub trait SubgraphExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError>;

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn SubgraphExecutor + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type SubgraphExecutorType = dyn crate::executors::common::SubgraphExecutor + Send + Sync;

pub type SubgraphExecutorBoxedArc = Arc<Box<SubgraphExecutorType>>;

pub struct SubgraphExecutionRequest<'a> {
    pub subgraph_name: &'a str,
    pub query: &'a str,
    /// Forwarded operation variables, plus `representations` for entity lookups.
    pub variables: Option<Map<String, Value>>,
    /// Fires when the client request is abandoned.
    pub cancellation: CancellationToken,
}

impl SubgraphExecutionRequest<'_> {
    pub fn add_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
    }

    pub fn representations(&self) -> Option<&Vec<Value>> {
        self.variables
            .as_ref()
            .and_then(|variables| variables.get("representations"))
            .and_then(Value::as_array)
    }
}
