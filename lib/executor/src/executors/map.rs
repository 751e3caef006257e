use std::collections::HashMap;

use conductor_config::traffic_shaping::TrafficShapingConfig;
use tracing::{debug, trace};

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
        timeout::TimeoutExecutor,
    },
    response::subgraph_response::SubgraphResponse,
};

pub struct SubgraphExecutorMap {
    inner: HashMap<String, SubgraphExecutorBoxedArc>,
}

impl Default for SubgraphExecutorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SubgraphExecutorMap {
    pub fn new() -> Self {
        SubgraphExecutorMap {
            inner: HashMap::new(),
        }
    }

    /// Runs one sub-request. The call is abandoned as soon as the request's
    /// cancellation token fires.
    pub async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let subgraph_name = execution_request.subgraph_name;
        let executor = self
            .inner
            .get(subgraph_name)
            .ok_or_else(|| SubgraphExecutorError::ExecutorNotFound(subgraph_name.to_string()))?;

        let cancellation = execution_request.cancellation.clone();
        if cancellation.is_cancelled() {
            return Err(SubgraphExecutorError::RequestCancelled);
        }

        trace!(subgraph = subgraph_name, "sending sub-request");

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                debug!(subgraph = subgraph_name, "sub-request cancelled");
                Err(SubgraphExecutorError::RequestCancelled)
            }
            result = executor.execute(execution_request) => result,
        }
    }

    pub fn insert_boxed_arc(&mut self, subgraph_name: String, boxed_arc: SubgraphExecutorBoxedArc) {
        self.inner.insert(subgraph_name, boxed_arc);
    }

    pub fn contains(&self, subgraph_name: &str) -> bool {
        self.inner.contains_key(subgraph_name)
    }

    /// Registers the given transports, each wrapped in the timeout configured for its subgraph.
    pub fn from_executors(
        executors: HashMap<String, SubgraphExecutorBoxedArc>,
        traffic_shaping: &TrafficShapingConfig,
    ) -> Self {
        let inner = executors
            .into_iter()
            .map(
                |(subgraph_name, executor)| match traffic_shaping.timeout_for(&subgraph_name) {
                    Some(timeout) => {
                        debug!(subgraph = %subgraph_name, ?timeout, "subgraph timeout");
                        let executor = TimeoutExecutor::new(timeout, executor).to_boxed_arc();
                        (subgraph_name, executor)
                    }
                    None => (subgraph_name, executor),
                },
            )
            .collect::<HashMap<_, _>>();

        SubgraphExecutorMap { inner }
    }
}
