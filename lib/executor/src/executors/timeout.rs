use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
    },
    response::subgraph_response::SubgraphResponse,
};

/// Bounds every call of the wrapped executor. A call that runs out of time is dropped,
/// which cancels whatever the inner transport was awaiting.
pub struct TimeoutExecutor {
    pub timeout: Duration,
    pub executor: SubgraphExecutorBoxedArc,
}

impl TimeoutExecutor {
    pub fn new(timeout: Duration, executor: SubgraphExecutorBoxedArc) -> Self {
        Self { timeout, executor }
    }
}

#[async_trait]
impl SubgraphExecutor for TimeoutExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let subgraph_name = execution_request.subgraph_name;

        match tokio::time::timeout(self.timeout, self.executor.execute(execution_request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    subgraph = subgraph_name,
                    "request timed out after {:?}", self.timeout
                );
                Err(SubgraphExecutorError::RequestTimeout(self.timeout))
            }
        }
    }
}
