use std::time::Duration;

use serde_json::Value;

use crate::response::graphql_error::GraphQLError;

pub const SUBREQUEST_FAILED_CODE: &str = "SUBREQUEST_FAILED";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SubgraphExecutorError {
    #[error("Subgraph executor not found for subgraph \"{0}\"")]
    ExecutorNotFound(String),
    #[error("Failed to send request to subgraph \"{0}\": {1}")]
    RequestFailure(String, String),
    #[error("Failed to parse response of subgraph \"{0}\": {1}")]
    ResponseParseFailure(String, String),
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
    #[error("Request was cancelled")]
    RequestCancelled,
}

impl SubgraphExecutorError {
    pub fn to_graphql_error(&self, subgraph_name: &str) -> GraphQLError {
        GraphQLError::from_message(format!(
            "Failed to execute request to subgraph {}: {}",
            subgraph_name, self
        ))
        .with_extension("serviceName", Value::from(subgraph_name))
        .with_extension("code", Value::from(SUBREQUEST_FAILED_CODE))
    }
}
