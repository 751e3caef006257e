use serde_json::Value;

use crate::{
    executors::error::{SubgraphExecutorError, SUBREQUEST_FAILED_CODE},
    introspection::IntrospectionError,
    response::graphql_error::GraphQLError,
};

pub const INTROSPECTION_FAILED_CODE: &str = "INTROSPECTION_FAILED";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Subgraph(#[from] SubgraphExecutorError),
    #[error("Subgraph {subgraph} returned {received} entities for {expected} representations")]
    EntityCountMismatch {
        subgraph: String,
        expected: usize,
        received: usize,
    },
    #[error("Subgraph {0} returned no data")]
    MissingData(String),
    #[error("Cannot resolve {type_name} from subgraph {subgraph}: key fields are missing")]
    MissingKeyFields { subgraph: String, type_name: String },
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

impl ExecutionError {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::Introspection(_) => INTROSPECTION_FAILED_CODE,
            _ => SUBREQUEST_FAILED_CODE,
        }
    }

    pub fn to_graphql_error(&self, subgraph_name: Option<&str>) -> GraphQLError {
        match (self, subgraph_name) {
            (ExecutionError::Subgraph(e), Some(subgraph_name)) => e.to_graphql_error(subgraph_name),
            _ => {
                let error = GraphQLError::from_message(self.to_string())
                    .with_extension("code", Value::from(self.code()));
                match subgraph_name {
                    Some(subgraph_name) => {
                        error.with_extension("serviceName", Value::from(subgraph_name))
                    }
                    None => error,
                }
            }
        }
    }
}
