use serde::Deserialize;
use serde_json::Value;

use crate::{executors::error::SubgraphExecutorError, response::graphql_error::GraphQLError};

pub const ENTITIES_FIELD: &str = "_entities";

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct SubgraphResponse {
    /// Missing and `null` both mean no data.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl SubgraphResponse {
    pub fn from_data(data: Value) -> Self {
        SubgraphResponse {
            data,
            errors: None,
            extensions: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<GraphQLError>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Decodes a raw GraphQL response body, for transports that receive bytes.
    pub fn from_slice(subgraph_name: &str, bytes: &[u8]) -> Result<Self, SubgraphExecutorError> {
        sonic_rs::from_slice(bytes).map_err(|e| {
            SubgraphExecutorError::ResponseParseFailure(subgraph_name.to_string(), e.to_string())
        })
    }

    pub fn take_errors(&mut self) -> Vec<GraphQLError> {
        self.errors.take().unwrap_or_default()
    }

    /// The `_entities` list of an entity lookup response.
    pub fn take_entities(&mut self) -> Option<Vec<Value>> {
        match self.data.as_object_mut()?.remove(ENTITIES_FIELD)? {
            Value::Array(entities) => Some(entities),
            _ => None,
        }
    }
}
