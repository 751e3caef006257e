use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::response::graphql_error::GraphQLError;

/// The merged, client-shaped result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLResponse {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLResponse {
    pub fn new(data: Value, errors: Vec<GraphQLError>) -> Self {
        GraphQLResponse {
            data,
            errors,
            extensions: None,
        }
    }

    /// A response that failed before any data could be produced.
    pub fn from_error(error: GraphQLError) -> Self {
        GraphQLResponse::new(Value::Null, vec![error])
    }

    pub fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn to_bytes(&self) -> Result<Bytes, sonic_rs::Error> {
        sonic_rs::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::GraphQLResponse;
    use crate::response::graphql_error::GraphQLError;

    #[test]
    fn serializes_only_what_is_present() {
        let response = GraphQLResponse::new(json!({"product": null}), vec![]);
        assert_eq!(
            response.to_bytes().expect("serializable").as_ref(),
            br#"{"data":{"product":null}}"#
        );

        let failed = GraphQLResponse::from_error(GraphQLError::from_message("nope"));
        assert_eq!(
            failed.to_bytes().expect("serializable").as_ref(),
            br#"{"data":null,"errors":[{"message":"nope"}]}"#
        );
    }
}
