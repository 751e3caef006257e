use std::fmt::Debug;

use conductor_query_planner::ast::selection_set::{FieldSelection, SelectionSet};
use serde_json::{Map, Value};

use crate::variables::value_to_json;

pub const SCHEMA_FIELD: &str = "__schema";
pub const TYPE_FIELD: &str = "__type";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IntrospectionError {
    #[error("Introspection is not available")]
    Disabled,
    #[error("Failed to read the introspection schema: {0}")]
    InvalidSchema(String),
    #[error("Unsupported introspection field \"{0}\"")]
    UnsupportedField(String),
}

/// Answers root introspection fields (`__schema`, `__type`) locally, without a subgraph call.
pub trait IntrospectionResolver: Debug + Send + Sync {
    /// Resolves one root field. The result is keyed by response names.
    fn resolve(
        &self,
        field: &FieldSelection,
        variables: &Map<String, Value>,
    ) -> Result<Value, IntrospectionError>;
}

/// Serves a pre-computed `__schema` result, as produced by the composition pipeline.
#[derive(Debug, Clone)]
pub struct StaticIntrospection {
    schema: Value,
}

impl StaticIntrospection {
    pub fn new(schema: Value) -> Self {
        StaticIntrospection { schema }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IntrospectionError> {
        sonic_rs::from_slice(bytes)
            .map(StaticIntrospection::new)
            .map_err(|e| IntrospectionError::InvalidSchema(e.to_string()))
    }

    fn find_type(&self, name: &str) -> Option<&Value> {
        self.schema
            .get("types")?
            .as_array()?
            .iter()
            .find(|type_def| type_def.get("name").and_then(Value::as_str) == Some(name))
    }
}

impl IntrospectionResolver for StaticIntrospection {
    fn resolve(
        &self,
        field: &FieldSelection,
        variables: &Map<String, Value>,
    ) -> Result<Value, IntrospectionError> {
        match field.name.as_str() {
            SCHEMA_FIELD => Ok(select(&self.schema, &field.selections)),
            TYPE_FIELD => {
                let type_name = field
                    .arguments
                    .get_argument("name")
                    .map(|name| value_to_json(name, variables));

                Ok(type_name
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(|name| self.find_type(name))
                    .map_or(Value::Null, |type_def| select(type_def, &field.selections)))
            }
            other => Err(IntrospectionError::UnsupportedField(other.to_string())),
        }
    }
}

/// Shapes introspection data (keyed by field names) by a selection set (keyed by response names).
fn select(value: &Value, selections: &SelectionSet) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|item| select(item, selections)).collect()),
        Value::Object(map) if !selections.is_empty() => {
            let mut selected = Map::new();
            for field in selections.collect_fields(&|_: &str| true) {
                let field_value = map.get(&field.name).unwrap_or(&Value::Null);
                selected.insert(
                    field.response_name().to_string(),
                    select(field_value, &field.selections),
                );
            }
            Value::Object(selected)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use conductor_query_planner::ast::{
        selection_set::FieldSelection, type_ref::TypeRef, value::Value as AstValue,
    };
    use serde_json::{json, Map};

    use super::{IntrospectionResolver, StaticIntrospection};

    fn introspection() -> StaticIntrospection {
        StaticIntrospection::new(json!({
            "queryType": {"name": "Query", "kind": "OBJECT"},
            "mutationType": null,
            "types": [
                {"name": "Query", "kind": "OBJECT"},
                {"name": "Product", "kind": "OBJECT", "description": "A product"}
            ]
        }))
    }

    fn scalar(name: &str) -> FieldSelection {
        FieldSelection::new(name, TypeRef::named("String"))
    }

    #[test]
    fn schema_is_shaped_by_the_selection() {
        let field = FieldSelection::new("__schema", TypeRef::named("__Schema"))
            .with_selections(vec![FieldSelection::new("queryType", TypeRef::named("__Type"))
                .with_alias("root")
                .with_selections(vec![scalar("name").into()])
                .into()]);

        let result = introspection()
            .resolve(&field, &Map::new())
            .expect("resolvable");

        assert_eq!(result, json!({"root": {"name": "Query"}}));
    }

    #[test]
    fn type_lookup_reads_variables() {
        let field = FieldSelection::new("__type", TypeRef::named("__Type"))
            .with_argument("name", AstValue::variable("name"))
            .with_selections(vec![scalar("kind").into(), scalar("description").into()]);
        let variables = json!({"name": "Product"}).as_object().cloned().unwrap_or_default();

        let result = introspection()
            .resolve(&field, &variables)
            .expect("resolvable");

        assert_eq!(result, json!({"kind": "OBJECT", "description": "A product"}));
    }

    #[test]
    fn unknown_types_resolve_to_null() {
        let field = FieldSelection::new("__type", TypeRef::named("__Type"))
            .with_argument("name", AstValue::string("Missing"))
            .with_selections(vec![scalar("kind").into()]);

        let result = introspection()
            .resolve(&field, &Map::new())
            .expect("resolvable");

        assert!(result.is_null());
    }
}
