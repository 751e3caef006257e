use conductor_query_planner::{
    ast::{
        operation::Operation,
        selection_set::{FieldSelection, SelectionSet},
    },
    ownership::OwnershipIndex,
};
use serde_json::{Map, Value};
use tracing::instrument;

const TYPENAME_FIELD_NAME: &str = "__typename";

/// Shapes the merged response by the client operation: fields come out in selection
/// order, fragments apply by the concrete `__typename`, and anything the client did not
/// ask for (internal key aliases, helper `__typename`s) is dropped.
#[instrument(level = "trace", skip_all)]
pub fn project_by_operation(
    data: &Value,
    operation: &Operation,
    schema: &OwnershipIndex,
    operation_type_name: &str,
) -> Value {
    match data {
        Value::Object(data_map) => project_selection_set_with_map(
            data_map,
            &operation.selection_set,
            operation_type_name,
            schema,
        ),
        _ => Value::Null,
    }
}

fn project_selection_set_with_map(
    object: &Map<String, Value>,
    selections: &SelectionSet,
    default_type_name: &str,
    schema: &OwnershipIndex,
) -> Value {
    let type_name = object
        .get(TYPENAME_FIELD_NAME)
        .and_then(Value::as_str)
        .unwrap_or(default_type_name);

    let fields = selections
        .collect_fields(&|type_condition: &str| schema.type_condition_applies(type_condition, type_name));

    let mut projected = Map::with_capacity(fields.len());
    for field in &fields {
        let value = if field.is_typename() {
            Value::from(type_name)
        } else {
            object
                .get(field.response_name())
                .map_or(Value::Null, |value| project_value(value, field, schema))
        };
        projected.insert(field.response_name().to_string(), value);
    }

    Value::Object(projected)
}

fn project_value(value: &Value, field: &FieldSelection, schema: &OwnershipIndex) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project_value(item, field, schema))
                .collect(),
        ),
        Value::Object(object) if !field.is_leaf() => project_selection_set_with_map(
            object,
            &field.selections,
            field.output_type.named_type(),
            schema,
        ),
        other => other.clone(),
    }
}
