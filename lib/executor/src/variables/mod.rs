use conductor_query_planner::ast::{operation::Operation, value::Value as AstValue};
use serde_json::{Map, Number, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VariablesError {
    #[error("Variable \"${0}\" of non-null type \"{1}\" was not provided")]
    MissingNonNullVariable(String, String),
    #[error("Variable \"${0}\" of non-null type \"{1}\" must not be null")]
    NullNonNullVariable(String, String),
}

/// Coerces the request variables against the operation's definitions: declared
/// defaults fill missing values, undeclared variables are dropped, and missing or
/// `null` values of non-null variables are rejected.
pub fn collect_variables(
    operation: &Operation,
    mut variables: Option<Map<String, Value>>,
) -> Result<Map<String, Value>, VariablesError> {
    let mut incoming_variables = variables.take().unwrap_or_default();
    let mut collected = Map::with_capacity(operation.variable_definitions.len());

    for variable_definition in &operation.variable_definitions {
        let variable_name = variable_definition.name.as_str();
        let is_non_null = variable_definition.type_ref.is_non_null();

        if let Some(variable_value) = incoming_variables.remove(variable_name) {
            if variable_value.is_null() && is_non_null {
                return Err(VariablesError::NullNonNullVariable(
                    variable_name.to_string(),
                    variable_definition.type_ref.to_string(),
                ));
            }
            collected.insert(variable_name.to_string(), variable_value);
            continue;
        }

        if let Some(default_value) = &variable_definition.default_value {
            collected.insert(
                variable_name.to_string(),
                value_to_json(default_value, &Map::new()),
            );
            continue;
        }

        if is_non_null {
            return Err(VariablesError::MissingNonNullVariable(
                variable_name.to_string(),
                variable_definition.type_ref.to_string(),
            ));
        }
    }

    Ok(collected)
}

/// Turns an argument literal into JSON, reading variables from `variables`.
/// An unset variable becomes `null`.
pub fn value_to_json(value: &AstValue, variables: &Map<String, Value>) -> Value {
    match value {
        AstValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        AstValue::Int(i) => Value::from(*i),
        AstValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AstValue::String(s) => Value::from(s.as_str()),
        AstValue::Boolean(b) => Value::Bool(*b),
        AstValue::Null => Value::Null,
        AstValue::Enum(e) => Value::from(e.as_str()),
        AstValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| value_to_json(item, variables))
                .collect(),
        ),
        AstValue::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), value_to_json(item, variables)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use conductor_query_planner::ast::{
        operation::{Operation, VariableDefinition},
        selection_set::SelectionSet,
        type_ref::TypeRef,
        value::Value as AstValue,
    };
    use serde_json::{json, Map};

    use super::{collect_variables, value_to_json, VariablesError};

    fn operation() -> Operation {
        Operation::query(SelectionSet::default())
            .with_variable(VariableDefinition::new(
                "id",
                TypeRef::non_null(TypeRef::named("ID")),
            ))
            .with_variable(
                VariableDefinition::new("first", TypeRef::named("Int"))
                    .with_default_value(AstValue::Int(5)),
            )
            .with_variable(VariableDefinition::new("after", TypeRef::named("String")))
    }

    #[test]
    fn applies_defaults_and_drops_undeclared_variables() {
        let provided = json!({"id": "1", "unused": true});
        let collected = collect_variables(&operation(), provided.as_object().cloned())
            .expect("valid variables");

        assert_eq!(json!(collected), json!({"id": "1", "first": 5}));
    }

    #[test]
    fn rejects_missing_non_null_variables() {
        assert_eq!(
            collect_variables(&operation(), None),
            Err(VariablesError::MissingNonNullVariable(
                "id".to_string(),
                "ID!".to_string()
            ))
        );
    }

    #[test]
    fn converts_literals_with_variables() {
        let variables: Map<String, serde_json::Value> =
            json!({"v": [1, 2]}).as_object().cloned().unwrap_or_default();
        let value = AstValue::List(vec![
            AstValue::Variable("v".to_string()),
            AstValue::Enum("ASC".to_string()),
            AstValue::Null,
        ]);

        assert_eq!(value_to_json(&value, &variables), json!([[1, 2], "ASC", null]));
    }
}
