use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::{selection_set::SelectionSet, type_ref::TypeRef, value::Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Hash, Deserialize, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        VariableDefinition {
            name: name.into(),
            type_ref,
            default_value: None,
        }
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

impl Display for VariableDefinition {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "${}:{}", self.name, self.type_ref)?;
        if let Some(default_value) = &self.default_value {
            write!(f, "={}", default_value)?;
        }
        Ok(())
    }
}

/// A validated operation with fragment spreads already inlined
/// and `@skip`/`@include` already applied.
#[derive(Clone, Debug, PartialEq, Hash, Deserialize, Serialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub variable_definitions: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

impl Operation {
    pub fn new(kind: OperationKind, selection_set: SelectionSet) -> Self {
        Operation {
            kind,
            name: None,
            variable_definitions: vec![],
            selection_set,
        }
    }

    pub fn query(selection_set: SelectionSet) -> Self {
        Self::new(OperationKind::Query, selection_set)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_variable(mut self, definition: VariableDefinition) -> Self {
        self.variable_definitions.push(definition);
        self
    }

    pub fn variable_definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.variable_definitions
            .iter()
            .find(|definition| definition.name == name)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        if !self.variable_definitions.is_empty() {
            write!(f, "(")?;
            for (i, definition) in self.variable_definitions.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", definition)?;
            }
            write!(f, ")")?;
        }
        write!(f, "{}", self.selection_set)
    }
}
