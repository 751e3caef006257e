pub mod builder;
pub mod policy;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ast::operation::OperationKind;

pub type SubgraphName = String;

/// Per-subgraph field ownership of the composed schema, as produced by composition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OwnershipIndex {
    #[serde(default = "default_query_type")]
    pub query_type: String,
    #[serde(default)]
    pub mutation_type: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    /// The interface served by the `node(id:)` root field, usually `Node`.
    #[serde(default)]
    pub node_interface: Option<String>,
    #[serde(default)]
    pub types: HashMap<String, TypeOwnership>,
}

fn default_query_type() -> String {
    "Query".to_string()
}

impl Default for OwnershipIndex {
    fn default() -> Self {
        OwnershipIndex {
            query_type: default_query_type(),
            mutation_type: None,
            subscription_type: None,
            node_interface: None,
            types: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Object,
    Interface,
    Union,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeOwnership {
    pub name: String,
    pub kind: TypeKind,
    /// Concrete object types of an interface or union.
    #[serde(default)]
    pub possible_types: Vec<String>,
    /// Representation key (field names) per subgraph that can look the entity up.
    #[serde(default)]
    pub keys: BTreeMap<SubgraphName, Vec<String>>,
    #[serde(default)]
    pub fields: HashMap<String, FieldOwnership>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FieldOwnership {
    pub owners: Vec<FieldOwner>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldOwner {
    pub subgraph: SubgraphName,
    /// Fields of the parent type the subgraph needs in the representation to resolve this field.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl OwnershipIndex {
    pub fn builder() -> builder::OwnershipIndexBuilder {
        builder::OwnershipIndexBuilder::default()
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(self.query_type.as_str()),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    pub fn is_root_type(&self, type_name: &str) -> bool {
        self.query_type == type_name
            || self.mutation_type.as_deref() == Some(type_name)
            || self.subscription_type.as_deref() == Some(type_name)
    }

    pub fn type_ownership(&self, type_name: &str) -> Option<&TypeOwnership> {
        self.types.get(type_name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldOwnership> {
        self.types
            .get(type_name)
            .and_then(|type_ownership| type_ownership.fields.get(field_name))
    }

    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.types.get(type_name).is_some_and(|type_ownership| {
            matches!(type_ownership.kind, TypeKind::Interface | TypeKind::Union)
        })
    }

    /// Concrete types a value of `type_name` can have. An object type is its own only possible type.
    pub fn possible_types<'a>(&'a self, type_name: &'a str) -> Vec<&'a str> {
        match self.types.get(type_name) {
            Some(type_ownership) if type_ownership.kind != TypeKind::Object => type_ownership
                .possible_types
                .iter()
                .map(String::as_str)
                .collect(),
            _ => vec![type_name],
        }
    }

    /// Whether a fragment on `type_condition` applies to an object of `concrete_type`.
    pub fn type_condition_applies(&self, type_condition: &str, concrete_type: &str) -> bool {
        type_condition == concrete_type
            || (self.is_abstract(type_condition)
                && self
                    .possible_types(type_condition)
                    .contains(&concrete_type))
    }

    pub fn entity_key(&self, type_name: &str, subgraph: &str) -> Option<&[String]> {
        self.types
            .get(type_name)
            .and_then(|type_ownership| type_ownership.keys.get(subgraph))
            .map(Vec::as_slice)
    }

    /// True when `subgraph` can resolve the field as part of a selection it already serves.
    pub fn can_resolve(&self, type_name: &str, field_name: &str, subgraph: &str) -> bool {
        self.field(type_name, field_name).is_some_and(|ownership| {
            ownership
                .owners
                .iter()
                .any(|owner| owner.subgraph == subgraph && owner.requires.is_empty())
        })
    }
}
