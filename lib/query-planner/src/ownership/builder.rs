use std::collections::{BTreeMap, HashMap};

use super::{FieldOwner, FieldOwnership, OwnershipIndex, TypeKind, TypeOwnership};

/// Fluent construction of an [`OwnershipIndex`], mostly for fixtures and tests.
#[derive(Debug, Default)]
pub struct OwnershipIndexBuilder {
    index: OwnershipIndex,
}

impl OwnershipIndexBuilder {
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.index.query_type = name.into();
        self
    }

    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.index.mutation_type = Some(name.into());
        self
    }

    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.index.subscription_type = Some(name.into());
        self
    }

    pub fn node_interface(mut self, name: impl Into<String>) -> Self {
        self.index.node_interface = Some(name.into());
        self
    }

    pub fn object(self, name: &str) -> Self {
        self.with_type(name, TypeKind::Object, &[])
    }

    pub fn interface(self, name: &str, possible_types: &[&str]) -> Self {
        self.with_type(name, TypeKind::Interface, possible_types)
    }

    pub fn union(self, name: &str, possible_types: &[&str]) -> Self {
        self.with_type(name, TypeKind::Union, possible_types)
    }

    /// Declares that `subgraph` can look `type_name` up by the given key fields.
    pub fn key(mut self, type_name: &str, subgraph: &str, fields: &[&str]) -> Self {
        self.type_entry(type_name).keys.insert(
            subgraph.to_string(),
            fields.iter().map(|field| field.to_string()).collect(),
        );
        self
    }

    /// Declares one owner for each listed field.
    pub fn fields(mut self, type_name: &str, subgraph: &str, fields: &[&str]) -> Self {
        for field in fields {
            self = self.field_requiring(type_name, field, subgraph, &[]);
        }
        self
    }

    pub fn field_requiring(
        mut self,
        type_name: &str,
        field: &str,
        subgraph: &str,
        requires: &[&str],
    ) -> Self {
        self.type_entry(type_name)
            .fields
            .entry(field.to_string())
            .or_insert_with(FieldOwnership::default)
            .owners
            .push(FieldOwner {
                subgraph: subgraph.to_string(),
                requires: requires.iter().map(|field| field.to_string()).collect(),
            });
        self
    }

    pub fn build(self) -> OwnershipIndex {
        self.index
    }

    fn with_type(mut self, name: &str, kind: TypeKind, possible_types: &[&str]) -> Self {
        let entry = self.type_entry(name);
        entry.kind = kind;
        entry.possible_types = possible_types.iter().map(|t| t.to_string()).collect();
        self
    }

    fn type_entry(&mut self, name: &str) -> &mut TypeOwnership {
        self.index
            .types
            .entry(name.to_string())
            .or_insert_with(|| TypeOwnership {
                name: name.to_string(),
                kind: TypeKind::Object,
                possible_types: vec![],
                keys: BTreeMap::new(),
                fields: HashMap::new(),
            })
    }
}
