use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    hash::Hash,
};

use serde::{Deserialize, Serialize};

use super::{arguments::ArgumentsMap, selection_item::SelectionItem, type_ref::TypeRef, value::Value};

pub const TYPENAME_FIELD: &str = "__typename";

#[derive(Debug, Clone, Default, PartialEq, Hash, Deserialize, Serialize)]
pub struct SelectionSet {
    pub items: Vec<SelectionItem>,
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if self.items.is_empty() {
            return Ok(());
        }

        write!(f, "{{")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "}}")
    }
}

impl SelectionSet {
    pub fn new(items: Vec<SelectionItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a field, merging it into an existing field with the same response name.
    pub fn add_field(&mut self, field: FieldSelection) {
        match self.field_mut(field.response_name()) {
            Some(existing) => existing.selections.merge(field.selections),
            None => self.items.push(SelectionItem::Field(field)),
        }
    }

    pub fn merge(&mut self, other: SelectionSet) {
        for item in other.items {
            match item {
                SelectionItem::Field(field) => {
                    self.add_field(field);
                }
                SelectionItem::InlineFragment(fragment) => {
                    self.fragment_mut(&fragment.type_condition)
                        .merge(fragment.selections);
                }
            }
        }
    }

    /// Returns the selection set of the `... on {type_condition}` fragment, creating it when missing.
    pub fn fragment_mut(&mut self, type_condition: &str) -> &mut SelectionSet {
        let position = self.items.iter().position(|item| match item {
            SelectionItem::InlineFragment(fragment) => fragment.type_condition == type_condition,
            SelectionItem::Field(_) => false,
        });

        let index = match position {
            Some(index) => index,
            None => {
                self.items
                    .push(SelectionItem::InlineFragment(InlineFragmentSelection {
                        type_condition: type_condition.to_string(),
                        selections: SelectionSet::default(),
                    }));
                self.items.len() - 1
            }
        };

        self.items[index].selection_set_mut()
    }

    pub fn field_mut(&mut self, response_name: &str) -> Option<&mut FieldSelection> {
        self.items.iter_mut().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_name() == response_name => Some(field),
            _ => None,
        })
    }

    pub fn has_typename(&self) -> bool {
        self.items.iter().any(|item| {
            matches!(item, SelectionItem::Field(field) if field.name == TYPENAME_FIELD && field.alias.is_none())
        })
    }

    pub fn ensure_typename(&mut self) {
        if !self.has_typename() {
            self.items
                .push(SelectionItem::Field(FieldSelection::new_typename()));
        }
    }

    /// Looks up a field by response name, descending into inline fragments.
    pub fn find_field(&self, response_name: &str) -> Option<&FieldSelection> {
        self.items.iter().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_name() == response_name => Some(field),
            SelectionItem::Field(_) => None,
            SelectionItem::InlineFragment(fragment) => fragment.selections.find_field(response_name),
        })
    }

    /// Flattens the fields that apply to one concrete type.
    /// Fragments are included when `applies(type_condition)` holds, and fields sharing
    /// a response name are merged into one.
    pub fn collect_fields<F>(&self, applies: &F) -> Vec<FieldSelection>
    where
        F: Fn(&str) -> bool,
    {
        let mut collected = SelectionSet::default();
        self.collect_fields_into(applies, &mut collected);

        collected
            .items
            .into_iter()
            .filter_map(|item| match item {
                SelectionItem::Field(field) => Some(field),
                SelectionItem::InlineFragment(_) => None,
            })
            .collect()
    }

    fn collect_fields_into<F>(&self, applies: &F, collected: &mut SelectionSet)
    where
        F: Fn(&str) -> bool,
    {
        for item in &self.items {
            match item {
                SelectionItem::Field(field) => {
                    collected.add_field(field.clone());
                }
                SelectionItem::InlineFragment(fragment) => {
                    if applies(&fragment.type_condition) {
                        fragment.selections.collect_fields_into(applies, collected);
                    }
                }
            }
        }
    }

    pub fn variable_usages(&self) -> BTreeSet<String> {
        let mut usages = BTreeSet::new();
        for item in &self.items {
            usages.extend(item.variable_usages());
        }
        usages
    }
}

#[derive(Clone, Debug, PartialEq, Hash, Deserialize, Serialize)]
pub struct FieldSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "ArgumentsMap::is_empty")]
    pub arguments: ArgumentsMap,
    pub output_type: TypeRef,
    #[serde(default, skip_serializing_if = "SelectionSet::is_empty")]
    pub selections: SelectionSet,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>, output_type: TypeRef) -> Self {
        FieldSelection {
            name: name.into(),
            alias: None,
            arguments: ArgumentsMap::default(),
            output_type,
            selections: SelectionSet::default(),
        }
    }

    pub fn new_typename() -> Self {
        FieldSelection::new(
            TYPENAME_FIELD,
            TypeRef::non_null(TypeRef::named("String")),
        )
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.add_argument(name.into(), value);
        self
    }

    pub fn with_selections(mut self, items: Vec<SelectionItem>) -> Self {
        self.selections = SelectionSet::new(items);
        self
    }

    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn is_typename(&self) -> bool {
        self.name == TYPENAME_FIELD
    }

    /// Same field, same arguments, no sub-selections.
    pub fn without_selections(&self) -> Self {
        FieldSelection {
            name: self.name.clone(),
            alias: self.alias.clone(),
            arguments: self.arguments.clone(),
            output_type: self.output_type.clone(),
            selections: SelectionSet::default(),
        }
    }

    pub fn variable_usages(&self) -> BTreeSet<String> {
        let mut usages = self.arguments.variable_usages();
        usages.extend(self.selections.variable_usages());
        usages
    }
}

impl Display for FieldSelection {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if let Some(alias) = &self.alias {
            write!(f, "{}:", alias)?;
        }
        write!(f, "{}{}{}", self.name, self.arguments, self.selections)
    }
}

#[derive(Clone, Debug, PartialEq, Hash, Deserialize, Serialize)]
pub struct InlineFragmentSelection {
    pub type_condition: String,
    pub selections: SelectionSet,
}

impl InlineFragmentSelection {
    pub fn new(type_condition: impl Into<String>, items: Vec<SelectionItem>) -> Self {
        InlineFragmentSelection {
            type_condition: type_condition.into(),
            selections: SelectionSet::new(items),
        }
    }
}

impl Display for InlineFragmentSelection {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "...on {}{}", self.type_condition, self.selections)
    }
}
