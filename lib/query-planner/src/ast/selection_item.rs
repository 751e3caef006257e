use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    hash::Hash,
};

use serde::{Deserialize, Serialize};

use super::selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet};
use crate::utils::pretty_display::{get_indent, PrettyDisplay};

#[derive(Clone, Debug, PartialEq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum SelectionItem {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

impl Display for SelectionItem {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            SelectionItem::Field(field_selection) => write!(f, "{}", field_selection),
            SelectionItem::InlineFragment(fragment_selection) => {
                write!(f, "{}", fragment_selection)
            }
        }
    }
}

impl SelectionItem {
    pub fn variable_usages(&self) -> BTreeSet<String> {
        match self {
            SelectionItem::Field(field_selection) => field_selection.variable_usages(),
            SelectionItem::InlineFragment(fragment_selection) => {
                fragment_selection.selections.variable_usages()
            }
        }
    }

    pub fn selection_set(&self) -> &SelectionSet {
        match self {
            SelectionItem::Field(FieldSelection { selections, .. }) => selections,
            SelectionItem::InlineFragment(InlineFragmentSelection { selections, .. }) => selections,
        }
    }

    pub fn selection_set_mut(&mut self) -> &mut SelectionSet {
        match self {
            SelectionItem::Field(FieldSelection { selections, .. }) => selections,
            SelectionItem::InlineFragment(InlineFragmentSelection { selections, .. }) => selections,
        }
    }
}

impl From<FieldSelection> for SelectionItem {
    fn from(field: FieldSelection) -> Self {
        SelectionItem::Field(field)
    }
}

impl From<InlineFragmentSelection> for SelectionItem {
    fn from(fragment: InlineFragmentSelection) -> Self {
        SelectionItem::InlineFragment(fragment)
    }
}

impl PrettyDisplay for SelectionSet {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        if self.items.is_empty() {
            return Ok(());
        }

        writeln!(f, "{{")?;
        for item in &self.items {
            item.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{indent}}}")
    }
}

impl PrettyDisplay for SelectionItem {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        match self {
            SelectionItem::Field(field) => {
                write!(f, "{indent}")?;
                if let Some(alias) = &field.alias {
                    write!(f, "{}: ", alias)?;
                }
                write!(f, "{}{}", field.name, field.arguments)?;
                if field.selections.is_empty() {
                    writeln!(f)
                } else {
                    write!(f, " ")?;
                    field.selections.pretty_fmt(f, depth)
                }
            }
            SelectionItem::InlineFragment(fragment) => {
                write!(f, "{indent}... on {} ", fragment.type_condition)?;
                fragment.selections.pretty_fmt(f, depth)
            }
        }
    }
}
