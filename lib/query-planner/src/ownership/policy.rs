use std::fmt::Debug;

use super::FieldOwner;

/// Everything a policy knows about the field being placed.
#[derive(Debug)]
pub struct SelectionContext<'a> {
    pub type_name: &'a str,
    pub field_name: &'a str,
    /// Subgraph serving the enclosing selection set, `None` at the operation root.
    pub parent_subgraph: Option<&'a str>,
    /// Owners declared by the ownership index, in declaration order. Never empty.
    pub candidates: &'a [FieldOwner],
}

/// Picks the subgraph that resolves a field owned by more than one subgraph.
pub trait SubgraphSelectionPolicy: Debug + Send + Sync {
    fn select<'a>(&self, context: &SelectionContext<'a>) -> Option<&'a FieldOwner>;
}

/// Stays in the parent subgraph whenever it owns the field without requirements,
/// which avoids an extra hop. Falls back to the first declared owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferParentSubgraph;

impl SubgraphSelectionPolicy for PreferParentSubgraph {
    fn select<'a>(&self, context: &SelectionContext<'a>) -> Option<&'a FieldOwner> {
        context
            .parent_subgraph
            .and_then(|parent| {
                context
                    .candidates
                    .iter()
                    .find(|owner| owner.subgraph == parent && owner.requires.is_empty())
            })
            .or_else(|| context.candidates.first())
    }
}

/// Always the first declared owner, even if the parent subgraph could serve the field.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstDeclaredOwner;

impl SubgraphSelectionPolicy for FirstDeclaredOwner {
    fn select<'a>(&self, context: &SelectionContext<'a>) -> Option<&'a FieldOwner> {
        context.candidates.first()
    }
}
