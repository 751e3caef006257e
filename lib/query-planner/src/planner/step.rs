use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
};

use serde::Serialize;

use crate::ast::{
    selection_item::SelectionItem,
    selection_path::SelectionPath,
    selection_set::{FieldSelection, SelectionSet},
    type_ref::TypeRef,
};

/// Alias prefix under which producers expose values other steps need.
pub const EXPORT_ALIAS_PREFIX: &str = "_internal_req_";

pub fn export_alias(field_name: &str) -> String {
    format!("{EXPORT_ALIAS_PREFIX}{field_name}")
}

/// Stable index of a step in the [`StepGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StepId(pub usize);

impl StepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for StepId {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// Plan-scoped name of a value a step consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VariableKey {
    /// A variable declared by the client operation.
    Operation { name: String },
    /// A field of an entity, exported by another step at the requiring step's parent path.
    Export { type_name: String, field: String },
}

impl VariableKey {
    pub fn export(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        VariableKey::Export {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

impl Display for VariableKey {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            VariableKey::Operation { name } => write!(f, "${}", name),
            VariableKey::Export { type_name, field } => write!(f, "{}.{}", type_name, field),
        }
    }
}

/// A value a step makes available to others, located in the response tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Export {
    pub at: SelectionPath,
    pub key: VariableKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupKind {
    /// Fields of the operation root type.
    Root,
    /// Entities fetched by representation, located at the step's parent path.
    Entity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionStep {
    pub subgraph: String,
    pub lookup: LookupKind,
    /// Response paths of the fields this step is the entry point for.
    pub root_selections: Vec<SelectionPath>,
    /// The sub-request body, relative to the root type or the entity type.
    pub selections: SelectionSet,
    pub variables: BTreeMap<String, VariableKey>,
    pub requires: BTreeSet<VariableKey>,
    pub exports: BTreeSet<Export>,
    /// Declared types of the forwarded operation variables.
    pub argument_types: BTreeMap<String, TypeRef>,
}

impl SelectionStep {
    pub fn new(subgraph: impl Into<String>, lookup: LookupKind) -> Self {
        SelectionStep {
            subgraph: subgraph.into(),
            lookup,
            root_selections: vec![],
            selections: SelectionSet::default(),
            variables: BTreeMap::new(),
            requires: BTreeSet::new(),
            exports: BTreeSet::new(),
            argument_types: BTreeMap::new(),
        }
    }
}

/// `node(id:)` on the query root.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStep {
    /// The node field without sub-selections; carries the `id` argument and the response name.
    pub field: FieldSelection,
    pub entity_steps: Vec<StepId>,
}

/// Gate for one concrete type a node id can resolve to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntityStep {
    pub type_name: String,
    pub node_step: StepId,
    /// Entity lookups fetching the fields selected on this type.
    pub selection_steps: Vec<StepId>,
    pub exports: BTreeSet<Export>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionStep {
    pub selections: SelectionSet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum StepKind {
    Selection(SelectionStep),
    /// Fetches values another step requires. Never merged with regular selection steps.
    Requirement(SelectionStep),
    Node(NodeStep),
    NodeEntity(NodeEntityStep),
    Introspection(IntrospectionStep),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    /// Object type of the selection set this step serves.
    pub type_name: String,
    /// Location of the objects this step writes into. `None` for root and introspection steps.
    pub parent: Option<SelectionPath>,
    pub depends_on: BTreeSet<StepId>,
    /// Every `(response location, concrete parent type)` this step resolves, entry
    /// points and nested fields alike.
    pub subsumed: BTreeSet<(SelectionPath, String)>,
    pub kind: StepKind,
}

impl Step {
    pub fn selection(&self) -> Option<&SelectionStep> {
        match &self.kind {
            StepKind::Selection(step) | StepKind::Requirement(step) => Some(step),
            _ => None,
        }
    }

    pub fn selection_mut(&mut self) -> Option<&mut SelectionStep> {
        match &mut self.kind {
            StepKind::Selection(step) | StepKind::Requirement(step) => Some(step),
            _ => None,
        }
    }

    pub fn is_requirement(&self) -> bool {
        matches!(self.kind, StepKind::Requirement(_))
    }

    pub fn exports(&self) -> Option<&BTreeSet<Export>> {
        match &self.kind {
            StepKind::Selection(step) | StepKind::Requirement(step) => Some(&step.exports),
            StepKind::NodeEntity(step) => Some(&step.exports),
            _ => None,
        }
    }

    pub fn requires(&self) -> Option<&BTreeSet<VariableKey>> {
        self.selection().map(|step| &step.requires)
    }

    /// Number of response names between the root and the parent location.
    pub fn depth(&self) -> usize {
        self.parent.as_ref().map(SelectionPath::len).unwrap_or(0)
    }

    pub fn root_selections(&self) -> Vec<SelectionPath> {
        match &self.kind {
            StepKind::Selection(step) | StepKind::Requirement(step) => {
                step.root_selections.clone()
            }
            StepKind::Node(step) => vec![SelectionPath::root().push(step.field.response_name())],
            StepKind::Introspection(step) => step
                .selections
                .items
                .iter()
                .filter_map(|item| match item {
                    SelectionItem::Field(field) => {
                        Some(SelectionPath::root().push(field.response_name()))
                    }
                    _ => None,
                })
                .collect(),
            StepKind::NodeEntity(_) => vec![],
        }
    }

    pub fn subgraph(&self) -> Option<&str> {
        self.selection().map(|step| step.subgraph.as_str())
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match &self.kind {
            StepKind::Selection(step) => write!(f, "{} Selection({})", self.id, step.subgraph)?,
            StepKind::Requirement(step) => {
                write!(f, "{} Requirement({})", self.id, step.subgraph)?
            }
            StepKind::Node(_) => write!(f, "{} Node", self.id)?,
            StepKind::NodeEntity(step) => write!(f, "{} NodeEntity({})", self.id, step.type_name)?,
            StepKind::Introspection(_) => write!(f, "{} Introspection", self.id)?,
        }
        write!(f, " type={}", self.type_name)?;
        if let Some(parent) = &self.parent {
            write!(f, " at={}", parent)?;
        }
        Ok(())
    }
}

/// Arena of planned steps, addressed by [`StepId`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepGraph {
    pub steps: Vec<Step>,
}

impl StepGraph {
    pub fn add(
        &mut self,
        type_name: impl Into<String>,
        parent: Option<SelectionPath>,
        kind: StepKind,
    ) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(Step {
            id,
            type_name: type_name.into(),
            parent,
            depends_on: BTreeSet::new(),
            subsumed: BTreeSet::new(),
            kind,
        });
        id
    }

    pub fn get(&self, id: StepId) -> Option<&Step> {
        self.steps.get(id.0)
    }

    pub fn get_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }
}
