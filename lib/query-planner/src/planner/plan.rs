use std::{
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    ast::{
        operation::{Operation, OperationKind},
        selection_path::SelectionPath,
        selection_set::SelectionSet,
        type_ref::TypeRef,
        value::Value,
    },
    ownership::OwnershipIndex,
    planner::step::{LookupKind, StepId},
    utils::pretty_display::{get_indent, PrettyDisplay},
};

/// Frozen, index-addressed plan. Steps are ordered so that every step comes after
/// all of its dependencies. Read-only once compiled; shared across requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub operation_kind: OperationKind,
    pub root_type_name: String,
    pub steps: Vec<CompiledStep>,
    #[serde(skip)]
    pub operation: Arc<Operation>,
    #[serde(skip)]
    pub schema: Arc<OwnershipIndex>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStep {
    pub index: usize,
    /// Identifier the step had while planning.
    pub step_id: StepId,
    pub type_name: String,
    pub parent: Option<SelectionPath>,
    pub depends_on: Vec<usize>,
    pub dependents: Vec<usize>,
    pub root_selections: Vec<SelectionPath>,
    pub kind: CompiledStepKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum CompiledStepKind {
    Fetch(FetchStep),
    Node(NodeResolution),
    NodeEntity(NodeEntityGate),
    Introspection(IntrospectionResolution),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStep {
    pub subgraph: String,
    pub is_requirement: bool,
    pub lookup: LookupKind,
    /// Minified sub-request document.
    pub document: String,
    pub variables: Vec<VariableBinding>,
    /// Shape of one representation, for entity lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representation: Option<RepresentationShape>,
}

/// An operation variable forwarded to the sub-request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableBinding {
    pub name: String,
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentationShape {
    pub type_name: String,
    /// Field names read from the exported `_internal_req_<field>` values.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResolution {
    pub response_name: String,
    /// The `id` argument, possibly a variable.
    pub id: Value,
    pub possible_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntityGate {
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionResolution {
    pub selections: SelectionSet,
}

impl CompiledStep {
    pub fn fetch(&self) -> Option<&FetchStep> {
        match &self.kind {
            CompiledStepKind::Fetch(fetch) => Some(fetch),
            _ => None,
        }
    }

    pub fn subgraph(&self) -> Option<&str> {
        self.fetch().map(|fetch| fetch.subgraph.as_str())
    }

    pub fn label(&self) -> String {
        match &self.kind {
            CompiledStepKind::Fetch(fetch) if fetch.is_requirement => {
                format!("Requirement({})", fetch.subgraph)
            }
            CompiledStepKind::Fetch(fetch) => format!("Fetch({})", fetch.subgraph),
            CompiledStepKind::Node(node) => format!("Node({})", node.response_name),
            CompiledStepKind::NodeEntity(gate) => format!("NodeEntity({})", gate.type_name),
            CompiledStepKind::Introspection(_) => "Introspection".to_string(),
        }
    }
}

impl ExecutionPlan {
    pub fn step(&self, index: usize) -> Option<&CompiledStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Groups steps by dependency depth: a step lands one wave after its deepest dependency.
    /// Steps of one wave have no dependency between them.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut levels: Vec<usize> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let level = step
                .depends_on
                .iter()
                .filter_map(|dependency| levels.get(*dependency))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            levels.push(level);
        }

        let mut waves: Vec<Vec<usize>> = vec![];
        for (index, level) in levels.into_iter().enumerate() {
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(index);
        }
        waves
    }

    pub fn to_json(&self) -> Result<String, sonic_rs::Error> {
        sonic_rs::to_string_pretty(self)
    }
}

impl PrettyDisplay for CompiledStep {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        write!(f, "{indent}[{}] {} type={}", self.index, self.label(), self.type_name)?;
        if let Some(parent) = &self.parent {
            write!(f, " at={}", parent)?;
        }
        if !self.depends_on.is_empty() {
            let depends_on: Vec<String> = self.depends_on.iter().map(usize::to_string).collect();
            write!(f, " depends_on=[{}]", depends_on.join(","))?;
        }
        writeln!(f)?;

        match &self.kind {
            CompiledStepKind::Fetch(fetch) => {
                writeln!(f, "{}{}", get_indent(depth + 1), fetch.document)
            }
            CompiledStepKind::Introspection(introspection) => {
                writeln!(f, "{}{}", get_indent(depth + 1), introspection.selections)
            }
            CompiledStepKind::Node(node) => {
                writeln!(f, "{}id: {}", get_indent(depth + 1), node.id)
            }
            CompiledStepKind::NodeEntity(_) => Ok(()),
        }
    }
}

impl Display for ExecutionPlan {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        writeln!(f, "ExecutionPlan({}) {{", self.operation_kind)?;
        for step in &self.steps {
            step.pretty_fmt(f, 1)?;
        }
        write!(f, "}}")
    }
}
