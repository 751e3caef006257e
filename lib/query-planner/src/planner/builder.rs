use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use tracing::{debug, instrument, trace};

use crate::{
    ast::{
        operation::{Operation, OperationKind},
        selection_path::SelectionPath,
        selection_set::{FieldSelection, SelectionSet},
        type_ref::TypeRef,
    },
    ownership::{
        policy::{SelectionContext, SubgraphSelectionPolicy},
        FieldOwner, OwnershipIndex,
    },
    planner::{
        error::PlanningError,
        step::{
            export_alias, Export, IntrospectionStep, LookupKind, NodeEntityStep, NodeStep,
            SelectionStep, Step, StepGraph, StepId, StepKind, VariableKey,
        },
    },
    utils::cancellation::CancellationToken,
};

/// Requirement steps needing requirement steps of their own give up past this depth.
const MAX_REQUIREMENT_DEPTH: usize = 8;

const INTROSPECTION_FIELDS: [&str; 3] = ["__schema", "__type", "__typename"];
const NODE_FIELD: &str = "node";
const NODE_ID_ARGUMENT: &str = "id";
const ID_FIELD: &str = "id";
/// Output type recorded on fields the planner adds for its own use.
const ANY_SCALAR: &str = "_Any";

/// Position of a selection set inside a step's sub-request body.
#[derive(Debug, Clone)]
enum Cursor {
    Field(String),
    Fragment(String),
}

/// Who serves the selection set being planned.
#[derive(Debug, Clone)]
enum Provider {
    /// The operation root. Root fields open root steps.
    Root,
    Step {
        id: StepId,
        subgraph: String,
        cursor: Vec<Cursor>,
    },
    /// Objects created from a node id. They carry nothing but `__typename` and `id`.
    NodeEntity { id: StepId },
}

#[derive(Debug, Clone)]
struct Frame {
    provider: Provider,
    path: SelectionPath,
    type_name: String,
}

impl Frame {
    fn subgraph(&self) -> Option<&str> {
        match &self.provider {
            Provider::Step { subgraph, .. } => Some(subgraph.as_str()),
            _ => None,
        }
    }

    /// Same location, narrowed to one concrete type of an abstract selection.
    fn refine(&self, concrete_type: &str) -> Frame {
        let provider = match &self.provider {
            Provider::Step {
                id,
                subgraph,
                cursor,
            } => {
                let mut cursor = cursor.clone();
                cursor.push(Cursor::Fragment(concrete_type.to_string()));
                Provider::Step {
                    id: *id,
                    subgraph: subgraph.clone(),
                    cursor,
                }
            }
            other => other.clone(),
        };

        Frame {
            provider,
            path: self.path.clone(),
            type_name: concrete_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntityStepKey {
    subgraph: String,
    path: SelectionPath,
    type_name: String,
    requirement: bool,
}

/// Walks the operation depth-first and assigns every selection to exactly one step.
pub struct StepBuilder<'a> {
    index: &'a OwnershipIndex,
    policy: &'a dyn SubgraphSelectionPolicy,
    operation: &'a Operation,
    cancellation_token: &'a CancellationToken,
    graph: StepGraph,
    root_steps: FxHashMap<String, StepId>,
    entity_steps: FxHashMap<EntityStepKey, StepId>,
    introspection_step: Option<StepId>,
    coverage: FxHashMap<(SelectionPath, String), StepId>,
}

#[instrument(level = "trace", skip_all, fields(operation_kind = %operation.kind))]
pub fn build_steps(
    index: &OwnershipIndex,
    policy: &dyn SubgraphSelectionPolicy,
    operation: &Operation,
    cancellation_token: &CancellationToken,
) -> Result<StepGraph, PlanningError> {
    StepBuilder::new(index, policy, operation, cancellation_token).build()
}

impl<'a> StepBuilder<'a> {
    pub fn new(
        index: &'a OwnershipIndex,
        policy: &'a dyn SubgraphSelectionPolicy,
        operation: &'a Operation,
        cancellation_token: &'a CancellationToken,
    ) -> Self {
        StepBuilder {
            index,
            policy,
            operation,
            cancellation_token,
            graph: StepGraph::default(),
            root_steps: FxHashMap::default(),
            entity_steps: FxHashMap::default(),
            introspection_step: None,
            coverage: FxHashMap::default(),
        }
    }

    pub fn build(mut self) -> Result<StepGraph, PlanningError> {
        let kind = self.operation.kind;
        if kind == OperationKind::Subscription {
            return Err(PlanningError::UnsupportedOperation(kind));
        }

        let index = self.index;
        let root_type = index
            .root_type(kind)
            .ok_or(PlanningError::MissingRootType(kind))?
            .to_string();
        let fields = self
            .operation
            .selection_set
            .collect_fields(&|condition: &str| index.type_condition_applies(condition, &root_type));

        match kind {
            OperationKind::Mutation => self.plan_mutation_root(&root_type, fields)?,
            _ => self.plan_query_root(&root_type, fields)?,
        }

        self.bind_variables()?;
        self.check_coverage(
            &self.operation.selection_set,
            &root_type,
            &SelectionPath::root(),
        )?;

        debug!(steps = self.graph.len(), "operation split into steps");

        Ok(self.graph)
    }

    fn plan_query_root(
        &mut self,
        root_type: &str,
        fields: Vec<FieldSelection>,
    ) -> Result<(), PlanningError> {
        for field in fields {
            self.cancellation_token.bail_if_cancelled()?;

            if is_introspection_field(&field) {
                self.plan_introspection(root_type, &field)?;
                continue;
            }

            if self.is_node_field(&field) {
                self.plan_node(root_type, &field)?;
                continue;
            }

            let owner = self.select_root_owner(root_type, &field)?;
            let step_id = match self.root_steps.get(&owner.subgraph) {
                Some(step_id) => *step_id,
                None => {
                    let step_id = self.graph.add(
                        root_type,
                        None,
                        StepKind::Selection(SelectionStep::new(&owner.subgraph, LookupKind::Root)),
                    );
                    trace!(step = %step_id, subgraph = %owner.subgraph, "root step created");
                    self.root_steps.insert(owner.subgraph.clone(), step_id);
                    step_id
                }
            };

            self.plan_root_field(step_id, &owner.subgraph, root_type, &field)?;
        }

        Ok(())
    }

    /// Root mutation fields run one after another. Consecutive fields of one subgraph
    /// share a step, and every new step waits for the previous one.
    fn plan_mutation_root(
        &mut self,
        root_type: &str,
        fields: Vec<FieldSelection>,
    ) -> Result<(), PlanningError> {
        let mut previous: Option<StepId> = None;

        for field in fields {
            self.cancellation_token.bail_if_cancelled()?;

            if is_introspection_field(&field) {
                self.plan_introspection(root_type, &field)?;
                continue;
            }

            let owner = self.select_root_owner(root_type, &field)?;
            let reusable = previous.filter(|step_id| {
                self.graph.get(*step_id).and_then(Step::subgraph) == Some(owner.subgraph.as_str())
            });

            let step_id = match reusable {
                Some(step_id) => step_id,
                None => {
                    let step_id = self.graph.add(
                        root_type,
                        None,
                        StepKind::Selection(SelectionStep::new(&owner.subgraph, LookupKind::Root)),
                    );
                    if let Some(previous) = previous {
                        self.step_mut(step_id)?.depends_on.insert(previous);
                    }
                    trace!(step = %step_id, subgraph = %owner.subgraph, "mutation step created");
                    step_id
                }
            };
            previous = Some(step_id);

            self.plan_root_field(step_id, &owner.subgraph, root_type, &field)?;
        }

        Ok(())
    }

    fn plan_root_field(
        &mut self,
        step_id: StepId,
        subgraph: &str,
        root_type: &str,
        field: &FieldSelection,
    ) -> Result<(), PlanningError> {
        let path = SelectionPath::root().push(field.response_name());
        let step = self.selection_step_mut(step_id)?;
        step.root_selections.push(path.clone());
        step.selections.add_field(field.without_selections());
        self.cover(&path, root_type, step_id)?;

        if !field.is_leaf() {
            let frame = Frame {
                provider: Provider::Step {
                    id: step_id,
                    subgraph: subgraph.to_string(),
                    cursor: vec![Cursor::Field(field.response_name().to_string())],
                },
                path,
                type_name: field.output_type.named_type().to_string(),
            };
            self.plan_selection_set(&frame, &field.selections)?;
        }

        Ok(())
    }

    fn plan_selection_set(
        &mut self,
        frame: &Frame,
        selections: &SelectionSet,
    ) -> Result<(), PlanningError> {
        let index = self.index;

        if !index.is_abstract(&frame.type_name) {
            let fields = selections.collect_fields(&|condition: &str| {
                index.type_condition_applies(condition, &frame.type_name)
            });
            return self.plan_fields(frame, fields);
        }

        // Projection and entity lookups tell concrete types apart by `__typename`.
        self.ensure_typename(frame)?;

        for concrete_type in index.possible_types(&frame.type_name) {
            let fields = selections.collect_fields(&|condition: &str| {
                index.type_condition_applies(condition, concrete_type)
            });
            if fields.is_empty() {
                continue;
            }

            self.plan_fields(&frame.refine(concrete_type), fields)?;
        }

        Ok(())
    }

    fn plan_fields(
        &mut self,
        frame: &Frame,
        fields: Vec<FieldSelection>,
    ) -> Result<(), PlanningError> {
        for field in fields {
            self.cancellation_token.bail_if_cancelled()?;

            let path = frame.path.push(field.response_name());

            if field.is_typename() {
                self.plan_typename(frame, &field, &path)?;
                continue;
            }

            let owner = self.select_owner(&frame.type_name, &field.name, frame.subgraph())?;

            let (step_id, subgraph, cursor) = match &frame.provider {
                Provider::Step {
                    id,
                    subgraph,
                    cursor,
                } if owner.requires.is_empty() && *subgraph == owner.subgraph => {
                    (*id, subgraph.clone(), cursor.clone())
                }
                _ => {
                    let step_id = self.entity_step(frame, &owner.subgraph, false, 0)?;
                    for required in &owner.requires {
                        self.provide(frame, required, 0)?;
                        self.selection_step_mut(step_id)?
                            .requires
                            .insert(VariableKey::export(&frame.type_name, required));
                    }
                    self.selection_step_mut(step_id)?
                        .root_selections
                        .push(path.clone());
                    (step_id, owner.subgraph.clone(), vec![])
                }
            };

            self.selection_at(step_id, &cursor)?
                .add_field(field.without_selections());
            self.cover(&path, &frame.type_name, step_id)?;

            if !field.is_leaf() {
                let mut cursor = cursor;
                cursor.push(Cursor::Field(field.response_name().to_string()));
                let child = Frame {
                    provider: Provider::Step {
                        id: step_id,
                        subgraph,
                        cursor,
                    },
                    path,
                    type_name: field.output_type.named_type().to_string(),
                };
                self.plan_selection_set(&child, &field.selections)?;
            }
        }

        Ok(())
    }

    fn plan_typename(
        &mut self,
        frame: &Frame,
        field: &FieldSelection,
        path: &SelectionPath,
    ) -> Result<(), PlanningError> {
        match &frame.provider {
            Provider::Step { id, cursor, .. } => {
                let step_id = *id;
                self.selection_at(step_id, cursor)?
                    .add_field(field.without_selections());
                self.cover(path, &frame.type_name, step_id)
            }
            Provider::NodeEntity { id } => self.cover(path, &frame.type_name, *id),
            Provider::Root => Err(PlanningError::Internal(format!(
                "'{}' reached field planning without a serving step",
                path
            ))),
        }
    }

    /// Returns the entity lookup step for the frame's location, creating it on first use.
    /// A new step requires its key fields from whoever serves the frame.
    fn entity_step(
        &mut self,
        frame: &Frame,
        subgraph: &str,
        requirement: bool,
        depth: usize,
    ) -> Result<StepId, PlanningError> {
        let key = EntityStepKey {
            subgraph: subgraph.to_string(),
            path: frame.path.clone(),
            type_name: frame.type_name.clone(),
            requirement,
        };
        if let Some(step_id) = self.entity_steps.get(&key) {
            return Ok(*step_id);
        }

        let key_fields = self
            .index
            .entity_key(&frame.type_name, subgraph)
            .ok_or_else(|| PlanningError::MissingEntityKey {
                type_name: frame.type_name.clone(),
                subgraph: subgraph.to_string(),
            })?
            .to_vec();

        let mut step = SelectionStep::new(subgraph, LookupKind::Entity);
        step.requires.extend(
            key_fields
                .iter()
                .map(|field| VariableKey::export(&frame.type_name, field)),
        );
        let kind = if requirement {
            StepKind::Requirement(step)
        } else {
            StepKind::Selection(step)
        };

        let step_id = self
            .graph
            .add(frame.type_name.clone(), Some(frame.path.clone()), kind);
        self.entity_steps.insert(key, step_id);
        trace!(
            step = %step_id,
            subgraph,
            type_name = %frame.type_name,
            at = %frame.path,
            requirement,
            "entity step created"
        );

        if let Provider::NodeEntity { id } = &frame.provider {
            if let Some(Step {
                kind: StepKind::NodeEntity(gate),
                ..
            }) = self.graph.get_mut(*id)
            {
                gate.selection_steps.push(step_id);
            }
        }

        self.ensure_typename(frame)?;
        for field in &key_fields {
            self.provide(frame, field, depth)?;
        }

        Ok(step_id)
    }

    /// Makes `field_name` of the frame's objects available to other steps.
    /// The serving step exports it when its subgraph can resolve it, otherwise
    /// a requirement step fetches it.
    fn provide(
        &mut self,
        frame: &Frame,
        field_name: &str,
        depth: usize,
    ) -> Result<(), PlanningError> {
        let export = Export {
            at: frame.path.clone(),
            key: VariableKey::export(&frame.type_name, field_name),
        };

        match &frame.provider {
            Provider::Step {
                id,
                subgraph,
                cursor,
            } if self
                .index
                .can_resolve(&frame.type_name, field_name, subgraph) =>
            {
                let step_id = *id;
                let selections = self.selection_at(step_id, cursor)?;
                selections.ensure_typename();
                selections.add_field(exported_field(field_name));
                self.selection_step_mut(step_id)?.exports.insert(export);
                return Ok(());
            }
            Provider::NodeEntity { id } if field_name == ID_FIELD => {
                if let Some(Step {
                    kind: StepKind::NodeEntity(gate),
                    ..
                }) = self.graph.get_mut(*id)
                {
                    gate.exports.insert(export);
                }
                return Ok(());
            }
            _ => {}
        }

        let unresolvable = || PlanningError::UnresolvableRequirement {
            type_name: frame.type_name.clone(),
            field: field_name.to_string(),
            at: frame.path.clone(),
        };

        if depth >= MAX_REQUIREMENT_DEPTH {
            return Err(unresolvable());
        }

        let owner = self
            .select_owner(&frame.type_name, field_name, frame.subgraph())
            .map_err(|_| unresolvable())?;

        let step_id = self.entity_step(frame, &owner.subgraph, true, depth + 1)?;
        for required in &owner.requires {
            self.provide(frame, required, depth + 1)?;
            self.selection_step_mut(step_id)?
                .requires
                .insert(VariableKey::export(&frame.type_name, required));
        }

        let step = self.selection_step_mut(step_id)?;
        step.selections.add_field(exported_field(field_name));
        step.exports.insert(export);

        Ok(())
    }

    fn plan_introspection(
        &mut self,
        root_type: &str,
        field: &FieldSelection,
    ) -> Result<(), PlanningError> {
        let step_id = match self.introspection_step {
            Some(step_id) => step_id,
            None => {
                let step_id = self.graph.add(
                    root_type,
                    None,
                    StepKind::Introspection(IntrospectionStep {
                        selections: SelectionSet::default(),
                    }),
                );
                self.introspection_step = Some(step_id);
                step_id
            }
        };

        if let StepKind::Introspection(step) = &mut self.step_mut(step_id)?.kind {
            step.selections.add_field(field.clone());
        }

        self.cover(
            &SelectionPath::root().push(field.response_name()),
            root_type,
            step_id,
        )
    }

    fn is_node_field(&self, field: &FieldSelection) -> bool {
        self.operation.kind == OperationKind::Query
            && field.name == NODE_FIELD
            && self.index.node_interface.as_deref() == Some(field.output_type.named_type())
    }

    /// `node(id:)` becomes a node step plus one gate per possible type.
    /// Fields of each type are fetched by entity lookups keyed by the id.
    fn plan_node(&mut self, root_type: &str, field: &FieldSelection) -> Result<(), PlanningError> {
        if !field.arguments.has_argument(NODE_ID_ARGUMENT) {
            return Err(PlanningError::InvalidNodeField(format!(
                "'{}' has no '{}' argument",
                field.response_name(),
                NODE_ID_ARGUMENT
            )));
        }

        let path = SelectionPath::root().push(field.response_name());
        let node_step = self.graph.add(
            root_type,
            None,
            StepKind::Node(NodeStep {
                field: field.without_selections(),
                entity_steps: vec![],
            }),
        );
        self.cover(&path, root_type, node_step)?;

        let index = self.index;
        for type_name in index.possible_types(field.output_type.named_type()) {
            let gate = self.graph.add(
                type_name,
                Some(path.clone()),
                StepKind::NodeEntity(NodeEntityStep {
                    type_name: type_name.to_string(),
                    node_step,
                    selection_steps: vec![],
                    exports: Default::default(),
                }),
            );
            self.step_mut(gate)?.depends_on.insert(node_step);
            if let StepKind::Node(node) = &mut self.step_mut(node_step)?.kind {
                node.entity_steps.push(gate);
            }

            let fields = field.selections.collect_fields(&|condition: &str| {
                index.type_condition_applies(condition, type_name)
            });
            let frame = Frame {
                provider: Provider::NodeEntity { id: gate },
                path: path.clone(),
                type_name: type_name.to_string(),
            };
            self.plan_fields(&frame, fields)?;
        }

        Ok(())
    }

    fn bind_variables(&mut self) -> Result<(), PlanningError> {
        for step in &mut self.graph.steps {
            let usages = match &step.kind {
                StepKind::Selection(selection) | StepKind::Requirement(selection) => {
                    selection.selections.variable_usages()
                }
                StepKind::Node(node) => node.field.variable_usages(),
                _ => continue,
            };

            for name in usages {
                let definition = self
                    .operation
                    .variable_definition(&name)
                    .ok_or_else(|| PlanningError::UnknownVariable(name.clone()))?;

                if let Some(selection) = step.selection_mut() {
                    selection.variables.insert(
                        name.clone(),
                        VariableKey::Operation { name: name.clone() },
                    );
                    selection
                        .argument_types
                        .insert(name, definition.type_ref.clone());
                }
            }
        }

        Ok(())
    }

    /// Every field of the operation, per concrete parent type, must be resolved by a step.
    fn check_coverage(
        &self,
        selections: &SelectionSet,
        type_name: &str,
        path: &SelectionPath,
    ) -> Result<(), PlanningError> {
        let index = self.index;

        for concrete_type in index.possible_types(type_name) {
            let fields = selections.collect_fields(&|condition: &str| {
                index.type_condition_applies(condition, concrete_type)
            });

            for field in fields {
                let field_path = path.push(field.response_name());
                let key = (field_path.clone(), concrete_type.to_string());
                if !self.coverage.contains_key(&key) {
                    return Err(PlanningError::UncoveredSelection {
                        path: field_path,
                        type_name: concrete_type.to_string(),
                    });
                }

                if field.is_leaf() || (path.is_empty() && is_introspection_field(&field)) {
                    continue;
                }

                self.check_coverage(
                    &field.selections,
                    field.output_type.named_type(),
                    &field_path,
                )?;
            }
        }

        Ok(())
    }

    fn cover(
        &mut self,
        path: &SelectionPath,
        type_name: &str,
        step_id: StepId,
    ) -> Result<(), PlanningError> {
        match self.coverage.entry((path.clone(), type_name.to_string())) {
            Entry::Occupied(entry) if *entry.get() != step_id => {
                return Err(PlanningError::DoubleResolution {
                    path: path.clone(),
                    type_name: type_name.to_string(),
                    first: *entry.get(),
                    second: step_id,
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(step_id);
            }
        }

        self.step_mut(step_id)?
            .subsumed
            .insert((path.clone(), type_name.to_string()));

        Ok(())
    }

    fn select_owner(
        &self,
        type_name: &str,
        field_name: &str,
        parent_subgraph: Option<&str>,
    ) -> Result<FieldOwner, PlanningError> {
        let unservable = || PlanningError::UnservableField {
            type_name: type_name.to_string(),
            field: field_name.to_string(),
        };

        let ownership = self
            .index
            .field(type_name, field_name)
            .filter(|ownership| !ownership.owners.is_empty())
            .ok_or_else(unservable)?;

        self.policy
            .select(&SelectionContext {
                type_name,
                field_name,
                parent_subgraph,
                candidates: &ownership.owners,
            })
            .cloned()
            .ok_or_else(unservable)
    }

    fn select_root_owner(
        &self,
        root_type: &str,
        field: &FieldSelection,
    ) -> Result<FieldOwner, PlanningError> {
        let owner = self.select_owner(root_type, &field.name, None)?;

        match owner.requires.first() {
            Some(required) => Err(PlanningError::UnresolvableRequirement {
                type_name: root_type.to_string(),
                field: required.clone(),
                at: SelectionPath::root(),
            }),
            None => Ok(owner),
        }
    }

    fn ensure_typename(&mut self, frame: &Frame) -> Result<(), PlanningError> {
        if let Provider::Step { id, cursor, .. } = &frame.provider {
            self.selection_at(*id, cursor)?.ensure_typename();
        }
        Ok(())
    }

    fn step_mut(&mut self, step_id: StepId) -> Result<&mut Step, PlanningError> {
        self.graph
            .get_mut(step_id)
            .ok_or(PlanningError::MissingStep(step_id))
    }

    fn selection_step_mut(&mut self, step_id: StepId) -> Result<&mut SelectionStep, PlanningError> {
        self.graph
            .get_mut(step_id)
            .and_then(Step::selection_mut)
            .ok_or(PlanningError::MissingStep(step_id))
    }

    fn selection_at(
        &mut self,
        step_id: StepId,
        cursor: &[Cursor],
    ) -> Result<&mut SelectionSet, PlanningError> {
        let mut current = &mut self.selection_step_mut(step_id)?.selections;

        for segment in cursor {
            current = match segment {
                Cursor::Field(response_name) => {
                    &mut current
                        .field_mut(response_name)
                        .ok_or_else(|| {
                            PlanningError::Internal(format!(
                                "step {} has no field '{}' at the planned position",
                                step_id, response_name
                            ))
                        })?
                        .selections
                }
                Cursor::Fragment(type_condition) => current.fragment_mut(type_condition),
            };
        }

        Ok(current)
    }
}

fn is_introspection_field(field: &FieldSelection) -> bool {
    INTROSPECTION_FIELDS.contains(&field.name.as_str())
}

fn exported_field(field_name: &str) -> FieldSelection {
    FieldSelection::new(field_name, TypeRef::named(ANY_SCALAR)).with_alias(export_alias(field_name))
}
