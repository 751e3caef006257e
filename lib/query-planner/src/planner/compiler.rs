use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, instrument};

use crate::{
    ast::{
        operation::{Operation, OperationKind},
        selection_item::SelectionItem,
        selection_set::SelectionSet,
        value::Value,
    },
    ownership::OwnershipIndex,
    planner::{
        error::PlanningError,
        plan::{
            CompiledStep, CompiledStepKind, ExecutionPlan, FetchStep, IntrospectionResolution,
            NodeEntityGate, NodeResolution, RepresentationShape, VariableBinding,
        },
        step::{LookupKind, SelectionStep, Step, StepGraph, StepId, StepKind, VariableKey},
    },
};

const REPRESENTATIONS_VARIABLE: &str = "$representations:[_Any!]!";

/// Freezes a resolved step graph into an [`ExecutionPlan`].
#[instrument(level = "trace", skip_all)]
pub fn compile_plan(
    graph: StepGraph,
    operation: Arc<Operation>,
    schema: Arc<OwnershipIndex>,
) -> Result<ExecutionPlan, PlanningError> {
    let order = topological_order(&graph)?;

    let mut positions = vec![0usize; graph.len()];
    for (index, step_id) in order.iter().enumerate() {
        positions[step_id.index()] = index;
    }

    let mut steps: Vec<CompiledStep> = Vec::with_capacity(order.len());
    for (index, step_id) in order.iter().enumerate() {
        let step = graph
            .get(*step_id)
            .ok_or(PlanningError::MissingStep(*step_id))?;

        let mut depends_on: Vec<usize> = step
            .depends_on
            .iter()
            .map(|dependency| positions[dependency.index()])
            .collect();
        depends_on.sort_unstable();

        steps.push(CompiledStep {
            index,
            step_id: step.id,
            type_name: step.type_name.clone(),
            parent: step.parent.clone(),
            depends_on,
            dependents: vec![],
            root_selections: step.root_selections(),
            kind: compile_kind(step, &graph, &operation)?,
        });
    }

    for index in 0..steps.len() {
        for dependency in steps[index].depends_on.clone() {
            steps[dependency].dependents.push(index);
        }
    }

    let root_type_name = schema
        .root_type(operation.kind)
        .ok_or(PlanningError::MissingRootType(operation.kind))?
        .to_string();

    debug!(steps = steps.len(), "plan compiled");

    Ok(ExecutionPlan {
        operation_kind: operation.kind,
        root_type_name,
        steps,
        operation,
        schema,
    })
}

/// Kahn's algorithm. Among ready steps the lowest id goes first, so the order is deterministic.
fn topological_order(graph: &StepGraph) -> Result<Vec<StepId>, PlanningError> {
    let mut in_degrees: Vec<usize> = graph.iter().map(|step| step.depends_on.len()).collect();
    let mut dependents: Vec<Vec<StepId>> = vec![vec![]; graph.len()];
    for step in graph.iter() {
        for dependency in &step.depends_on {
            dependents
                .get_mut(dependency.index())
                .ok_or(PlanningError::MissingStep(*dependency))?
                .push(step.id);
        }
    }

    let mut ready: BTreeSet<StepId> = graph
        .iter()
        .filter(|step| step.depends_on.is_empty())
        .map(|step| step.id)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(step_id) = ready.pop_first() {
        order.push(step_id);
        for dependent in &dependents[step_id.index()] {
            let in_degree = &mut in_degrees[dependent.index()];
            *in_degree -= 1;
            if *in_degree == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() != graph.len() {
        let stuck = in_degrees
            .iter()
            .position(|in_degree| *in_degree > 0)
            .map(StepId)
            .unwrap_or(StepId(0));
        return Err(PlanningError::Cycle(stuck));
    }

    Ok(order)
}

fn compile_kind(
    step: &Step,
    graph: &StepGraph,
    operation: &Operation,
) -> Result<CompiledStepKind, PlanningError> {
    Ok(match &step.kind {
        StepKind::Selection(selection) => {
            CompiledStepKind::Fetch(compile_fetch(step, selection, false, operation)?)
        }
        StepKind::Requirement(selection) => {
            CompiledStepKind::Fetch(compile_fetch(step, selection, true, operation)?)
        }
        StepKind::Node(node) => CompiledStepKind::Node(NodeResolution {
            response_name: node.field.response_name().to_string(),
            id: node
                .field
                .arguments
                .get_argument("id")
                .cloned()
                .unwrap_or(Value::Null),
            possible_types: node
                .entity_steps
                .iter()
                .filter_map(|gate| graph.get(*gate))
                .map(|gate| gate.type_name.clone())
                .collect(),
        }),
        StepKind::NodeEntity(gate) => CompiledStepKind::NodeEntity(NodeEntityGate {
            type_name: gate.type_name.clone(),
        }),
        StepKind::Introspection(introspection) => {
            CompiledStepKind::Introspection(IntrospectionResolution {
                selections: introspection.selections.clone(),
            })
        }
    })
}

fn compile_fetch(
    step: &Step,
    selection: &SelectionStep,
    is_requirement: bool,
    operation: &Operation,
) -> Result<FetchStep, PlanningError> {
    let mut variables = Vec::with_capacity(selection.argument_types.len());
    let mut definitions = Vec::with_capacity(selection.argument_types.len());
    for (name, type_ref) in &selection.argument_types {
        let definition = operation
            .variable_definition(name)
            .ok_or_else(|| PlanningError::UnknownVariable(name.clone()))?;
        definitions.push(definition.to_string());
        variables.push(VariableBinding {
            name: name.clone(),
            type_ref: type_ref.clone(),
        });
    }

    let selections = without_empty_fragments(&selection.selections);

    let (document, representation) = match selection.lookup {
        LookupKind::Root => {
            let kind = match operation.kind {
                OperationKind::Mutation => OperationKind::Mutation,
                _ => OperationKind::Query,
            };
            let document = if definitions.is_empty() {
                format!("{}{}", kind, selections)
            } else {
                format!("{}({}){}", kind, definitions.join(","), selections)
            };
            (document, None)
        }
        LookupKind::Entity => {
            let mut all_definitions = vec![REPRESENTATIONS_VARIABLE.to_string()];
            all_definitions.extend(definitions);
            let document = format!(
                "query({}){{_entities(representations:$representations){{...on {}{}}}}}",
                all_definitions.join(","),
                step.type_name,
                selections
            );
            let representation = RepresentationShape {
                type_name: step.type_name.clone(),
                fields: selection
                    .requires
                    .iter()
                    .filter_map(|key| match key {
                        VariableKey::Export { type_name, field } if *type_name == step.type_name => {
                            Some(field.clone())
                        }
                        _ => None,
                    })
                    .collect(),
            };
            (document, Some(representation))
        }
    };

    Ok(FetchStep {
        subgraph: selection.subgraph.clone(),
        is_requirement,
        lookup: selection.lookup,
        document,
        variables,
        representation,
    })
}

/// Fragments whose every field went to other steps would render as `...on T`,
/// which is not valid in a sub-request.
fn without_empty_fragments(selections: &SelectionSet) -> SelectionSet {
    let items = selections
        .items
        .iter()
        .filter_map(|item| match item {
            SelectionItem::Field(field) => {
                let mut field = field.clone();
                field.selections = without_empty_fragments(&field.selections);
                Some(SelectionItem::Field(field))
            }
            SelectionItem::InlineFragment(fragment) => {
                let pruned = without_empty_fragments(&fragment.selections);
                if pruned.is_empty() {
                    return None;
                }
                let mut fragment = fragment.clone();
                fragment.selections = pruned;
                Some(SelectionItem::InlineFragment(fragment))
            }
        })
        .collect();

    SelectionSet::new(items)
}
