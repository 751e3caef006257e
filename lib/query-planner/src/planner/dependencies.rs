use petgraph::{algo::toposort, graph::DiGraph, graph::NodeIndex};
use tracing::{instrument, trace};

use crate::{
    ast::selection_path::SelectionPath,
    planner::{
        error::PlanningError,
        step::{Export, StepGraph, StepId},
    },
};

/// Links every step to the producers of the values it requires, then verifies the
/// resulting `depends_on` relation is acyclic.
#[instrument(level = "trace", skip_all)]
pub fn resolve_dependencies(graph: &mut StepGraph) -> Result<(), PlanningError> {
    let mut edges: Vec<(StepId, StepId)> = vec![];

    for step in graph.iter() {
        let Some(requires) = step.requires() else {
            continue;
        };
        let at = step.parent.clone().unwrap_or_else(SelectionPath::root);

        for key in requires {
            let export = Export {
                at: at.clone(),
                key: key.clone(),
            };

            // The narrowest producer sits closest to the root. Ties go to the earliest step.
            let producer = graph
                .iter()
                .filter(|candidate| candidate.id != step.id)
                .filter(|candidate| {
                    candidate
                        .exports()
                        .is_some_and(|exports| exports.contains(&export))
                })
                .min_by_key(|candidate| (candidate.depth(), candidate.id))
                .ok_or_else(|| PlanningError::UnresolvedRequirement {
                    step: step.id,
                    key: key.clone(),
                    at: at.clone(),
                })?;

            trace!(step = %step.id, producer = %producer.id, key = %key, "requirement linked");
            edges.push((step.id, producer.id));
        }
    }

    for (dependent, producer) in edges {
        graph
            .get_mut(dependent)
            .ok_or(PlanningError::MissingStep(dependent))?
            .depends_on
            .insert(producer);
    }

    ensure_acyclic(graph)
}

/// Fails with the step a cycle was detected on.
pub fn ensure_acyclic(graph: &StepGraph) -> Result<(), PlanningError> {
    let mut dependency_graph: DiGraph<StepId, ()> = DiGraph::with_capacity(graph.len(), 0);
    let nodes: Vec<NodeIndex> = graph
        .iter()
        .map(|step| dependency_graph.add_node(step.id))
        .collect();

    for step in graph.iter() {
        for dependency in &step.depends_on {
            let dependency_node = nodes
                .get(dependency.index())
                .ok_or(PlanningError::MissingStep(*dependency))?;
            // producer -> dependent
            dependency_graph.add_edge(*dependency_node, nodes[step.id.index()], ());
        }
    }

    toposort(&dependency_graph, None)
        .map(|_| ())
        .map_err(|cycle| PlanningError::Cycle(dependency_graph[cycle.node_id()]))
}
