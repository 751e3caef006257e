use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use conductor_query_planner::{
    ast::selection_path::SelectionPath,
    planner::{
        plan::{
            CompiledStep, CompiledStepKind, ExecutionPlan, FetchStep, IntrospectionResolution,
            NodeResolution,
        },
        step::export_alias,
    },
    utils::cancellation::CancellationToken,
};
use futures::{
    future::{self, BoxFuture},
    stream::FuturesUnordered,
    FutureExt, StreamExt,
};
use serde_json::{Map, Value};
use tracing::{debug, debug_span, instrument, trace, warn, Instrument};

use crate::{
    context::ExecutionContext,
    execution::{
        error::ExecutionError,
        listener::{ExecutionListener, NoopExecutionListener},
        representations::{matching_objects, EntityBatch},
        state::StepState,
    },
    executors::{
        common::SubgraphExecutionRequest, error::SubgraphExecutorError, map::SubgraphExecutorMap,
    },
    introspection::{IntrospectionError, IntrospectionResolver},
    node::{NodeId, NodeIdParser, TypeNamePrefixedIdParser},
    response::{
        error_normalization::{normalize_entity_errors, normalize_root_errors},
        graphql_error::{GraphQLError, GraphQLErrorPath},
        merge::deep_merge,
        response::GraphQLResponse,
        subgraph_response::SubgraphResponse,
    },
    utils::traverse::{set_value_at, value_at, value_at_mut},
    variables::value_to_json,
};

const REPRESENTATIONS_VARIABLE: &str = "representations";
const TYPENAME_FIELD: &str = "__typename";
const NODE_ID_FIELD: &str = "id";

/// Runs compiled plans against the configured subgraphs.
///
/// A step is dispatched as soon as all of its dependencies completed; independent
/// steps run concurrently. A failed step never aborts the request: its fields become
/// `null`, errors are recorded, and the steps depending on it are skipped.
pub struct QueryPlanExecutor {
    executors: Arc<SubgraphExecutorMap>,
    introspection: Option<Arc<dyn IntrospectionResolver>>,
    node_id_parser: Arc<dyn NodeIdParser>,
    listener: Arc<dyn ExecutionListener>,
}

impl QueryPlanExecutor {
    pub fn new(executors: Arc<SubgraphExecutorMap>) -> Self {
        QueryPlanExecutor {
            executors,
            introspection: None,
            node_id_parser: Arc::new(TypeNamePrefixedIdParser),
            listener: Arc::new(NoopExecutionListener),
        }
    }

    pub fn with_introspection(mut self, introspection: Arc<dyn IntrospectionResolver>) -> Self {
        self.introspection = Some(introspection);
        self
    }

    pub fn with_node_id_parser(mut self, node_id_parser: Arc<dyn NodeIdParser>) -> Self {
        self.node_id_parser = node_id_parser;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn executors(&self) -> &Arc<SubgraphExecutorMap> {
        &self.executors
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(operation_kind = %plan.operation_kind, steps = plan.len())
    )]
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        variables: &Map<String, Value>,
        cancellation: &CancellationToken,
    ) -> GraphQLResponse {
        let mut ctx = ExecutionContext::new(plan);
        let coordinator = Coordinator {
            executor: self,
            plan,
            variables,
            cancellation,
        };
        coordinator.run(&mut ctx).await;

        if !ctx.errors.is_empty() {
            debug!(errors = ctx.errors.len(), "execution finished with errors");
        }

        ctx.finish()
    }
}

struct StepOutcome {
    index: usize,
    elapsed: Duration,
    result: StepResult,
}

enum StepResult {
    Fetch {
        response: Result<SubgraphResponse, SubgraphExecutorError>,
        batch: Option<EntityBatch>,
    },
    /// Entity lookup with nothing to look up; no sub-request was made.
    EmptyBatch(EntityBatch),
    Node(Value),
    Gate,
    Introspection(Vec<(String, Result<Value, IntrospectionError>)>),
}

type StepJobs<'exec> = FuturesUnordered<BoxFuture<'exec, StepOutcome>>;

struct Coordinator<'exec> {
    executor: &'exec QueryPlanExecutor,
    plan: &'exec ExecutionPlan,
    variables: &'exec Map<String, Value>,
    cancellation: &'exec CancellationToken,
}

impl<'exec> Coordinator<'exec> {
    async fn run(&self, ctx: &mut ExecutionContext<'exec>) {
        let mut jobs: StepJobs<'exec> = FuturesUnordered::new();

        for step in &self.plan.steps {
            if !step.depends_on.is_empty() {
                continue;
            }
            if self.cancellation.is_cancelled() {
                self.skip(ctx, step.index, true);
                self.release_dependents(ctx, step.index, &mut jobs);
            } else {
                ctx.states[step.index] = StepState::Ready;
                self.start(ctx, step.index, &mut jobs);
            }
        }

        while let Some(outcome) = jobs.next().await {
            let index = outcome.index;
            let elapsed = outcome.elapsed;
            let state = self.apply(ctx, outcome);
            ctx.states[index] = state;

            let step = &self.plan.steps[index];
            debug!(step = index, label = %step.label(), %state, ?elapsed, "step finished");
            self.executor.listener.on_step_finished(step, state, elapsed);

            self.release_dependents(ctx, index, &mut jobs);
        }
    }

    /// Counts down the dependents of a finished step and schedules the ones that
    /// became ready. Skipping cascades through the whole dependent subgraph.
    fn release_dependents(
        &self,
        ctx: &mut ExecutionContext<'exec>,
        finished: usize,
        jobs: &mut StepJobs<'exec>,
    ) {
        let mut finished_steps = vec![finished];

        while let Some(index) = finished_steps.pop() {
            for dependent in &self.plan.steps[index].dependents {
                let dependent = *dependent;
                ctx.outstanding[dependent] = ctx.outstanding[dependent].saturating_sub(1);
                if ctx.outstanding[dependent] > 0 || ctx.state(dependent) != StepState::Pending {
                    continue;
                }

                if ctx.has_blocked_dependency(dependent) {
                    self.skip(ctx, dependent, false);
                    finished_steps.push(dependent);
                } else if self.cancellation.is_cancelled() {
                    self.skip(ctx, dependent, true);
                    finished_steps.push(dependent);
                } else {
                    ctx.states[dependent] = StepState::Ready;
                    self.start(ctx, dependent, jobs);
                }
            }
        }
    }

    fn start(&self, ctx: &mut ExecutionContext<'exec>, index: usize, jobs: &mut StepJobs<'exec>) {
        let plan: &'exec ExecutionPlan = self.plan;
        let step = &plan.steps[index];

        ctx.states[index] = StepState::Running;
        self.executor.listener.on_step_started(step);
        trace!(step = index, label = %step.label(), "starting step");

        let started = Instant::now();
        let job = match &step.kind {
            CompiledStepKind::Fetch(fetch) => self.fetch(ctx, step, fetch, started),
            CompiledStepKind::Node(node) => {
                ready(index, started, StepResult::Node(self.resolve_node(node)))
            }
            CompiledStepKind::NodeEntity(_) => ready(index, started, StepResult::Gate),
            CompiledStepKind::Introspection(introspection) => ready(
                index,
                started,
                StepResult::Introspection(self.resolve_introspection(introspection)),
            ),
        };

        jobs.push(job);
    }

    fn fetch(
        &self,
        ctx: &ExecutionContext<'exec>,
        step: &'exec CompiledStep,
        fetch: &'exec FetchStep,
        started: Instant,
    ) -> BoxFuture<'exec, StepOutcome> {
        let index = step.index;

        let batch = match &fetch.representation {
            Some(shape) => {
                let parent = step.parent.clone().unwrap_or_default();
                let batch = EntityBatch::collect(&ctx.data, &parent, shape);
                if batch.is_empty() {
                    trace!(step = index, "no entities to resolve, skipping sub-request");
                    return ready(index, started, StepResult::EmptyBatch(batch));
                }
                Some(batch)
            }
            None => None,
        };

        let mut request = SubgraphExecutionRequest {
            subgraph_name: &fetch.subgraph,
            query: &fetch.document,
            variables: self.forwarded_variables(fetch),
            cancellation: self.cancellation.clone(),
        };
        if let Some(batch) = &batch {
            request.add_variable(
                REPRESENTATIONS_VARIABLE,
                Value::Array(batch.representations.clone()),
            );
        }

        let executor: &'exec QueryPlanExecutor = self.executor;
        let executors = executor.executors.as_ref();
        let span = debug_span!(
            "subgraph_fetch",
            subgraph = %fetch.subgraph,
            step = index,
            entities = batch.as_ref().map_or(0, EntityBatch::len)
        );

        async move {
            let response = executors.execute(request).await;
            StepOutcome {
                index,
                elapsed: started.elapsed(),
                result: StepResult::Fetch { response, batch },
            }
        }
        .instrument(span)
        .boxed()
    }

    fn forwarded_variables(&self, fetch: &FetchStep) -> Option<Map<String, Value>> {
        let forwarded: Map<String, Value> = fetch
            .variables
            .iter()
            .filter_map(|binding| {
                self.variables
                    .get(&binding.name)
                    .map(|value| (binding.name.clone(), value.clone()))
            })
            .collect();

        (!forwarded.is_empty()).then_some(forwarded)
    }

    fn resolve_node(&self, node: &NodeResolution) -> Value {
        let id = value_to_json(&node.id, self.variables);
        let Some(id) = id.as_str() else {
            debug!(field = %node.response_name, "node id is not a string");
            return Value::Null;
        };

        match self.executor.node_id_parser.parse(id) {
            Some(NodeId { type_name, key })
                if node.possible_types.iter().any(|possible| possible == type_name) =>
            {
                let mut object = Map::with_capacity(2);
                object.insert(TYPENAME_FIELD.to_string(), Value::from(type_name));
                object.insert(export_alias(NODE_ID_FIELD), Value::from(key));
                Value::Object(object)
            }
            _ => {
                debug!(id, "node id does not name a resolvable type");
                Value::Null
            }
        }
    }

    fn resolve_introspection(
        &self,
        introspection: &IntrospectionResolution,
    ) -> Vec<(String, Result<Value, IntrospectionError>)> {
        introspection
            .selections
            .collect_fields(&|_: &str| true)
            .into_iter()
            // root `__typename` is answered during projection
            .filter(|field| !field.is_typename())
            .map(|field| {
                let result = match &self.executor.introspection {
                    Some(resolver) => resolver.resolve(&field, self.variables),
                    None => Err(IntrospectionError::Disabled),
                };
                (field.response_name().to_string(), result)
            })
            .collect()
    }

    fn apply(&self, ctx: &mut ExecutionContext<'exec>, outcome: StepOutcome) -> StepState {
        let step = &self.plan.steps[outcome.index];

        match outcome.result {
            StepResult::Fetch { response, batch } => {
                let subgraph = step.subgraph().unwrap_or_default();
                match batch {
                    Some(batch) => {
                        self.null_keyless_objects(ctx, step, subgraph, &batch);
                        self.apply_entity_fetch(ctx, step, subgraph, response, batch)
                    }
                    None => self.apply_root_fetch(ctx, step, subgraph, response),
                }
            }
            StepResult::EmptyBatch(batch) => {
                let subgraph = step.subgraph().unwrap_or_default();
                self.null_keyless_objects(ctx, step, subgraph, &batch);
                StepState::Completed
            }
            StepResult::Gate => StepState::Completed,
            StepResult::Node(value) => {
                let node_path = GraphQLErrorPath::default().concat_str(match &step.kind {
                    CompiledStepKind::Node(node) => node.response_name.as_str(),
                    _ => "node",
                });
                if value.is_null() {
                    ctx.nulled_locations.push(node_path.clone());
                }
                set_value_at(&mut ctx.data, &node_path, value);
                StepState::Completed
            }
            StepResult::Introspection(results) => {
                for (response_name, result) in results {
                    let path = GraphQLErrorPath::default().concat_str(response_name);
                    match result {
                        Ok(value) => {
                            set_value_at(&mut ctx.data, &path, value);
                        }
                        Err(e) => {
                            warn!(error = %e, "introspection failed");
                            set_value_at(&mut ctx.data, &path, Value::Null);
                            ctx.errors.push(
                                ExecutionError::from(e)
                                    .to_graphql_error(None)
                                    .with_path(path.clone()),
                            );
                            ctx.nulled_locations.push(path);
                        }
                    }
                }
                StepState::Completed
            }
        }
    }

    fn apply_root_fetch(
        &self,
        ctx: &mut ExecutionContext<'exec>,
        step: &CompiledStep,
        subgraph: &str,
        response: Result<SubgraphResponse, SubgraphExecutorError>,
    ) -> StepState {
        let root = [GraphQLErrorPath::default()];

        let mut response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(subgraph, error = %e, "sub-request failed");
                let error = ExecutionError::from(e).to_graphql_error(Some(subgraph));
                self.null_step_fields(ctx, step, &root, Some(error));
                return StepState::Failed;
            }
        };

        let root_selections: Vec<GraphQLErrorPath> = step
            .root_selections
            .iter()
            .map(GraphQLErrorPath::from)
            .collect();
        let errors = normalize_root_errors(subgraph, &root_selections, response.take_errors());
        let reported_errors = !errors.is_empty();

        if response.data.is_object() {
            deep_merge(&mut ctx.data, response.data);
            track_nulled_error_paths(ctx, &errors);
            ctx.errors.extend(errors);
            return StepState::Completed;
        }

        ctx.errors.extend(errors);
        let error = (!reported_errors).then(|| {
            ExecutionError::MissingData(subgraph.to_string()).to_graphql_error(Some(subgraph))
        });
        self.null_step_fields(ctx, step, &root, error);
        StepState::Failed
    }

    fn apply_entity_fetch(
        &self,
        ctx: &mut ExecutionContext<'exec>,
        step: &CompiledStep,
        subgraph: &str,
        response: Result<SubgraphResponse, SubgraphExecutorError>,
        batch: EntityBatch,
    ) -> StepState {
        let locations: Vec<GraphQLErrorPath> = batch.all_locations().cloned().collect();

        let mut response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(subgraph, error = %e, "entity sub-request failed");
                let error = ExecutionError::from(e).to_graphql_error(Some(subgraph));
                self.null_step_fields(ctx, step, &locations, Some(error));
                return StepState::Failed;
            }
        };

        let errors = normalize_entity_errors(subgraph, &batch.locations, response.take_errors());
        let reported_errors = !errors.is_empty();

        match response.take_entities() {
            Some(entities) if entities.len() == batch.len() => {
                for (entity, entity_locations) in entities.into_iter().zip(batch.locations) {
                    for location in entity_locations {
                        merge_entity(ctx, &location, entity.clone());
                    }
                }
                track_nulled_error_paths(ctx, &errors);
                ctx.errors.extend(errors);
                StepState::Completed
            }
            Some(entities) => {
                warn!(
                    subgraph,
                    expected = batch.len(),
                    received = entities.len(),
                    "entity count does not match the representations sent"
                );
                let error = ExecutionError::EntityCountMismatch {
                    subgraph: subgraph.to_string(),
                    expected: batch.len(),
                    received: entities.len(),
                }
                .to_graphql_error(Some(subgraph));
                ctx.errors.extend(errors);
                ctx.errors.extend(
                    locations
                        .iter()
                        .map(|location| error.clone().with_path(location.clone())),
                );
                self.null_step_fields(ctx, step, &locations, None);
                StepState::Failed
            }
            None => {
                ctx.errors.extend(errors);
                let error = (!reported_errors).then(|| {
                    ExecutionError::MissingData(subgraph.to_string())
                        .to_graphql_error(Some(subgraph))
                });
                self.null_step_fields(ctx, step, &locations, error);
                StepState::Failed
            }
        }
    }

    /// Marks a step skipped and nulls its fields. Steps skipped by cancellation report
    /// it at each nulled field; steps behind a failed dependency stay silent.
    fn skip(&self, ctx: &mut ExecutionContext<'exec>, index: usize, cancelled: bool) {
        let step = &self.plan.steps[index];
        ctx.states[index] = StepState::Skipped;
        debug!(step = index, label = %step.label(), cancelled, "skipping step");
        self.executor.listener.on_step_skipped(step);

        let locations: Vec<GraphQLErrorPath> = match &step.parent {
            Some(parent) => matching_objects(&ctx.data, parent, &step.type_name)
                .into_iter()
                .map(|(location, _)| location)
                .collect(),
            None => vec![GraphQLErrorPath::default()],
        };
        let error = cancelled.then(|| {
            ExecutionError::from(SubgraphExecutorError::RequestCancelled)
                .to_graphql_error(step.subgraph())
        });
        self.null_step_fields(ctx, step, &locations, error);
    }

    /// Entity objects without their key fields were never sent; their fields are
    /// nulled with an error saying why.
    fn null_keyless_objects(
        &self,
        ctx: &mut ExecutionContext<'exec>,
        step: &CompiledStep,
        subgraph: &str,
        batch: &EntityBatch,
    ) {
        if batch.keyless.is_empty() {
            return;
        }

        warn!(
            subgraph,
            type_name = %step.type_name,
            objects = batch.keyless.len(),
            "entities without key fields cannot be resolved"
        );
        let error = ExecutionError::MissingKeyFields {
            subgraph: subgraph.to_string(),
            type_name: step.type_name.clone(),
        }
        .to_graphql_error(Some(subgraph));
        self.null_step_fields(ctx, step, &batch.keyless, Some(error));
    }

    /// Writes `null` for every field the step was responsible for, under each of
    /// `locations`, and records `error` there. Steps without client-visible fields
    /// report the error at the location itself.
    fn null_step_fields(
        &self,
        ctx: &mut ExecutionContext<'exec>,
        step: &CompiledStep,
        locations: &[GraphQLErrorPath],
        error: Option<GraphQLError>,
    ) {
        let parent_len = step.parent.as_ref().map_or(0, SelectionPath::len);

        for location in locations {
            if step.root_selections.is_empty() {
                if let Some(error) = &error {
                    ctx.errors.push(error.clone().with_path(location.clone()));
                }
                continue;
            }

            for root_selection in &step.root_selections {
                let path = root_selection
                    .segments()
                    .get(parent_len..)
                    .unwrap_or_default()
                    .iter()
                    .fold(location.clone(), |path, segment| {
                        path.concat_str(segment.as_str())
                    });

                set_value_at(&mut ctx.data, &path, Value::Null);
                if let Some(error) = &error {
                    ctx.errors.push(error.clone().with_path(path.clone()));
                }
                ctx.nulled_locations.push(path);
            }
        }
    }
}

/// A reported error pointing at a `null` marks a failed location, so a non-null
/// field there bubbles like any other failure.
fn track_nulled_error_paths(ctx: &mut ExecutionContext<'_>, errors: &[GraphQLError]) {
    for path in errors.iter().filter_map(|error| error.path.as_ref()) {
        if matches!(value_at(&ctx.data, path), Some(Value::Null)) {
            ctx.nulled_locations.push(path.clone());
        }
    }
}

fn merge_entity(ctx: &mut ExecutionContext<'_>, location: &GraphQLErrorPath, entity: Value) {
    if entity.is_null() {
        set_value_at(&mut ctx.data, location, Value::Null);
        ctx.nulled_locations.push(location.clone());
        return;
    }

    if let Some(target) = value_at_mut(&mut ctx.data, location) {
        deep_merge(target, entity);
    }
}

fn ready<'exec>(index: usize, started: Instant, result: StepResult) -> BoxFuture<'exec, StepOutcome> {
    future::ready(StepOutcome {
        index,
        elapsed: started.elapsed(),
        result,
    })
    .boxed()
}
