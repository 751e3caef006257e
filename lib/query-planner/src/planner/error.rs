use crate::{
    ast::{operation::OperationKind, selection_path::SelectionPath},
    planner::step::{StepId, VariableKey},
    utils::cancellation::CancellationError,
};

/// Fails the whole request before any subgraph is called.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("{0} operations are not supported")]
    UnsupportedOperation(OperationKind),
    #[error("the schema does not define a root type for {0} operations")]
    MissingRootType(OperationKind),
    #[error("no subgraph can resolve field '{type_name}.{field}'")]
    UnservableField { type_name: String, field: String },
    #[error("subgraph '{subgraph}' declares no key for entity type '{type_name}'")]
    MissingEntityKey { type_name: String, subgraph: String },
    #[error("step {step} requires '{key}' at '{at}', but no step produces it")]
    UnresolvedRequirement {
        step: StepId,
        key: VariableKey,
        at: SelectionPath,
    },
    #[error("requirement '{type_name}.{field}' at '{at}' cannot be satisfied")]
    UnresolvableRequirement {
        type_name: String,
        field: String,
        at: SelectionPath,
    },
    #[error("steps form a dependency cycle through step {0}")]
    Cycle(StepId),
    #[error("selection '{path}' on type '{type_name}' is not resolved by any step")]
    UncoveredSelection {
        path: SelectionPath,
        type_name: String,
    },
    #[error("selection '{path}' on type '{type_name}' is resolved by both step {first} and step {second}")]
    DoubleResolution {
        path: SelectionPath,
        type_name: String,
        first: StepId,
        second: StepId,
    },
    #[error("variable '${0}' is used but not declared by the operation")]
    UnknownVariable(String),
    #[error("invalid node field: {0}")]
    InvalidNodeField(String),
    #[error("step {0} does not exist")]
    MissingStep(StepId),
    #[error("internal planner error: {0}")]
    Internal(String),
    #[error("planning {0}")]
    Cancellation(#[from] CancellationError),
}
