use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Once,
};

use lazy_static::lazy_static;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    ast::{
        operation::{Operation, OperationKind},
        selection_item::SelectionItem,
        selection_path::SelectionPath,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
        type_ref::TypeRef,
    },
    ownership::{policy::PreferParentSubgraph, OwnershipIndex},
    planner::{
        builder::build_steps, error::PlanningError, plan::ExecutionPlan, step::StepId, Planner,
    },
    utils::cancellation::CancellationToken,
};

fn init_test_logger_internal() {
    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_bracketed_fields(true)
        .with_deferred_spans(false)
        .with_wraparound(25)
        .with_indent_lines(true)
        .with_timer(tracing_tree::time::Uptime::default())
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_targets(false);

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(EnvFilter::from_default_env())
        .init();
}

lazy_static! {
    static ref TRACING_INIT: Once = Once::new();
}

pub fn init_logger() {
    TRACING_INIT.call_once(|| {
        init_test_logger_internal();
    });
}

pub fn field(name: &str, output_type: &str) -> FieldSelection {
    let output_type: TypeRef = output_type.parse().expect("valid output type");
    FieldSelection::new(name, output_type)
}

pub fn on(type_condition: &str, items: Vec<SelectionItem>) -> SelectionItem {
    InlineFragmentSelection::new(type_condition, items).into()
}

pub fn query(items: Vec<SelectionItem>) -> Operation {
    Operation::query(SelectionSet::new(items))
}

pub fn mutation(items: Vec<SelectionItem>) -> Operation {
    Operation::new(OperationKind::Mutation, SelectionSet::new(items))
}

/// Catalog, reviews, accounts, inventory and logistics subgraphs.
///
/// - `Product` is an entity of catalog, reviews, inventory and logistics, keyed by `id`.
/// - `User` is an entity of accounts, reviews and catalog, keyed by `id`.
/// - `Product.shippingEstimate` lives in inventory and requires `price` and `weight`.
/// - `Product.deliveryWindow` lives in inventory and requires `dimensions`, which only logistics knows.
pub fn product_reviews_index() -> OwnershipIndex {
    OwnershipIndex::builder()
        .mutation_type("Mutation")
        .subscription_type("Subscription")
        .node_interface("Node")
        .object("Query")
        .fields("Query", "catalog", &["product", "products", "search"])
        .fields("Query", "accounts", &["me"])
        .object("Mutation")
        .fields("Mutation", "reviews", &["addReview"])
        .fields("Mutation", "catalog", &["updatePrice"])
        .object("Subscription")
        .fields("Subscription", "reviews", &["reviewAdded"])
        .interface("Node", &["Product", "User"])
        .union("SearchResult", &["Product", "User"])
        .object("Product")
        .key("Product", "catalog", &["id"])
        .key("Product", "reviews", &["id"])
        .key("Product", "inventory", &["id"])
        .key("Product", "logistics", &["id"])
        .fields("Product", "catalog", &["id", "name", "price", "weight"])
        .fields("Product", "reviews", &["id", "reviews"])
        .fields("Product", "inventory", &["id", "inStock"])
        .fields("Product", "logistics", &["id", "dimensions"])
        .field_requiring("Product", "shippingEstimate", "inventory", &["price", "weight"])
        .field_requiring("Product", "deliveryWindow", "inventory", &["dimensions"])
        .object("Review")
        .fields("Review", "reviews", &["id", "text", "rating", "author", "product"])
        .object("User")
        .key("User", "accounts", &["id"])
        .key("User", "reviews", &["id"])
        .key("User", "catalog", &["id"])
        .fields("User", "accounts", &["id", "name"])
        .fields("User", "reviews", &["id", "reviews"])
        .fields("User", "catalog", &["id"])
        .build()
}

pub fn build_plan(index: OwnershipIndex, operation: &Operation) -> Result<ExecutionPlan, PlanningError> {
    let planner = Planner::new(index);
    planner
        .plan(operation)
        .map(|plan| plan.as_ref().clone())
}

/// Asserts that every field of `operation`, per concrete parent type, is resolved by
/// exactly one step, and that no step resolves a location the operation does not select.
pub fn assert_covered_once(index: &OwnershipIndex, operation: &Operation) {
    let graph = build_steps(
        index,
        &PreferParentSubgraph,
        operation,
        &CancellationToken::new(),
    )
    .expect("operation plans");
    let root_type = index.root_type(operation.kind).expect("root type");

    let mut selected = BTreeSet::new();
    collect_locations(
        index,
        &operation.selection_set,
        root_type,
        &SelectionPath::root(),
        &mut selected,
    );

    let mut resolved: BTreeMap<(SelectionPath, String), Vec<StepId>> = BTreeMap::new();
    for step in graph.iter() {
        for location in &step.subsumed {
            resolved.entry(location.clone()).or_default().push(step.id);
        }
    }

    for location in &selected {
        let steps = resolved.get(location).cloned().unwrap_or_default();
        assert_eq!(
            steps.len(),
            1,
            "'{}' on {} is resolved by steps {:?}",
            location.0,
            location.1,
            steps
        );
    }

    let unselected: Vec<_> = resolved
        .keys()
        .filter(|location| !selected.contains(*location))
        .collect();
    assert!(
        unselected.is_empty(),
        "steps resolve locations outside the operation: {:?}",
        unselected
    );
}

fn collect_locations(
    index: &OwnershipIndex,
    selections: &SelectionSet,
    type_name: &str,
    path: &SelectionPath,
    locations: &mut BTreeSet<(SelectionPath, String)>,
) {
    for concrete_type in index.possible_types(type_name) {
        let fields = selections.collect_fields(&|condition: &str| {
            index.type_condition_applies(condition, concrete_type)
        });

        for field in fields {
            let field_path = path.push(field.response_name());
            locations.insert((field_path.clone(), concrete_type.to_string()));

            // introspection answers its whole subtree
            let introspection = path.is_empty() && field.name.starts_with("__");
            if !field.is_leaf() && !introspection {
                collect_locations(
                    index,
                    &field.selections,
                    field.output_type.named_type(),
                    &field_path,
                    locations,
                );
            }
        }
    }
}
