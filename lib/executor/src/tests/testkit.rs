use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Once},
    time::Duration,
};

use async_trait::async_trait;
use conductor_config::RouterConfig;
use conductor_query_planner::{
    ast::{
        operation::{Operation, OperationKind},
        selection_item::SelectionItem,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
        type_ref::TypeRef,
        value::Value as AstValue,
    },
    ownership::OwnershipIndex,
};
use lazy_static::lazy_static;
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
    },
    gateway::Gateway,
    response::{
        graphql_error::GraphQLError, response::GraphQLResponse,
        subgraph_response::SubgraphResponse,
    },
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

pub fn variables(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
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

/// `{ product(id:"1") { name reviews { text author { name } } } }`, with `reviews`
/// typed as given.
pub fn product_reviews_authors(reviews_type: &str) -> Operation {
    query(vec![field("product", "Product")
        .with_argument("id", AstValue::string("1"))
        .with_selections(vec![
            field("name", "String!").into(),
            field("reviews", reviews_type)
                .with_selections(vec![
                    field("text", "String").into(),
                    field("author", "User!")
                        .with_selections(vec![field("name", "String").into()])
                        .into(),
                ])
                .into(),
        ])
        .into()])
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub subgraph: String,
    pub query: String,
    pub variables: Option<Map<String, Value>>,
}

impl RecordedCall {
    pub fn representations(&self) -> Vec<Value> {
        self.variables
            .as_ref()
            .and_then(|variables| variables.get("representations"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Every sub-request made during a test, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    fn record(&self, call: RecordedCall) {
        self.0.lock().expect("call log lock").push(call);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().expect("call log lock").clone()
    }

    pub fn subgraphs(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.subgraph).collect()
    }

    pub fn calls_to(&self, subgraph: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.subgraph == subgraph)
            .collect()
    }
}

type Responder =
    Box<dyn Fn(&RecordedCall) -> Result<SubgraphResponse, SubgraphExecutorError> + Send + Sync>;

/// In-process subgraph answering every request with `responder`.
pub struct MockSubgraph {
    name: String,
    responder: Responder,
    delay: Option<Duration>,
    log: CallLog,
}

impl MockSubgraph {
    pub fn new<F>(name: &str, responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<SubgraphResponse, SubgraphExecutorError>
            + Send
            + Sync
            + 'static,
    {
        MockSubgraph {
            name: name.to_string(),
            responder: Box::new(responder),
            delay: None,
            log: CallLog::default(),
        }
    }

    /// Always answers with `data`.
    pub fn data(name: &str, data: Value) -> Self {
        MockSubgraph::new(name, move |_| Ok(SubgraphResponse::from_data(data.clone())))
    }

    /// Answers entity lookups by mapping each representation with `resolve`.
    pub fn entities<F>(name: &str, resolve: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        MockSubgraph::new(name, move |call| {
            let entities: Vec<Value> = call.representations().iter().map(&resolve).collect();
            Ok(SubgraphResponse::from_data(json!({ "_entities": entities })))
        })
    }

    pub fn failing(name: &str) -> Self {
        let subgraph_name = name.to_string();
        MockSubgraph::new(name, move |_| {
            Err(SubgraphExecutorError::RequestFailure(
                subgraph_name.clone(),
                "connection refused".to_string(),
            ))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SubgraphExecutor for MockSubgraph {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let call = RecordedCall {
            subgraph: execution_request.subgraph_name.to_string(),
            query: execution_request.query.to_string(),
            variables: execution_request.variables.clone(),
        };
        self.log.record(call.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(&call)
    }
}

pub fn error_at(message: &str, path: Value) -> GraphQLError {
    serde_json::from_value(json!({ "message": message, "path": path })).expect("valid error")
}

/// Error paths in dotted form, `""` for errors without a path.
pub fn error_paths(response: &GraphQLResponse) -> Vec<String> {
    response
        .errors
        .iter()
        .map(|error| error.path.as_ref().map(ToString::to_string).unwrap_or_default())
        .collect()
}

pub fn error_codes(response: &GraphQLResponse) -> Vec<&str> {
    response
        .errors
        .iter()
        .map(|error| error.code().unwrap_or_default())
        .collect()
}

pub struct TestGateway {
    pub gateway: Gateway,
    pub log: CallLog,
}

pub fn gateway(subgraphs: Vec<MockSubgraph>) -> TestGateway {
    gateway_with_config(&RouterConfig::default(), subgraphs)
}

pub fn gateway_with_config(config: &RouterConfig, subgraphs: Vec<MockSubgraph>) -> TestGateway {
    init_logger();
    let log = CallLog::default();

    let executors: HashMap<String, SubgraphExecutorBoxedArc> = subgraphs
        .into_iter()
        .map(|mut subgraph| {
            subgraph.log = log.clone();
            (subgraph.name.clone(), subgraph.to_boxed_arc())
        })
        .collect();

    TestGateway {
        gateway: Gateway::from_config(config, product_reviews_index(), executors),
        log,
    }
}

/// The usual happy-path subgraphs for [`product_reviews_authors`].
pub fn catalog() -> MockSubgraph {
    MockSubgraph::data(
        "catalog",
        json!({
            "product": {"name": "Chair", "__typename": "Product", "_internal_req_id": "1"}
        }),
    )
}

pub fn reviews() -> MockSubgraph {
    MockSubgraph::entities("reviews", |_| {
        json!({
            "reviews": [
                {"text": "Great", "author": {"__typename": "User", "_internal_req_id": "u1"}},
                {"text": "Meh", "author": {"__typename": "User", "_internal_req_id": "u2"}},
                {"text": "Again", "author": {"__typename": "User", "_internal_req_id": "u1"}}
            ]
        })
    })
}

pub fn accounts() -> MockSubgraph {
    MockSubgraph::entities("accounts", |representation| {
        match representation.get("id").and_then(Value::as_str) {
            Some("u1") => json!({"name": "Ada"}),
            Some("u2") => json!({"name": "Grace"}),
            _ => Value::Null,
        }
    })
}
