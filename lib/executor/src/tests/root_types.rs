use std::sync::Arc;

use conductor_query_planner::ast::{
    operation::{Operation, VariableDefinition},
    selection_item::SelectionItem,
    type_ref::TypeRef,
    value::Value as AstValue,
};
use serde_json::json;

use crate::{
    execution::error::INTROSPECTION_FAILED_CODE,
    gateway::{BAD_USER_INPUT_CODE, PLANNING_FAILED_CODE},
    introspection::StaticIntrospection,
    response::subgraph_response::SubgraphResponse,
    tests::testkit::{error_codes, error_paths, field, gateway, mutation, query, MockSubgraph},
};

fn add_review(alias: &str) -> SelectionItem {
    field("addReview", "Review")
        .with_alias(alias)
        .with_argument("text", AstValue::string(alias))
        .with_selections(vec![field("id", "ID!").into()])
        .into()
}

fn review_mutation() -> Operation {
    mutation(vec![
        add_review("first"),
        add_review("second"),
        field("updatePrice", "Product")
            .with_selections(vec![field("price", "Int").into()])
            .into(),
        add_review("third"),
    ])
}

#[tokio::test]
async fn mutation_fields_run_in_order() {
    let reviews = MockSubgraph::new("reviews", |call| {
        let data = if call.query.contains("third") {
            json!({"third": {"id": "r3"}})
        } else {
            json!({"first": {"id": "r1"}, "second": {"id": "r2"}})
        };
        Ok(SubgraphResponse::from_data(data))
    });
    let catalog = MockSubgraph::data("catalog", json!({"updatePrice": {"price": 12}}));
    let test = gateway(vec![reviews, catalog]);

    let response = test.gateway.execute(&review_mutation(), None).await;

    assert_eq!(
        response.data,
        json!({
            "first": {"id": "r1"},
            "second": {"id": "r2"},
            "updatePrice": {"price": 12},
            "third": {"id": "r3"}
        })
    );
    assert_eq!(test.log.subgraphs(), vec!["reviews", "catalog", "reviews"]);
}

#[tokio::test]
async fn failed_mutation_step_skips_the_rest() {
    let test = gateway(vec![
        MockSubgraph::failing("reviews"),
        MockSubgraph::data("catalog", json!({"updatePrice": {"price": 12}})),
    ]);

    let response = test.gateway.execute(&review_mutation(), None).await;

    assert_eq!(
        response.data,
        json!({"first": null, "second": null, "updatePrice": null, "third": null})
    );
    assert_eq!(error_paths(&response), vec!["first", "second"]);
    assert_eq!(test.log.subgraphs(), vec!["reviews"]);
}

fn introspection_query() -> Operation {
    query(vec![
        field("__typename", "String!").into(),
        field("__schema", "__Schema!")
            .with_selections(vec![field("queryType", "__Type!")
                .with_selections(vec![field("name", "String").into()])
                .into()])
            .into(),
    ])
}

#[tokio::test]
async fn introspection_is_answered_locally() {
    let test = gateway(vec![]);
    let introspection = StaticIntrospection::new(json!({
        "queryType": {"name": "Query", "kind": "OBJECT"},
        "types": []
    }));
    let gateway = test
        .gateway
        .map_executor(|executor| executor.with_introspection(Arc::new(introspection)));

    let response = gateway.execute(&introspection_query(), None).await;

    assert_eq!(
        response.data,
        json!({"__typename": "Query", "__schema": {"queryType": {"name": "Query"}}})
    );
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn introspection_without_a_resolver_is_a_field_error() {
    let test = gateway(vec![]);

    let response = test.gateway.execute(&introspection_query(), None).await;

    // `__schema` is non-null, so the whole response is nulled
    assert_eq!(response.data, json!(null));
    assert_eq!(error_paths(&response), vec!["__schema"]);
    assert_eq!(error_codes(&response), vec![INTROSPECTION_FAILED_CODE]);
}

#[tokio::test]
async fn unplannable_operations_fail_before_any_fetch() {
    let test = gateway(vec![MockSubgraph::data("catalog", json!({}))]);
    let operation = query(vec![field("product", "Product")
        .with_selections(vec![field("color", "String").into()])
        .into()]);

    let response = test.gateway.execute(&operation, None).await;

    assert_eq!(response.data, json!(null));
    assert_eq!(error_codes(&response), vec![PLANNING_FAILED_CODE]);
    assert!(test.log.calls().is_empty());
}

#[tokio::test]
async fn missing_required_variables_are_rejected() {
    let test = gateway(vec![MockSubgraph::data("catalog", json!({}))]);
    let operation = query(vec![field("product", "Product")
        .with_argument("id", AstValue::variable("pid"))
        .with_selections(vec![field("name", "String!").into()])
        .into()])
    .with_variable(VariableDefinition::new(
        "pid",
        TypeRef::non_null(TypeRef::named("ID")),
    ));

    let response = test.gateway.execute(&operation, None).await;

    assert_eq!(response.data, json!(null));
    assert_eq!(error_codes(&response), vec![BAD_USER_INPUT_CODE]);
    assert_eq!(
        response.errors[0].message,
        r#"Variable "$pid" of non-null type "ID!" was not provided"#
    );
    assert!(test.log.calls().is_empty());
}
