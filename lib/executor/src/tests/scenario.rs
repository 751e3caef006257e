use std::error::Error;

use conductor_query_planner::ast::{
    operation::VariableDefinition, type_ref::TypeRef, value::Value as AstValue,
};
use serde_json::json;

use crate::tests::testkit::{
    accounts, catalog, field, gateway, product_reviews_authors, query, reviews, variables,
    MockSubgraph,
};

#[tokio::test]
async fn fetches_across_three_subgraphs() -> Result<(), Box<dyn Error>> {
    let test = gateway(vec![catalog(), reviews(), accounts()]);

    let response = test
        .gateway
        .execute(&product_reviews_authors("[Review]"), None)
        .await;

    insta::assert_snapshot!(serde_json::to_string_pretty(&response)?, @r#"
    {
      "data": {
        "product": {
          "name": "Chair",
          "reviews": [
            {
              "text": "Great",
              "author": {
                "name": "Ada"
              }
            },
            {
              "text": "Meh",
              "author": {
                "name": "Grace"
              }
            },
            {
              "text": "Again",
              "author": {
                "name": "Ada"
              }
            }
          ]
        }
      }
    }
    "#);
    assert_eq!(test.log.subgraphs(), vec!["catalog", "reviews", "accounts"]);

    Ok(())
}

#[tokio::test]
async fn entity_lookups_carry_deduplicated_representations() {
    let test = gateway(vec![catalog(), reviews(), accounts()]);

    test.gateway
        .execute(&product_reviews_authors("[Review]"), None)
        .await;

    let catalog_calls = test.log.calls_to("catalog");
    assert_eq!(
        catalog_calls[0].query,
        r#"query{product(id:"1"){name __typename _internal_req_id:id}}"#
    );
    assert_eq!(catalog_calls[0].variables, None);

    let reviews_calls = test.log.calls_to("reviews");
    assert_eq!(
        reviews_calls[0].representations(),
        vec![json!({"__typename": "Product", "id": "1"})]
    );

    // u1 authored two reviews but is looked up once
    let accounts_calls = test.log.calls_to("accounts");
    assert_eq!(accounts_calls.len(), 1);
    assert_eq!(
        accounts_calls[0].representations(),
        vec![
            json!({"__typename": "User", "id": "u1"}),
            json!({"__typename": "User", "id": "u2"})
        ]
    );
}

#[tokio::test]
async fn only_declared_variables_are_forwarded() {
    let catalog = MockSubgraph::data(
        "catalog",
        json!({"product": {"name": "Chair"}}),
    );
    let test = gateway(vec![catalog]);
    let operation = query(vec![field("product", "Product")
        .with_argument("id", AstValue::variable("pid"))
        .with_selections(vec![field("name", "String!").into()])
        .into()])
    .with_variable(VariableDefinition::new(
        "pid",
        TypeRef::non_null(TypeRef::named("ID")),
    ));

    let response = test
        .gateway
        .execute(&operation, variables(json!({"pid": "1", "unused": true})))
        .await;

    assert_eq!(response.data, json!({"product": {"name": "Chair"}}));
    assert!(response.errors.is_empty());

    let calls = test.log.calls();
    assert_eq!(calls[0].query, "query($pid:ID!){product(id:$pid){name}}");
    assert_eq!(calls[0].variables, variables(json!({"pid": "1"})));
}

#[tokio::test]
async fn empty_lists_make_no_entity_lookup() {
    let reviews = MockSubgraph::entities("reviews", |_| json!({"reviews": []}));
    let test = gateway(vec![catalog(), reviews, accounts()]);

    let response = test
        .gateway
        .execute(&product_reviews_authors("[Review]"), None)
        .await;

    assert_eq!(
        response.data,
        json!({"product": {"name": "Chair", "reviews": []}})
    );
    assert!(response.errors.is_empty());
    assert_eq!(test.log.subgraphs(), vec!["catalog", "reviews"]);
}

#[tokio::test]
async fn null_parents_stop_the_chain_without_errors() {
    let catalog = MockSubgraph::data("catalog", json!({"product": null}));
    let test = gateway(vec![catalog, reviews(), accounts()]);

    let response = test
        .gateway
        .execute(&product_reviews_authors("[Review]"), None)
        .await;

    assert_eq!(response.data, json!({"product": null}));
    assert!(response.errors.is_empty());
    assert_eq!(test.log.subgraphs(), vec!["catalog"]);
}
