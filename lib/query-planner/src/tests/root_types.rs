use std::error::Error;

use crate::{
    ast::{
        operation::{Operation, OperationKind, VariableDefinition},
        selection_item::SelectionItem,
        selection_path::SelectionPath,
        selection_set::SelectionSet,
        type_ref::TypeRef,
        value::Value,
    },
    planner::{
        error::PlanningError,
        plan::{CompiledStepKind, VariableBinding},
    },
    tests::testkit::{
        assert_covered_once, build_plan, field, init_logger, mutation, on, product_reviews_index,
        query,
    },
};

#[test]
fn mutation_fields_run_serially() -> Result<(), Box<dyn Error>> {
    init_logger();
    let add_review = |alias: &str| -> SelectionItem {
        field("addReview", "Review")
            .with_alias(alias)
            .with_argument("text", Value::string(alias))
            .with_selections(vec![field("id", "ID!").into()])
            .into()
    };
    let operation = mutation(vec![
        add_review("first"),
        add_review("second"),
        field("updatePrice", "Product")
            .with_selections(vec![field("price", "Int").into()])
            .into(),
        add_review("third"),
    ]);

    let plan = build_plan(product_reviews_index(), &operation)?;

    insta::assert_snapshot!(plan.to_string(), @r#"
    ExecutionPlan(mutation) {
      [0] Fetch(reviews) type=Mutation
        mutation{first:addReview(text:"first"){id} second:addReview(text:"second"){id}}
      [1] Fetch(catalog) type=Mutation depends_on=[0]
        mutation{updatePrice{price}}
      [2] Fetch(reviews) type=Mutation depends_on=[1]
        mutation{third:addReview(text:"third"){id}}
    }
    "#);
    assert_eq!(
        plan.steps[0].root_selections,
        vec![
            SelectionPath::from_segments(["first"]),
            SelectionPath::from_segments(["second"])
        ]
    );

    assert_covered_once(&product_reviews_index(), &operation);

    Ok(())
}

#[test]
fn subscriptions_are_rejected() {
    init_logger();
    let operation = Operation::new(
        OperationKind::Subscription,
        SelectionSet::new(vec![field("reviewAdded", "Review")
            .with_selections(vec![field("id", "ID!").into()])
            .into()]),
    );

    assert_eq!(
        build_plan(product_reviews_index(), &operation).err(),
        Some(PlanningError::UnsupportedOperation(
            OperationKind::Subscription
        ))
    );
}

#[test]
fn introspection_fields_share_one_step() -> Result<(), Box<dyn Error>> {
    init_logger();
    let operation = query(vec![
        field("__typename", "String!").into(),
        field("__schema", "__Schema!")
            .with_selections(vec![field("queryType", "__Type!")
                .with_selections(vec![field("name", "String").into()])
                .into()])
            .into(),
        field("product", "Product")
            .with_argument("id", Value::string("1"))
            .with_selections(vec![field("name", "String!").into()])
            .into(),
    ]);

    let plan = build_plan(product_reviews_index(), &operation)?;

    assert_eq!(plan.len(), 2);
    let CompiledStepKind::Introspection(introspection) = &plan.steps[0].kind else {
        panic!("expected an introspection step first");
    };
    assert_eq!(
        introspection.selections.to_string(),
        "{__typename __schema{queryType{name}}}"
    );
    assert_eq!(plan.steps[1].subgraph(), Some("catalog"));
    assert_eq!(plan.waves(), vec![vec![0, 1]]);

    assert_covered_once(&product_reviews_index(), &operation);

    Ok(())
}

#[test]
fn node_field_resolves_through_per_type_gates() -> Result<(), Box<dyn Error>> {
    init_logger();
    let operation = query(vec![field("node", "Node")
        .with_argument("id", Value::variable("id"))
        .with_selections(vec![on(
            "Product",
            vec![field("name", "String!").into()],
        )])
        .into()])
    .with_variable(VariableDefinition::new(
        "id",
        TypeRef::non_null(TypeRef::named("ID")),
    ));

    let plan = build_plan(product_reviews_index(), &operation)?;

    insta::assert_snapshot!(plan.to_string(), @r#"
    ExecutionPlan(query) {
      [0] Node(node) type=Query
        id: $id
      [1] NodeEntity(Product) type=Product at=node depends_on=[0]
      [2] Fetch(catalog) type=Product at=node depends_on=[1]
        query($representations:[_Any!]!){_entities(representations:$representations){...on Product{name}}}
      [3] NodeEntity(User) type=User at=node depends_on=[0]
    }
    "#);

    let CompiledStepKind::Node(node) = &plan.steps[0].kind else {
        panic!("expected a node step first");
    };
    assert_eq!(node.possible_types, vec!["Product", "User"]);

    assert_covered_once(&product_reviews_index(), &operation);

    Ok(())
}

#[test]
fn operation_variables_are_forwarded_with_their_types() -> Result<(), Box<dyn Error>> {
    init_logger();
    let operation = query(vec![field("product", "Product")
        .with_argument("id", Value::variable("pid"))
        .with_selections(vec![field("name", "String!").into()])
        .into()])
    .with_variable(VariableDefinition::new(
        "pid",
        TypeRef::non_null(TypeRef::named("ID")),
    ));

    let plan = build_plan(product_reviews_index(), &operation)?;
    let fetch = plan.steps[0].fetch().expect("fetch step");

    assert_eq!(fetch.document, "query($pid:ID!){product(id:$pid){name}}");
    assert_eq!(
        fetch.variables,
        vec![VariableBinding {
            name: "pid".to_string(),
            type_ref: TypeRef::non_null(TypeRef::named("ID")),
        }]
    );

    Ok(())
}

#[test]
fn undeclared_variables_fail_planning() {
    init_logger();
    let operation = query(vec![field("product", "Product")
        .with_argument("id", Value::variable("pid"))
        .with_selections(vec![field("name", "String!").into()])
        .into()]);

    assert_eq!(
        build_plan(product_reviews_index(), &operation).err(),
        Some(PlanningError::UnknownVariable("pid".to_string()))
    );
}

#[test]
fn fields_without_owner_fail_planning() {
    init_logger();
    let operation = query(vec![field("product", "Product")
        .with_selections(vec![field("color", "String").into()])
        .into()]);

    assert_eq!(
        build_plan(product_reviews_index(), &operation).err(),
        Some(PlanningError::UnservableField {
            type_name: "Product".to_string(),
            field: "color".to_string(),
        })
    );
}
