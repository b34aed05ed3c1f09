use std::sync::Arc;

use labbind_orm::models::aquarium;
use labbind_orm::prelude::*;
use labbind_orm::ErrorContext;
use labbind_testing::prelude::*;

fn plan_fixture() -> TestResult<(Session, Arc<MemoryTransport>)> {
    init_tracing();
    let transport = Arc::new(
        MemoryTransport::new()
            .with_table("Plan", vec![json!({"id": 1, "name": "cloning", "status": "planning"})])
            .with_table(
                "PlanAssociation",
                vec![
                    json!({"id": 1, "plan_id": 1, "operation_id": 20}),
                    json!({"id": 2, "plan_id": 1, "operation_id": 21}),
                ],
            )
            .with_table(
                "Operation",
                vec![
                    json!({"id": 20, "operation_type_id": 3, "status": "done"}),
                    json!({"id": 21, "operation_type_id": 4, "status": "pending"}),
                ],
            )
            .with_table(
                "OperationType",
                vec![
                    json!({"id": 3, "name": "Make PCR Fragment", "category": "Cloning"}),
                    json!({"id": 4, "name": "Run Gel", "category": "Cloning"}),
                ],
            )
            .with_table(
                "FieldValue",
                vec![
                    json!({"id": 100, "parent_class": "Operation", "parent_id": 20, "role": "output",
                           "name": "Fragment", "child_item_id": 500, "child_sample_id": 600}),
                    json!({"id": 101, "parent_class": "Operation", "parent_id": 21, "role": "input",
                           "name": "Fragment", "child_item_id": 500, "child_sample_id": 600}),
                    json!({"id": 102, "parent_class": "Sample", "parent_id": 20, "name": "Length"}),
                ],
            )
            .with_table("Wire", vec![json!({"id": 7, "from_id": 100, "to_id": 101})])
            .with_table("Item", vec![json!({"id": 500, "sample_id": 600, "data": "{\"volume\": 40}"})])
            .with_table("Sample", vec![json!({"id": 600, "name": "pGFP fragment", "sample_type_id": 2})])
            .with_table("SampleType", vec![json!({"id": 2, "name": "Fragment"})]),
    );
    let session = fixtures::session(fixtures::aquarium_registry()?, Arc::clone(&transport))?;
    Ok((session, transport))
}

#[tokio::test]
async fn test_plan_walks_to_operation_types() -> TestResult<()> {
    let (session, _transport) = plan_fixture()?;
    let mut plan = session.model("Plan")?.find(1).await?.expect("plan");

    let mut names = Vec::new();
    for operation in plan.many_mut("operations").await? {
        if let Some(operation_type) = operation.one("operation_type").await? {
            names.extend(operation_type.get_str("name").map(str::to_string));
        }
    }
    assert_eq!(names, vec!["Make PCR Fragment", "Run Gel"]);
    Ok(())
}

#[tokio::test]
async fn test_operation_inputs_reach_sample_type() -> TestResult<()> {
    let (session, transport) = plan_fixture()?;
    let mut operation = session.model("Operation")?.find(21).await?.expect("operation");

    let inputs = operation.many_mut("field_values").await?;
    assert_eq!(inputs.len(), 1);
    let input = &mut inputs[0];
    assert_eq!(input.get_str("role"), Some("input"));

    let item = input.one_mut("item").await?.expect("item");
    let data = item.json_field("data")?.expect("data");
    assert_eq!(data["volume"], json!(40));

    let sample = item.one_mut("sample").await?.expect("sample");
    let sample_type = sample.one("sample_type").await?.expect("sample type");
    assert_eq!(sample_type.get_str("name"), Some("Fragment"));

    assert!(transport
        .calls_for("FieldValue")
        .iter()
        .all(|call| matches!(call, TransportCall::Query { criteria, .. }
            if criteria.get("parent_class") == Some(&json!("Operation")))));
    Ok(())
}

#[tokio::test]
async fn test_wire_connects_field_values() -> TestResult<()> {
    let (session, _transport) = plan_fixture()?;
    let mut wire = session.model("Wire")?.find(7).await?.expect("wire");

    let source = wire.one_mut("source").await?.expect("source");
    let operation_id = source
        .one("operation")
        .await?
        .and_then(|op| op.get_i64("id"));
    assert_eq!(operation_id, Some(20));

    let destination = wire.one("destination").await?.expect("destination");
    assert_eq!(destination.get_str("role"), Some("input"));
    Ok(())
}

#[tokio::test]
async fn test_eager_include_over_plan_operations() -> TestResult<()> {
    let (session, transport) = plan_fixture()?;
    let mut operations = session.model("Operation")?.all().await?;
    transport.clear_calls();

    let stats = session
        .include(&mut operations, &["operation_type", "field_values", "plans"])
        .await?;
    assert_eq!(stats.fallback_count, 0);
    assert_eq!(transport.query_count(), 4);

    let dumped: Vec<_> = operations
        .iter()
        .map(|op| op.dump(&DumpOptions::new().include(["operation_type"])))
        .collect();
    assert_eq!(dumped[0]["operation_type"]["name"], json!("Make PCR Fragment"));
    TestAssertions::assert_json_lacks(&dumped[1], "field_values")?;

    let plans = operations[1].cached_many("plans").unwrap_or_default();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].get_str("status"), Some("planning"));
    Ok(())
}

#[test]
fn test_user_payload_drops_credentials() -> TestResult<()> {
    let registry = fixtures::aquarium_registry()?;
    let user = registry
        .load(
            "User",
            &json!({"id": 1, "name": "Neptune", "login": "neptune", "password_digest": "$2a$", "remember_token": "t", "key": "k"}),
        )?
        .into_record(ErrorContext::new("User"))?;

    TestAssertions::assert_json_eq(
        &user.dump(&DumpOptions::default()),
        &json!({"id": 1, "name": "Neptune", "login": "neptune"}),
    )
}

#[test]
fn test_catalog_can_be_extended_after_registration() -> TestResult<()> {
    let registry = ModelRegistry::new();
    aquarium::register_all(&registry)?;

    assert!(aquarium::register_all(&registry).unwrap_err().is_schema());

    registry.register(
        EntityType::builder("Freezer")
            .relationship(Relationship::has_many("items", "Item").with_ref("freezer_id"))
            .build()?,
    )?;
    assert_eq!(registry.len(), aquarium::TYPE_NAMES.len() + 1);
    assert_eq!(registry.stats().total_resolvers, 2);
    Ok(())
}
