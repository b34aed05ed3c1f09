use std::sync::Arc;

use labbind_core::ClientConfig;
use labbind_orm::prelude::*;
use labbind_orm::ErrorContext;
use labbind_testing::prelude::*;

fn samples() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new().with_table(
        "Sample",
        vec![
            json!({"id": 1, "name": "pGFP", "sample_type_id": 4}),
            json!({"id": 2, "name": "pMOD", "sample_type_id": 4}),
            json!({"id": 3, "name": "fwd primer", "sample_type_id": 5}),
        ],
    ))
}

fn every_record_bound_to(record: &Record, session: &Session) -> bool {
    let bound = record.session().map_or(false, |s| s.same_as(session));
    bound
        && record.entity().relationships().iter().all(|spec| {
            record
                .cached(spec.name())
                .map_or(true, |related| {
                    related
                        .as_many()
                        .iter()
                        .all(|child| every_record_bound_to(child, session))
                })
        })
}

#[test]
fn test_load_binds_the_whole_nested_tree_without_queries() -> TestResult<()> {
    let (session, transport) = fixtures::aquarium_session()?;
    let operation = session
        .load(
            "Operation",
            &json!({
                "id": 1,
                "operation_type": {"id": 2, "name": "Transform"},
                "field_values": [
                    {"id": 3, "parent_class": "Operation", "parent_id": 1,
                     "item": {"id": 4, "sample": {"id": 5, "sample_type": {"id": 6}}}}
                ]
            }),
        )?
        .into_record(ErrorContext::new("Operation"))?;

    assert!(every_record_bound_to(&operation, &session));
    assert_eq!(transport.call_count(), 0);
    Ok(())
}

#[test]
fn test_binding_is_idempotent_and_first_session_wins() -> TestResult<()> {
    let registry = fixtures::aquarium_registry()?;
    let first = fixtures::session(Arc::clone(&registry), Arc::new(MemoryTransport::new()))?;
    let second = fixtures::session(Arc::clone(&registry), Arc::new(MemoryTransport::new()))?;

    let mut item = registry
        .load("Item", &json!({"id": 1, "sample": {"id": 2}}))?
        .into_record(ErrorContext::new("Item"))?;
    assert!(!item.is_bound());

    item.bind(&first).bind(&first);
    item.bind(&second);

    assert!(every_record_bound_to(&item, &first));
    assert!(!first.same_as(&second));
    assert!(first.same_as(&first.clone()));
    Ok(())
}

#[test]
fn test_bind_reaches_records_added_after_binding() -> TestResult<()> {
    let (session, _transport) = fixtures::aquarium_session()?;
    let registry = Arc::clone(session.registry());

    let mut sample = session.model("Sample")?.new_record();
    let unbound = registry
        .load("Item", &json!({"id": 9, "sample_id": null}))?
        .into_record(ErrorContext::new("Item"))?;
    sample.append_related("items", unbound)?;

    assert!(every_record_bound_to(&sample, &session));
    Ok(())
}

#[tokio::test]
async fn test_interface_find_and_queries() -> TestResult<()> {
    let transport = samples();
    let session = fixtures::session(fixtures::aquarium_registry()?, Arc::clone(&transport))?;
    let samples = session.model("Sample")?;

    let found = samples.find(2).await?.expect("sample 2");
    assert_eq!(found.get_str("name"), Some("pMOD"));
    assert!(found.is_bound());
    assert!(samples.find(42).await?.is_none());

    let plasmids = samples.query(criteria([("sample_type_id", json!(4))])).await?;
    let names: Vec<_> = plasmids.iter().filter_map(|s| s.get_str("name")).collect();
    assert_eq!(names, vec!["pGFP", "pMOD"]);

    assert_eq!(samples.all().await?.len(), 3);
    assert!(samples.first(criteria([("sample_type_id", json!(7))])).await?.is_none());

    let primer = samples.find_by_name("fwd primer").await?.expect("primer");
    assert_eq!(primer.get_i64("id"), Some(3));

    assert_eq!(transport.find_count(), 2);
    assert_eq!(transport.query_count(), 4);
    Ok(())
}

#[tokio::test]
async fn test_interface_errors() -> TestResult<()> {
    let transport = samples();
    let session = fixtures::session(fixtures::aquarium_registry()?, Arc::clone(&transport))?;

    assert!(session.model("Sampel").unwrap_err().is_lookup());

    transport.fail_on("Sample", "502 bad gateway");
    let err = session.model("Sample")?.all().await.unwrap_err();
    assert!(err.is_resolution());
    assert!(err.transport_cause().is_some());
    Ok(())
}

#[tokio::test]
async fn test_create_assigns_server_id_in_place() -> TestResult<()> {
    let (session, transport) = fixtures::aquarium_session()?;
    let samples = session.model("Sample")?;

    let mut sample = samples.new_record();
    sample.set("name", "pGFP-2");
    sample.set("sample_type_id", 4);
    let local_id = sample.local_id();

    samples.create(&mut sample).await?;

    assert_eq!(sample.get_i64("id"), Some(1001));
    assert_eq!(sample.local_id(), local_id);
    assert_eq!(transport.rows("Sample").len(), 1);
    assert_eq!(
        transport.calls(),
        vec![TransportCall::Create {
            type_name: "Sample".to_string(),
            payload: json!({"name": "pGFP-2", "sample_type_id": 4}),
        }]
    );

    let mut item = session.model("Item")?.new_record();
    assert!(samples.create(&mut item).await.unwrap_err().is_schema());
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> TestResult<()> {
    let registry = fixtures::aquarium_registry()?;
    let config = ClientConfig::testing().with_eager_batch_size(0);

    let err = Session::with_config(registry, Arc::new(MemoryTransport::new()), config).unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
    Ok(())
}

#[test]
fn test_dump_options_follow_config() -> TestResult<()> {
    let registry = fixtures::aquarium_registry()?;
    let config = ClientConfig::testing().with_dump_depth(3);
    let session = Session::with_config(registry, Arc::new(MemoryTransport::new()), config)?;

    assert_eq!(session.dump_options().depth_limit, 3);
    assert!(session.marshaller().is_strict());
    Ok(())
}
