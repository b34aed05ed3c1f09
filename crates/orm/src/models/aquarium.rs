//! Aquarium schema catalog
//!
//! Entity types of the laboratory service. Only the schema is described here:
//! which payload keys are relationships, which fields are blobs or secrets.
//! All other attributes are kept as they arrive.

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::Record;
use crate::registry::ModelRegistry;
use crate::relationships::{OwnerKeys, QueryParams, Relationship};
use crate::schema::{EntityType, EntityTypeBuilder};

/// Names of every type registered by [`register_all`]
pub const TYPE_NAMES: [&str; 26] = [
    "Account",
    "AllowableFieldType",
    "Budget",
    "Code",
    "Collection",
    "DataAssociation",
    "FieldType",
    "FieldValue",
    "Group",
    "Invoice",
    "Item",
    "Job",
    "JobAssociation",
    "Library",
    "Membership",
    "ObjectType",
    "Operation",
    "OperationType",
    "Plan",
    "PlanAssociation",
    "Sample",
    "SampleType",
    "Upload",
    "User",
    "UserBudgetAssociation",
    "Wire",
];

/// Register the whole catalog into `registry`
pub fn register_all(registry: &ModelRegistry) -> ModelResult<()> {
    for entity in catalog()? {
        registry.register(entity)?;
    }
    Ok(())
}

/// Build the catalog without registering it
pub fn catalog() -> ModelResult<Vec<EntityType>> {
    [
        plain("Account"),
        plain("AllowableFieldType")
            .has_one("field_type", "FieldType")
            .has_one("object_type", "ObjectType")
            .has_one("sample_type", "SampleType"),
        plain("Budget").has_many("user_budget_associations", "UserBudgetAssociation"),
        plain("Code").has_one("user", "User"),
        plain("Collection")
            .has_one("object_type", "ObjectType")
            .relationship(owned("data_associations", "DataAssociation")),
        plain("DataAssociation")
            .json("object")
            .has_one("upload", "Upload"),
        plain("FieldType")
            .has_many("allowable_field_types", "AllowableFieldType")
            .relationship(field_parent("operation_type", "OperationType"))
            .relationship(field_parent("sample_type", "SampleType")),
        plain("FieldValue")
            .ignore("object_type")
            .has_one("field_type", "FieldType")
            .has_one("allowable_field_type", "AllowableFieldType")
            .relationship(Relationship::has_one("item", "Item").with_ref("child_item_id"))
            .relationship(Relationship::has_one("sample", "Sample").with_ref("child_sample_id"))
            .relationship(field_parent("operation", "Operation"))
            .relationship(field_parent("parent_sample", "Sample")),
        plain("Group"),
        plain("Invoice"),
        plain("Item")
            .json("data")
            .has_one("sample", "Sample")
            .has_one("object_type", "ObjectType")
            .relationship(owned("data_associations", "DataAssociation")),
        plain("Job")
            .has_many("job_associations", "JobAssociation")
            .has_many_through("operations", "Operation", "JobAssociation"),
        plain("JobAssociation")
            .has_one("job", "Job")
            .has_one("operation", "Operation"),
        plain("Library").relationship(owned("codes", "Code")),
        plain("Membership")
            .has_one("user", "User")
            .has_one("group", "Group"),
        plain("ObjectType"),
        plain("Operation")
            .relationship(owned("field_values", "FieldValue"))
            .relationship(owned("data_associations", "DataAssociation"))
            .has_one("operation_type", "OperationType")
            .has_many("job_associations", "JobAssociation")
            .has_many_through("jobs", "Job", "JobAssociation")
            .has_many("plan_associations", "PlanAssociation")
            .has_many_through("plans", "Plan", "PlanAssociation"),
        plain("OperationType")
            .has_many("operations", "Operation")
            .relationship(owned("field_types", "FieldType"))
            .relationship(owned("codes", "Code")),
        plain("Plan")
            .relationship(owned("data_associations", "DataAssociation"))
            .has_many("plan_associations", "PlanAssociation")
            .has_many_through("operations", "Operation", "PlanAssociation"),
        plain("PlanAssociation")
            .has_one("plan", "Plan")
            .has_one("operation", "Operation"),
        plain("Sample")
            .has_one("sample_type", "SampleType")
            .has_many("items", "Item")
            .relationship(owned("field_values", "FieldValue")),
        plain("SampleType")
            .has_many("samples", "Sample")
            .relationship(
                Relationship::many("field_types", "FieldType").with_params(|owner| {
                    Ok(match owner.id() {
                        Some(id) => QueryParams::Criteria(crate::transport::criteria([
                            ("parent_id", id.clone()),
                            ("parent_class", Value::String(owner.type_name().to_string())),
                        ])),
                        None => QueryParams::Skip,
                    })
                }),
            ),
        plain("Upload"),
        plain("User")
            .scalar(["id", "name", "login"])
            .ignore("password_digest")
            .ignore("remember_token")
            .ignore("key")
            .has_many("groups", "Group"),
        plain("UserBudgetAssociation")
            .has_one("budget", "Budget")
            .has_one("user", "User"),
        plain("Wire")
            .relationship(Relationship::has_one("source", "FieldValue").with_ref("from_id"))
            .relationship(Relationship::has_one("destination", "FieldValue").with_ref("to_id")),
    ]
    .into_iter()
    .map(EntityTypeBuilder::build)
    .collect()
}

fn plain(name: &str) -> EntityTypeBuilder {
    EntityType::builder(name)
}

/// Records tagged with `parent_class` / `parent_id`
fn owned(name: &str, target: &str) -> Relationship {
    Relationship::has_many_generic(name, target).with_owner_keys(OwnerKeys::parent())
}

/// Parent of a field type or field value, resolved only when `parent_class`
/// names `parent_type`
fn field_parent(name: &str, parent_type: &'static str) -> Relationship {
    Relationship::one(name, parent_type).with_params(move |owner: &Record| {
        let matches = owner.get_str("parent_class") == Some(parent_type);
        Ok(match owner.get("parent_id") {
            Some(id) if matches && !id.is_null() => QueryParams::Id(id.clone()),
            _ => QueryParams::Skip,
        })
    })
}
