//! Entity types - the per-type table of fields and relationships

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ErrorContext, ModelError, ModelResult};
use crate::marshaller::Marshaller;
use crate::model::Record;
use crate::registry::ModelRegistry;
use crate::relationships::{Cardinality, Relationship, RelationshipSpec};

use super::field::{FieldKind, FieldSpec};

/// A registered schema describing one kind of remote resource
#[derive(Debug)]
pub struct EntityType {
    name: String,
    fields: Vec<FieldSpec>,
    field_index: HashMap<String, usize>,
    relationships: Vec<RelationshipSpec>,
    relationship_index: HashMap<String, usize>,
    strict: bool,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    /// Declared relationships, in declaration order
    pub fn relationships(&self) -> &[RelationshipSpec] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSpec> {
        self.relationship_index.get(name).map(|&i| &self.relationships[i])
    }

    /// Whether required fields are enforced on every load of this type
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether `name` is a declared field (as opposed to an extra attribute)
    pub fn is_tracked(&self, name: &str) -> bool {
        self.field_index.contains_key(name)
    }

    pub(crate) fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|field| field.kind)
    }

    /// A fresh, empty, unbound record of this type
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }

    /// Load an object into one record or an array into records in matching order
    pub fn load(self: &Arc<Self>, registry: &ModelRegistry, payload: &Value) -> ModelResult<Loaded> {
        Marshaller::new(registry).load(self, payload)
    }

    pub fn load_one(self: &Arc<Self>, registry: &ModelRegistry, payload: &Value) -> ModelResult<Record> {
        self.load(registry, payload)?.into_record(self.context())
    }

    pub fn load_many(self: &Arc<Self>, registry: &ModelRegistry, payload: &Value) -> ModelResult<Vec<Record>> {
        Ok(self.load(registry, payload)?.into_records())
    }

    pub(crate) fn context(&self) -> ErrorContext {
        ErrorContext::new(self.name.clone())
    }
}

/// Result of loading a payload whose shape decides the cardinality
#[derive(Debug)]
pub enum Loaded {
    One(Record),
    Many(Vec<Record>),
}

impl Loaded {
    /// The single record; an array payload is a marshal error here
    pub fn into_record(self, context: ErrorContext) -> ModelResult<Record> {
        match self {
            Loaded::One(record) => Ok(record),
            Loaded::Many(_) => Err(ModelError::marshal(context, "object", &Value::Array(Vec::new()))),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Loaded::One(record) => vec![record],
            Loaded::Many(records) => records,
        }
    }
}

/// Builder for [`EntityType`]; validation happens in [`build`](Self::build)
pub struct EntityTypeBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    relationships: Vec<Relationship>,
    strict: bool,
}

impl EntityTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
            strict: false,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Plain scalar fields
    pub fn scalar<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(FieldSpec::scalar));
        self
    }

    /// Opaque JSON blob field
    pub fn json(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::json(name))
    }

    /// Field dropped on load
    pub fn ignore(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::skip_load(name))
    }

    /// Field kept on load but never dumped
    pub fn load_only(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::skip_dump(name))
    }

    /// Required scalar field
    pub fn required(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::scalar(name).required())
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn has_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::has_one(name, target))
    }

    pub fn has_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::has_many(name, target))
    }

    pub fn has_many_generic(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::has_many_generic(name, target))
    }

    pub fn has_many_through(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        self.relationship(Relationship::has_many_through(name, target, through))
    }

    /// Enforce required fields on every load
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn build(self) -> ModelResult<EntityType> {
        let context = ErrorContext::new(self.name.clone());
        if self.name.is_empty() {
            return Err(ModelError::schema(context, "entity type name must be non-empty"));
        }

        let mut field_index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(ModelError::schema(context, "field name must be non-empty"));
            }
            if field_index.insert(field.name.clone(), i).is_some() {
                return Err(ModelError::schema(
                    context.with_field(field.name.clone()),
                    "field declared twice",
                ));
            }
        }

        let mut relationships = Vec::with_capacity(self.relationships.len());
        let mut relationship_index = HashMap::with_capacity(self.relationships.len());
        for relationship in self.relationships {
            let spec = relationship.into_spec(&self.name)?;
            if field_index.contains_key(spec.name()) {
                return Err(ModelError::schema(
                    context.with_field(spec.name()),
                    "relationship name collides with a field",
                ));
            }
            if relationship_index
                .insert(spec.name().to_string(), relationships.len())
                .is_some()
            {
                return Err(ModelError::schema(
                    context.with_field(spec.name()),
                    "relationship declared twice",
                ));
            }
            relationships.push(spec);
        }

        for spec in &relationships {
            let Some(through) = spec.through() else {
                continue;
            };
            let via = relationship_index
                .get(&through.relationship)
                .map(|&i| &relationships[i]);
            match via {
                Some(via) if via.cardinality() == Cardinality::Many && via.target() == through.through_type => {}
                Some(via) => {
                    return Err(ModelError::schema(
                        context.with_field(spec.name()),
                        format!(
                            "through relationship '{}' must be a collection of {}, found {:?} of {}",
                            through.relationship,
                            through.through_type,
                            via.cardinality(),
                            via.target()
                        ),
                    ));
                }
                None => {
                    return Err(ModelError::schema(
                        context.with_field(spec.name()),
                        format!("through relationship '{}' is not declared", through.relationship),
                    ));
                }
            }
        }

        Ok(EntityType {
            name: self.name,
            fields: self.fields,
            field_index,
            relationships,
            relationship_index,
            strict: self.strict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_indexes_fields_and_relationships() {
        let sample = EntityType::builder("Sample")
            .scalar(["id", "name", "sample_type_id"])
            .json("data")
            .has_one("sample_type", "SampleType")
            .has_many("items", "Item")
            .build()
            .unwrap();

        assert_eq!(sample.fields().len(), 4);
        assert!(sample.is_tracked("name"));
        assert!(!sample.is_tracked("description"));
        assert_eq!(sample.field_kind("data"), Some(FieldKind::Json));
        assert_eq!(sample.relationship("items").unwrap().target(), "Item");
        assert_eq!(
            sample
                .relationships()
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>(),
            vec!["sample_type", "items"]
        );
        assert!(!sample.is_strict());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = EntityType::builder("Item")
            .scalar(["id", "id"])
            .build()
            .unwrap_err();
        assert!(err.is_schema());

        let err = EntityType::builder("Item")
            .scalar(["sample"])
            .has_one("sample", "Sample")
            .build()
            .unwrap_err();
        assert!(err.is_schema());
        assert_eq!(err.context().unwrap().field.as_deref(), Some("sample"));
    }

    #[test]
    fn test_through_requires_matching_collection() {
        let err = EntityType::builder("Job")
            .has_many_through("operations", "Operation", "JobAssociation")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("job_associations"));

        let err = EntityType::builder("Job")
            .has_many("job_associations", "Operation")
            .has_many_through("operations", "Operation", "JobAssociation")
            .build()
            .unwrap_err();
        assert!(err.is_schema());

        let job = EntityType::builder("Job")
            .has_many("job_associations", "JobAssociation")
            .has_many_through("operations", "Operation", "JobAssociation")
            .build()
            .unwrap();
        assert!(job.relationship("operations").unwrap().through().is_some());
    }

    #[test]
    fn test_unknown_target_is_accepted_at_declaration() {
        let sample = EntityType::builder("Sample")
            .has_one("sample_type", "SampelType")
            .build();
        assert!(sample.is_ok());
    }
}
