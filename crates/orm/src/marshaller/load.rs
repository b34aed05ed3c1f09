use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{ModelError, ModelResult};
use crate::model::{Cached, Record};
use crate::registry::ModelRegistry;
use crate::relationships::{Cardinality, RelationshipSpec};
use crate::schema::{EntityType, Loaded};

use super::Marshaller;

impl<'r> Marshaller<'r> {
    /// An object loads one record; an array loads one record per element,
    /// each independently and in order.
    pub fn load(&self, entity: &Arc<EntityType>, payload: &Value) -> ModelResult<Loaded> {
        match payload {
            Value::Object(object) => self.load_object(entity, object).map(Loaded::One),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => self.load_object(entity, object),
                    other => Err(ModelError::marshal(
                        entity.context().with_field(format!("[{}]", i)),
                        "object",
                        other,
                    )),
                })
                .collect::<ModelResult<Vec<_>>>()
                .map(Loaded::Many),
            other => Err(ModelError::marshal(entity.context(), "object or array", other)),
        }
    }

    pub fn load_record(&self, entity: &Arc<EntityType>, payload: &Value) -> ModelResult<Record> {
        match payload {
            Value::Object(object) => self.load_object(entity, object),
            other => Err(ModelError::marshal(entity.context(), "object", other)),
        }
    }

    pub fn load_object(&self, entity: &Arc<EntityType>, object: &Map<String, Value>) -> ModelResult<Record> {
        let mut record = Record::new(Arc::clone(entity));
        if let Some(id) = object.get("id") {
            record.attributes.insert("id".to_string(), id.clone());
        }
        self.apply(&mut record, object)?;
        self.validate(&record)?;
        Ok(record)
    }

    /// Merge `object` into `record`. Relationships present in the payload
    /// replace their cache entries; all others are left untouched.
    pub(crate) fn apply(&self, record: &mut Record, object: &Map<String, Value>) -> ModelResult<()> {
        let entity = Arc::clone(record.entity());

        for (key, value) in object {
            if let Some(spec) = entity.relationship(key) {
                let cached = self.load_relation(record, spec, value)?;
                record.relations.insert(key.clone(), cached);
                continue;
            }

            match entity.field_kind(key) {
                Some(kind) if !kind.is_loaded() => {
                    trace!(entity = entity.name(), field = %key, "dropping ignored field");
                }
                _ => {
                    record.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(())
    }

    fn load_relation(&self, owner: &Record, spec: &RelationshipSpec, value: &Value) -> ModelResult<Cached> {
        let context = || owner.context().with_field(spec.name());

        if value.is_null() {
            return Ok(Cached::empty(spec.cardinality()));
        }

        let registry = self.registry.ok_or_else(|| {
            ModelError::schema(
                context(),
                "nested payload needs a model registry; bind a session or use update_with",
            )
        })?;
        let target = registry.resolve_target(spec.target(), context())?;

        match (spec.cardinality(), value) {
            (Cardinality::One, Value::Object(object)) => {
                let record = self.load_object(&target, object)?;
                Ok(Cached::One(Some(Box::new(record))))
            }
            (Cardinality::Many, Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => self.load_object(&target, object),
                    other => Err(ModelError::marshal(
                        owner.context().with_field(format!("{}[{}]", spec.name(), i)),
                        "object",
                        other,
                    )),
                })
                .collect::<ModelResult<Vec<_>>>()
                .map(Cached::Many),
            (Cardinality::One, other) => Err(ModelError::marshal(context(), "object or null", other)),
            (Cardinality::Many, other) => Err(ModelError::marshal(context(), "array or null", other)),
        }
    }

    pub(crate) fn validate(&self, record: &Record) -> ModelResult<()> {
        let entity = record.entity();
        if !(self.strict || entity.is_strict()) {
            return Ok(());
        }

        for field in entity.fields().iter().filter(|field| field.required) {
            if record.get(&field.name).map_or(true, Value::is_null) {
                return Err(ModelError::schema(
                    record.context().with_field(field.name.clone()),
                    "required field is missing",
                ));
            }
        }
        Ok(())
    }
}

impl Record {
    /// Re-load `payload` into this record in place, keeping its local id.
    /// Nested payloads need a bound session for target lookup; see
    /// [`update_with`](Self::update_with).
    pub fn update(&mut self, payload: &Value) -> ModelResult<&mut Self> {
        match self.session.clone() {
            Some(session) => {
                let marshaller = session.marshaller();
                self.update_using(marshaller, payload)
            }
            None => self.update_using(Marshaller::detached(), payload),
        }
    }

    /// Re-load `payload` in place, resolving nested target types through `registry`
    pub fn update_with(&mut self, registry: &ModelRegistry, payload: &Value) -> ModelResult<&mut Self> {
        let strict = self.session.as_ref().map_or(false, |s| s.config().strict);
        self.update_using(Marshaller::new(registry).strict(strict), payload)
    }

    fn update_using(&mut self, marshaller: Marshaller<'_>, payload: &Value) -> ModelResult<&mut Self> {
        let Value::Object(object) = payload else {
            return Err(ModelError::marshal(self.context(), "object", payload));
        };

        marshaller.apply(self, object)?;
        marshaller.validate(self)?;
        self.propagate_session();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .register(
                EntityType::builder("Sample")
                    .scalar(["id", "name", "sample_type_id"])
                    .has_one("sample_type", "SampleType")
                    .has_many("items", "Item")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityType::builder("SampleType")
                    .field(FieldSpec::scalar("name").required())
                    .strict()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityType::builder("Item")
                    .scalar(["id", "sample_id"])
                    .ignore("location_secret")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_load_nested_marks_relationships_resolved() {
        let registry = registry();
        let sample = registry.resolve("Sample").unwrap();
        let record = Marshaller::new(&registry)
            .load_record(
                &sample,
                &json!({
                    "id": 1,
                    "name": "pGFP",
                    "sample_type": {"id": 4, "name": "Plasmid"},
                    "items": [{"id": 10, "sample_id": 1, "location_secret": "B2"}]
                }),
            )
            .unwrap();

        assert_eq!(record.cached_one("sample_type").unwrap().unwrap().get_str("name"), Some("Plasmid"));
        let items = record.cached_many("items").unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].get("location_secret").is_none());
        assert!(record.get("items").is_none());
    }

    #[test]
    fn test_null_relationship_is_resolved_empty() {
        let registry = registry();
        let sample = registry.resolve("Sample").unwrap();
        let record = Marshaller::new(&registry)
            .load_record(&sample, &json!({"id": 1, "sample_type": null}))
            .unwrap();
        assert!(matches!(record.cached_one("sample_type"), Some(None)));
    }

    #[test]
    fn test_wrong_shape_names_field_and_expectation() {
        let registry = registry();
        let sample = registry.resolve("Sample").unwrap();

        let err = Marshaller::new(&registry)
            .load_record(&sample, &json!({"id": 1, "items": {"id": 3}}))
            .unwrap_err();
        assert!(err.is_marshal());
        assert_eq!(err.context().unwrap().field.as_deref(), Some("items"));
        assert!(err.to_string().contains("expected array or null, found object"));

        let err = Marshaller::new(&registry)
            .load_record(&sample, &json!({"id": 1, "items": [5]}))
            .unwrap_err();
        assert_eq!(err.context().unwrap().field.as_deref(), Some("items[0]"));

        let err = Marshaller::new(&registry).load(&sample, &json!("Sample")).unwrap_err();
        assert!(err.is_marshal());
    }

    #[test]
    fn test_required_fields_on_strict_type() {
        let registry = registry();
        let sample_type = registry.resolve("SampleType").unwrap();
        let err = Marshaller::new(&registry)
            .load_record(&sample_type, &json!({"id": 4}))
            .unwrap_err();
        assert!(err.is_schema());
        let context = err.context().unwrap();
        assert_eq!(context.entity, "SampleType");
        assert_eq!(context.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_detached_marshaller_rejects_nested_payload() {
        let registry = registry();
        let sample = registry.resolve("Sample").unwrap();
        let err = Marshaller::detached()
            .load_record(&sample, &json!({"sample_type": {"id": 4, "name": "Plasmid"}}))
            .unwrap_err();
        assert!(err.is_schema());
    }
}
