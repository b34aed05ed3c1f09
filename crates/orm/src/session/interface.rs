use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::marshaller::DumpOptions;
use crate::model::Record;
use crate::schema::{EntityType, Loaded};
use crate::transport::Criteria;

use super::Session;

/// Per-type entry points of a session: `session.model("Sample")?.find(1)`
#[derive(Debug, Clone)]
pub struct ModelInterface<'s> {
    session: &'s Session,
    entity: Arc<EntityType>,
}

impl<'s> ModelInterface<'s> {
    pub(crate) fn new(session: &'s Session, entity: Arc<EntityType>) -> Self {
        Self { session, entity }
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    /// Fresh record of this type, bound to the session
    pub fn new_record(&self) -> Record {
        let mut record = self.entity.new_record();
        record.bind(self.session);
        record
    }

    /// Load a payload of this type and bind it
    pub fn load(&self, payload: &Value) -> ModelResult<Loaded> {
        self.session.load(self.entity.name(), payload)
    }

    pub async fn find(&self, id: impl Into<Value>) -> ModelResult<Option<Record>> {
        let id = id.into();
        let found = self
            .session
            .transport()
            .find(self.entity.name(), &id)
            .await
            .map_err(|e| self.session.transport_error(&self.entity, e))?;

        found
            .filter(|value| !value.is_null())
            .map(|value| self.session.materialize_record(&self.entity, &value))
            .transpose()
    }

    pub async fn find_by_name(&self, name: &str) -> ModelResult<Option<Record>> {
        let mut criteria = Criteria::new();
        criteria.insert("name".to_string(), Value::String(name.to_string()));
        self.first(criteria).await
    }

    pub async fn query(&self, criteria: Criteria) -> ModelResult<Vec<Record>> {
        let rows = self
            .session
            .transport()
            .query(self.entity.name(), &criteria)
            .await
            .map_err(|e| self.session.transport_error(&self.entity, e))?;

        debug!(entity = self.entity.name(), rows = rows.len(), "query");
        rows.iter()
            .map(|row| self.session.materialize_record(&self.entity, row))
            .collect()
    }

    pub async fn all(&self) -> ModelResult<Vec<Record>> {
        self.query(Criteria::new()).await
    }

    pub async fn first(&self, criteria: Criteria) -> ModelResult<Option<Record>> {
        Ok(self.query(criteria).await?.into_iter().next())
    }

    /// Persist `record` and reload it in place from the server response, so
    /// it gains its server id and keeps its local id.
    pub async fn create(&self, record: &mut Record) -> ModelResult<()> {
        if record.type_name() != self.entity.name() {
            return Err(ModelError::schema(
                record.context(),
                format!("cannot create through the {} interface", self.entity.name()),
            ));
        }

        let payload = record.dump(&DumpOptions::default().depth(0));
        let stored = self
            .session
            .transport()
            .create(self.entity.name(), &payload)
            .await
            .map_err(|e| self.session.transport_error(&self.entity, e))?;

        record.bind(self.session);
        record.update(&stored)?;
        debug!(entity = self.entity.name(), record = %record.identity(), "created record");
        Ok(())
    }
}
