//! Record base - attribute storage plus a per-relationship result cache

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ErrorContext, ModelError, ModelResult, RecordId};
use crate::relationships::{Cardinality, Linkage, RelationshipSpec};
use crate::schema::EntityType;
use crate::session::Session;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

fn next_local_id() -> u64 {
    NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Cached outcome of a resolved relationship
#[derive(Debug, Clone)]
pub(crate) enum Cached {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Cached {
    pub(crate) fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Cached::One(None),
            Cardinality::Many => Cached::Many(Vec::new()),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Cached::One(value) => value.is_none(),
            Cached::Many(values) => values.is_empty(),
        }
    }

    pub(crate) fn records(&self) -> &[Record] {
        match self {
            Cached::One(Some(record)) => std::slice::from_ref(record.as_ref()),
            Cached::One(None) => &[],
            Cached::Many(records) => records,
        }
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        match self {
            Cached::One(Some(record)) => std::slice::from_mut(record.as_mut()),
            Cached::One(None) => &mut [],
            Cached::Many(records) => records,
        }
    }

    fn as_related(&self) -> Related<'_> {
        match self {
            Cached::One(value) => Related::One(value.as_deref()),
            Cached::Many(values) => Related::Many(values),
        }
    }
}

/// The three distinguishable states of a relationship cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationState {
    NotQueried,
    Empty,
    Resolved,
}

/// Borrowed view of a resolved relationship
#[derive(Debug, Clone, Copy)]
pub enum Related<'a> {
    One(Option<&'a Record>),
    Many(&'a [Record]),
}

impl<'a> Related<'a> {
    pub fn as_one(self) -> Option<&'a Record> {
        match self {
            Related::One(record) => record,
            Related::Many(records) => records.first(),
        }
    }

    pub fn as_many(self) -> &'a [Record] {
        match self {
            Related::One(Some(record)) => std::slice::from_ref(record),
            Related::One(None) => &[],
            Related::Many(records) => records,
        }
    }

    pub fn is_empty(self) -> bool {
        self.as_many().is_empty()
    }
}

/// An in-memory instance of an entity type
pub struct Record {
    rid: u64,
    entity: Arc<EntityType>,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) relations: HashMap<String, Cached>,
    pub(crate) session: Option<Session>,
}

impl Record {
    /// Empty, unbound record with a fresh local id
    pub fn new(entity: Arc<EntityType>) -> Self {
        Self::with_attributes(entity, Map::new())
    }

    /// Record holding `attributes` verbatim; no schema processing is applied
    pub fn with_attributes(entity: Arc<EntityType>, attributes: Map<String, Value>) -> Self {
        Self {
            rid: next_local_id(),
            entity,
            attributes,
            relations: HashMap::new(),
            session: None,
        }
    }

    /// Process-local sequence number, assigned at construction
    pub fn local_id(&self) -> u64 {
        self.rid
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn type_name(&self) -> &str {
        self.entity.name()
    }

    /// Server-assigned id, once loaded or created
    pub fn id(&self) -> Option<&Value> {
        self.attributes.get("id").filter(|id| !id.is_null())
    }

    /// Server id if present, local id otherwise
    pub fn identity(&self) -> RecordId {
        match self.id() {
            Some(id) => RecordId::Server(id.clone()),
            None => RecordId::Local(self.rid),
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext::new(self.type_name()).with_record(self.identity())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Set an attribute, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// All attributes, declared and extra
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Attributes the schema does not declare
    pub fn extra_attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes
            .iter()
            .filter(move |(name, _)| !self.entity.is_tracked(name))
    }

    /// Read a JSON blob field, decoding it if the service stored it as a string
    pub fn json_field(&self, name: &str) -> ModelResult<Option<Value>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => serde_json::from_str(raw).map(Some).map_err(|_| {
                ModelError::marshal(
                    self.context().with_field(name),
                    "JSON document",
                    &Value::String(raw.clone()),
                )
            }),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    pub fn relation_state(&self, name: &str) -> RelationState {
        match self.relations.get(name) {
            None => RelationState::NotQueried,
            Some(cached) if cached.is_empty() => RelationState::Empty,
            Some(_) => RelationState::Resolved,
        }
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Cached value of a relationship; `None` when not yet queried. Never performs I/O.
    pub fn cached(&self, name: &str) -> Option<Related<'_>> {
        self.relations.get(name).map(Cached::as_related)
    }

    pub fn cached_one(&self, name: &str) -> Option<Option<&Record>> {
        self.cached(name).map(Related::as_one)
    }

    pub fn cached_many(&self, name: &str) -> Option<&[Record]> {
        self.cached(name).map(Related::as_many)
    }

    pub(crate) fn spec(&self, name: &str) -> ModelResult<&RelationshipSpec> {
        self.entity
            .relationship(name)
            .ok_or_else(|| ModelError::lookup(name, self.context().with_field(name)))
    }

    fn checked_spec(&self, name: &str, cardinality: Cardinality) -> ModelResult<&RelationshipSpec> {
        let spec = self.spec(name)?;
        if spec.cardinality() != cardinality {
            return Err(ModelError::schema(
                self.context().with_field(name),
                format!("relationship has cardinality {:?}", spec.cardinality()),
            ));
        }
        Ok(spec)
    }

    fn check_target(&self, spec: &RelationshipSpec, related: &Record) -> ModelResult<()> {
        if related.type_name() != spec.target() {
            return Err(ModelError::schema(
                self.context().with_field(spec.name()),
                format!("expected {} record, found {}", spec.target(), related.type_name()),
            ));
        }
        Ok(())
    }

    /// Place a single related record (or nothing) into the cache as resolved
    pub fn set_related_one(&mut self, name: &str, related: Option<Record>) -> ModelResult<()> {
        let spec = self.checked_spec(name, Cardinality::One)?;
        if let Some(ref record) = related {
            self.check_target(spec, record)?;
        }
        let mut cached = Cached::One(related.map(Box::new));
        self.bind_cached(&mut cached);
        self.relations.insert(name.to_string(), cached);
        Ok(())
    }

    /// Place related records into the cache as resolved, in the given order
    pub fn set_related_many(&mut self, name: &str, related: Vec<Record>) -> ModelResult<()> {
        let spec = self.checked_spec(name, Cardinality::Many)?;
        for record in &related {
            self.check_target(spec, record)?;
        }
        let mut cached = Cached::Many(related);
        self.bind_cached(&mut cached);
        self.relations.insert(name.to_string(), cached);
        Ok(())
    }

    /// Push onto a many relationship, starting from resolved-empty if not yet queried
    pub fn append_related(&mut self, name: &str, related: Record) -> ModelResult<()> {
        let spec = self.checked_spec(name, Cardinality::Many)?;
        self.check_target(spec, &related)?;

        let mut related = related;
        if let Some(ref session) = self.session {
            related.bind(session);
        }
        let cached = self
            .relations
            .entry(name.to_string())
            .or_insert_with(|| Cached::Many(Vec::new()));
        if let Cached::Many(records) = cached {
            records.push(related);
        }
        Ok(())
    }

    /// Point a `HasOne` foreign key at `related`: `owner.<field> = related.id`
    pub fn set_foreign_key_from(&mut self, name: &str, related: &Record) -> ModelResult<()> {
        let spec = self.spec(name)?;
        self.check_target(spec, related)?;
        let Linkage::ForeignKey { ref field } = *spec.linkage() else {
            return Err(ModelError::schema(
                self.context().with_field(name),
                "relationship has no foreign key on its owner",
            ));
        };
        let field = field.clone();
        let id = related.id().cloned().unwrap_or(Value::Null);
        self.attributes.insert(field, id);
        Ok(())
    }

    /// Forget a resolved relationship so the next access queries again
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.relations.remove(name).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.relations.clear();
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    fn bind_cached(&self, cached: &mut Cached) {
        if let Some(ref session) = self.session {
            for record in cached.records_mut().iter_mut() {
                record.bind(session);
            }
        }
    }
}

impl Clone for Record {
    /// A clone is a distinct record: same attributes and cache, fresh local id
    fn clone(&self) -> Self {
        Self {
            rid: next_local_id(),
            entity: Arc::clone(&self.entity),
            attributes: self.attributes.clone(),
            relations: self.relations.clone(),
            session: self.session.clone(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resolved: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        resolved.sort_unstable();
        f.debug_struct("Record")
            .field("type", &self.type_name())
            .field("local_id", &self.rid)
            .field("attributes", &self.attributes)
            .field("resolved", &resolved)
            .field("bound", &self.is_bound())
            .finish()
    }
}
