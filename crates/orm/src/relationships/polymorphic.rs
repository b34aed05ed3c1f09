//! Polymorphic ownership - one shared table owned by several unrelated types
//!
//! Association records carry an explicit owner tag: a kind field naming the
//! owning entity type and an id field holding the owner's id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Record;
use crate::transport::Criteria;

/// Field names of the owner tag on association records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKeys {
    pub kind: String,
    pub id: String,
}

impl OwnerKeys {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// The `parent_class` / `parent_id` pair used by the laboratory service
    pub fn parent() -> Self {
        Self::new("parent_class", "parent_id")
    }
}

impl Default for OwnerKeys {
    fn default() -> Self {
        Self::new("owner_kind", "owner_id")
    }
}

/// Owner tag of an association record
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerRef {
    pub kind: String,
    pub id: Value,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Tag pointing at `owner`, keyed by `attr` (normally `id`)
    pub fn of(owner: &Record, attr: &str) -> Option<Self> {
        let id = owner.get(attr).filter(|id| !id.is_null())?;
        Some(Self::new(owner.type_name(), id.clone()))
    }

    /// Read the tag carried by an association record
    pub fn from_association(record: &Record, keys: &OwnerKeys) -> Option<Self> {
        let kind = record.get(&keys.kind)?.as_str()?;
        let id = record.get(&keys.id).filter(|id| !id.is_null())?;
        Some(Self::new(kind, id.clone()))
    }

    /// Query criteria selecting the association records of this owner
    pub fn criteria(&self, keys: &OwnerKeys) -> Criteria {
        let mut criteria = Criteria::new();
        criteria.insert(keys.id.clone(), self.id.clone());
        criteria.insert(keys.kind.clone(), Value::String(self.kind.clone()));
        criteria
    }

    /// Whether `record` is tagged with this owner
    pub fn owns(&self, record: &Record, keys: &OwnerKeys) -> bool {
        Self::from_association(record, keys).as_ref() == Some(self)
    }

    /// Tag `record` as belonging to this owner
    pub fn assign(&self, record: &mut Record, keys: &OwnerKeys) {
        record.set(keys.kind.clone(), Value::String(self.kind.clone()));
        record.set(keys.id.clone(), self.id.clone());
    }
}
