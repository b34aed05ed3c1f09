//! Relationship Metadata - the resolved form of a declared relationship

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelResult;
use crate::model::Record;
use crate::transport::Criteria;

use super::polymorphic::OwnerKeys;
use super::resolver::{FIND, QUERY};

/// How many records a relationship yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// The six relationship shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// Arbitrary single lookup with explicit resolver and parameters
    One,
    /// Arbitrary filtered lookup with explicit parameters
    Many,
    /// Direct foreign key on the owner (`<target>_id`)
    HasOne,
    /// Reverse foreign key on the target (`<owner>_id`)
    HasMany,
    /// Reverse foreign key plus an owner-kind discriminator
    HasManyGeneric,
    /// Two hops through an association record
    HasManyThrough,
}

impl RelationshipKind {
    pub fn cardinality(self) -> Cardinality {
        match self {
            Self::One | Self::HasOne => Cardinality::One,
            _ => Cardinality::Many,
        }
    }

    /// Resolver used when the declaration does not name one
    pub fn default_resolver(self) -> &'static str {
        match self.cardinality() {
            Cardinality::One => FIND,
            Cardinality::Many => QUERY,
        }
    }

    pub fn is_polymorphic(self) -> bool {
        matches!(self, Self::HasManyGeneric)
    }

    pub fn requires_through(self) -> bool {
        matches!(self, Self::HasManyThrough)
    }
}

/// Query a parameter builder produces for a resolver
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParams {
    /// Look up one record by server id
    Id(Value),
    /// Filter by field values
    Criteria(Criteria),
    /// Nothing to look up; the relationship resolves as not found without I/O
    Skip,
}

/// Pure function of the owning record producing the query for a relationship
pub type ParamBuilder = Arc<dyn Fn(&Record) -> ModelResult<QueryParams> + Send + Sync>;

/// Two-hop configuration for `HasManyThrough`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughConfig {
    /// Association type name
    pub through_type: String,
    /// Owner relationship holding the association records
    pub relationship: String,
    /// Field on each association record pointing at the final target
    pub foreign_key: String,
}

/// Structural description of how owner and target are linked, used by the
/// eager include pass to batch across many owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    /// Opaque parameter builder; cannot be batched
    Custom,
    /// `owner.field == target.id`
    ForeignKey { field: String },
    /// `target.key == owner.attr`
    ReverseKey { key: String, attr: String },
    /// `target.keys.id == owner.attr && target.keys.kind == owner type`
    Polymorphic { keys: OwnerKeys, attr: String },
    /// `target.id == row.foreign_key` for each row of the through relationship
    Through(ThroughConfig),
}

/// A relationship declared on an entity type
#[derive(Clone)]
pub struct RelationshipSpec {
    pub(crate) name: String,
    pub(crate) target: String,
    pub(crate) kind: RelationshipKind,
    pub(crate) resolver: String,
    pub(crate) linkage: Linkage,
    pub(crate) params: ParamBuilder,
}

impl RelationshipSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target type name, resolved through the registry on first use
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.kind.cardinality()
    }

    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    pub fn linkage(&self) -> &Linkage {
        &self.linkage
    }

    pub fn through(&self) -> Option<&ThroughConfig> {
        match self.linkage {
            Linkage::Through(ref config) => Some(config),
            _ => None,
        }
    }

    /// Build the query for `owner`
    pub fn build_params(&self, owner: &Record) -> ModelResult<QueryParams> {
        (self.params)(owner)
    }
}

impl fmt::Debug for RelationshipSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("resolver", &self.resolver)
            .field("linkage", &self.linkage)
            .finish()
    }
}

/// Key used to compare JSON ids across records
pub(crate) fn value_key(value: &Value) -> String {
    value.to_string()
}

/// Non-null values, first occurrence kept, order preserved
pub(crate) fn dedup_values<'a, I>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_null())
        .filter(|value| seen.insert(value_key(value)))
        .cloned()
        .collect()
}
