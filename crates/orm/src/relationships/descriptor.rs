//! Relationship descriptors - declarative lazy joins
//!
//! The backing service has no joins, so every descriptor answers one
//! question: given the owner, what query finds the target? Parameter
//! builders only read the owner, which lets one descriptor serve every
//! instance of the owning type.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ErrorContext, ModelError, ModelResult};
use crate::model::Record;
use crate::naming;
use crate::transport::Criteria;

use super::metadata::{
    dedup_values, Linkage, ParamBuilder, QueryParams, RelationshipKind, RelationshipSpec,
    ThroughConfig,
};
use super::polymorphic::{OwnerKeys, OwnerRef};

/// Builder for a relationship declaration; turned into a [`RelationshipSpec`]
/// when the owning entity type is built.
pub struct Relationship {
    name: String,
    target: String,
    kind: RelationshipKind,
    resolver: Option<String>,
    params: Option<ParamBuilder>,
    reference: Option<String>,
    attr: Option<String>,
    owner_keys: Option<OwnerKeys>,
    through: Option<String>,
    via: Option<String>,
}

impl Relationship {
    fn new(name: impl Into<String>, target: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            resolver: None,
            params: None,
            reference: None,
            attr: None,
            owner_keys: None,
            through: None,
            via: None,
        }
    }

    /// Single lookup; needs `with_params`, resolves through `find` by default
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::One)
    }

    /// Filtered lookup; needs `with_params`, resolves through `query` by default
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::Many)
    }

    /// Owner carries `<target>_id`
    pub fn has_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::HasOne)
    }

    /// Targets carry `<owner>_id`
    pub fn has_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::HasMany)
    }

    /// Targets carry an owner tag (kind + id)
    pub fn has_many_generic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::HasManyGeneric)
    }

    /// Targets reached through the owner's collection of `through` records
    pub fn has_many_through(
        name: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        let mut relationship = Self::new(name, target, RelationshipKind::HasManyThrough);
        relationship.through = Some(through.into());
        relationship
    }

    /// Use a named resolver from the registry instead of the default
    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }

    /// Supply the parameter builder. On the implicit kinds this replaces the
    /// generated builder and disables batching in eager includes.
    pub fn with_params<F>(mut self, params: F) -> Self
    where
        F: Fn(&Record) -> ModelResult<QueryParams> + Send + Sync + 'static,
    {
        self.params = Some(Arc::new(params));
        self
    }

    /// Override the foreign-key field: on the owner for `HasOne`, on the
    /// target for `HasMany`, on the association record for `HasManyThrough`
    pub fn with_ref(mut self, field: impl Into<String>) -> Self {
        self.reference = Some(field.into());
        self
    }

    /// Owner attribute matched by `HasMany`/`HasManyGeneric` (default `id`)
    pub fn with_attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    /// Owner tag field names for `HasManyGeneric`
    pub fn with_owner_keys(mut self, keys: OwnerKeys) -> Self {
        self.owner_keys = Some(keys);
        self
    }

    /// Owner relationship holding the association records of a `HasManyThrough`
    pub fn via(mut self, relationship: impl Into<String>) -> Self {
        self.via = Some(relationship.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub(crate) fn into_spec(self, owner_type: &str) -> ModelResult<RelationshipSpec> {
        let context = ErrorContext::new(owner_type).with_field(self.name.clone());

        if self.name.is_empty() || self.target.is_empty() {
            return Err(ModelError::schema(
                context,
                "relationship name and target type must be non-empty",
            ));
        }

        let resolver = self
            .resolver
            .clone()
            .unwrap_or_else(|| self.kind.default_resolver().to_string());

        if let Some(params) = self.params {
            return Ok(RelationshipSpec {
                name: self.name,
                target: self.target,
                kind: self.kind,
                resolver,
                linkage: Linkage::Custom,
                params,
            });
        }

        let attr = self.attr.unwrap_or_else(|| "id".to_string());

        let (linkage, params): (Linkage, ParamBuilder) = match self.kind {
            RelationshipKind::One | RelationshipKind::Many => {
                return Err(ModelError::schema(
                    context,
                    format!("{:?} relationship requires a parameter builder", self.kind),
                ));
            }
            RelationshipKind::HasOne => {
                let field = self
                    .reference
                    .unwrap_or_else(|| naming::foreign_key(&self.target));
                (
                    Linkage::ForeignKey {
                        field: field.clone(),
                    },
                    param_builder(move |owner| Ok(foreign_id(owner, &field))),
                )
            }
            RelationshipKind::HasMany => {
                let key = self
                    .reference
                    .unwrap_or_else(|| naming::foreign_key(owner_type));
                let builder_key = key.clone();
                let builder_attr = attr.clone();
                (
                    Linkage::ReverseKey { key, attr },
                    param_builder(move |owner| Ok(reverse_criteria(owner, &builder_key, &builder_attr))),
                )
            }
            RelationshipKind::HasManyGeneric => {
                let keys = self.owner_keys.unwrap_or_default();
                let builder_keys = keys.clone();
                let builder_attr = attr.clone();
                (
                    Linkage::Polymorphic { keys, attr },
                    param_builder(move |owner| {
                        Ok(match OwnerRef::of(owner, &builder_attr) {
                            Some(owner_ref) => QueryParams::Criteria(owner_ref.criteria(&builder_keys)),
                            None => QueryParams::Skip,
                        })
                    }),
                )
            }
            RelationshipKind::HasManyThrough => {
                let through_type = self.through.ok_or_else(|| {
                    ModelError::schema(context.clone(), "through relationship requires a through type")
                })?;
                let relationship = self
                    .via
                    .unwrap_or_else(|| naming::collection_name(&through_type));
                if relationship == self.name {
                    return Err(ModelError::schema(
                        context,
                        "through relationship cannot go through itself",
                    ));
                }
                let foreign_key = self
                    .reference
                    .unwrap_or_else(|| naming::foreign_key(&self.target));
                let config = ThroughConfig {
                    through_type,
                    relationship,
                    foreign_key,
                };
                let builder_config = config.clone();
                let name = self.name.clone();
                (
                    Linkage::Through(config),
                    param_builder(move |owner| through_id_set(owner, &name, &builder_config)),
                )
            }
        };

        Ok(RelationshipSpec {
            name: self.name,
            target: self.target,
            kind: self.kind,
            resolver,
            linkage,
            params,
        })
    }
}

fn param_builder<F>(params: F) -> ParamBuilder
where
    F: Fn(&Record) -> ModelResult<QueryParams> + Send + Sync + 'static,
{
    Arc::new(params)
}

fn foreign_id(owner: &Record, field: &str) -> QueryParams {
    match owner.get(field) {
        Some(id) if !id.is_null() => QueryParams::Id(id.clone()),
        _ => QueryParams::Skip,
    }
}

fn reverse_criteria(owner: &Record, key: &str, attr: &str) -> QueryParams {
    match owner.get(attr) {
        Some(value) if !value.is_null() => {
            let mut criteria = Criteria::new();
            criteria.insert(key.to_string(), value.clone());
            QueryParams::Criteria(criteria)
        }
        _ => QueryParams::Skip,
    }
}

/// One query for the deduplicated target ids of the owner's association rows
fn through_id_set(owner: &Record, name: &str, config: &ThroughConfig) -> ModelResult<QueryParams> {
    let rows = owner.cached_many(&config.relationship).ok_or_else(|| {
        ModelError::resolution(
            owner.context().with_field(name),
            format!(
                "through relationship '{}' must be resolved first",
                config.relationship
            ),
        )
    })?;

    let ids = dedup_values(rows.iter().filter_map(|row| row.get(&config.foreign_key)));
    if ids.is_empty() {
        return Ok(QueryParams::Skip);
    }

    let mut criteria = Criteria::new();
    criteria.insert("id".to_string(), Value::Array(ids));
    Ok(QueryParams::Criteria(criteria))
}
