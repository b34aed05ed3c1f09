//! Resolvers - named functions that fetch a relationship's target data
//!
//! A resolver receives the owner, the built query parameters and the bound
//! session, and returns raw JSON; the loader marshals it into records and
//! caches it. The registry holds resolvers by name, so a relationship
//! declaration only names the one it wants.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::error::{ErrorContext, ModelError, ModelResult};
use crate::model::Record;
use crate::schema::EntityType;
use crate::session::Session;
use crate::transport::Criteria;

use super::metadata::{QueryParams, RelationshipSpec};

/// Name of the built-in single-record resolver
pub const FIND: &str = "find";

/// Name of the built-in filtered-query resolver
pub const QUERY: &str = "query";

/// Everything a resolver may look at
pub struct ResolveContext<'a> {
    pub session: &'a Session,
    pub owner: &'a Record,
    pub relationship: &'a RelationshipSpec,
    pub target: &'a Arc<EntityType>,
}

impl<'a> ResolveContext<'a> {
    /// Diagnostic context naming owner type, relationship and owner identity
    pub fn error_context(&self) -> ErrorContext {
        self.owner.context().with_field(self.relationship.name())
    }
}

/// Raw resolver output, before marshalling
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// `None` is a successful "not found"
    One(Option<Value>),
    Many(Vec<Value>),
}

impl Resolved {
    pub fn into_one(self) -> Option<Value> {
        match self {
            Resolved::One(value) => value,
            Resolved::Many(values) => values.into_iter().next(),
        }
    }

    pub fn into_many(self) -> Vec<Value> {
        match self {
            Resolved::One(value) => value.into_iter().collect(),
            Resolved::Many(values) => values,
        }
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, ctx: ResolveContext<'_>, params: QueryParams) -> ModelResult<Resolved>;
}

/// `find(type, id)`; criteria fall back to the first query match
#[derive(Debug, Default, Clone, Copy)]
pub struct FindResolver;

#[async_trait]
impl Resolver for FindResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>, params: QueryParams) -> ModelResult<Resolved> {
        let transport = ctx.session.transport();
        match params {
            QueryParams::Skip => Ok(Resolved::One(None)),
            QueryParams::Id(id) => {
                trace!(target_type = ctx.target.name(), %id, "find");
                transport
                    .find(ctx.target.name(), &id)
                    .await
                    .map(Resolved::One)
                    .map_err(|e| ModelError::transport(ctx.error_context(), e))
            }
            QueryParams::Criteria(criteria) => {
                trace!(target_type = ctx.target.name(), ?criteria, "find by criteria");
                transport
                    .query(ctx.target.name(), &criteria)
                    .await
                    .map(|rows| Resolved::One(rows.into_iter().next()))
                    .map_err(|e| ModelError::transport(ctx.error_context(), e))
            }
        }
    }
}

/// `query(type, criteria)`; a bare id becomes `{"id": id}`
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryResolver;

#[async_trait]
impl Resolver for QueryResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>, params: QueryParams) -> ModelResult<Resolved> {
        let criteria = match params {
            QueryParams::Skip => return Ok(Resolved::Many(Vec::new())),
            QueryParams::Id(id) => {
                let mut criteria = Criteria::new();
                criteria.insert("id".to_string(), id);
                criteria
            }
            QueryParams::Criteria(criteria) => criteria,
        };

        trace!(target_type = ctx.target.name(), ?criteria, "query");
        ctx.session
            .transport()
            .query(ctx.target.name(), &criteria)
            .await
            .map(Resolved::Many)
            .map_err(|e| ModelError::transport(ctx.error_context(), e))
    }
}
