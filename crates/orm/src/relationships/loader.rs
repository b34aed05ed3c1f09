//! Lazy relationship access
//!
//! `record.one("sample").await` and friends check the cache, require a bound
//! session, run the relationship's resolver on a miss, and cache the outcome
//! (an empty outcome included) before returning it. A cached entry is never
//! queried again until it is invalidated.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::{Cached, Record, Related};

use super::metadata::{value_key, Cardinality};
use super::resolver::ResolveContext;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = ModelResult<()>> + Send + 'a>>;

impl Record {
    /// Resolved value of a relationship, querying on first access
    pub async fn related(&mut self, name: &str) -> ModelResult<Related<'_>> {
        self.ensure_resolved(name).await?;
        self.cached(name)
            .ok_or_else(|| ModelError::resolution(self.context().with_field(name), "relationship was not cached"))
    }

    /// Single-valued relationship; `None` when the target does not exist
    pub async fn one(&mut self, name: &str) -> ModelResult<Option<&Record>> {
        self.expect_cardinality(name, Cardinality::One)?;
        Ok(self.related(name).await?.as_one())
    }

    /// Multi-valued relationship in resolver order; empty when nothing matches
    pub async fn many(&mut self, name: &str) -> ModelResult<&[Record]> {
        self.expect_cardinality(name, Cardinality::Many)?;
        Ok(self.related(name).await?.as_many())
    }

    /// Mutable access to a single-valued relationship, resolving it first
    pub async fn one_mut(&mut self, name: &str) -> ModelResult<Option<&mut Record>> {
        self.expect_cardinality(name, Cardinality::One)?;
        self.ensure_resolved(name).await?;
        Ok(match self.relations.get_mut(name) {
            Some(Cached::One(record)) => record.as_deref_mut(),
            _ => None,
        })
    }

    /// Mutable access to a multi-valued relationship, resolving it first
    pub async fn many_mut(&mut self, name: &str) -> ModelResult<&mut [Record]> {
        self.expect_cardinality(name, Cardinality::Many)?;
        self.ensure_resolved(name).await?;
        Ok(match self.relations.get_mut(name) {
            Some(Cached::Many(records)) => records.as_mut_slice(),
            _ => &mut [],
        })
    }

    fn expect_cardinality(&self, name: &str, cardinality: Cardinality) -> ModelResult<()> {
        let spec = self.spec(name)?;
        if spec.cardinality() != cardinality {
            return Err(ModelError::schema(
                self.context().with_field(name),
                format!(
                    "relationship has cardinality {:?}; use {}",
                    spec.cardinality(),
                    match spec.cardinality() {
                        Cardinality::One => "one()",
                        Cardinality::Many => "many()",
                    }
                ),
            ));
        }
        Ok(())
    }

    /// Resolve `name` unless it is cached. Boxed because a through
    /// relationship first resolves the relationship it goes through.
    pub(crate) fn ensure_resolved<'a>(&'a mut self, name: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            if self.relations.contains_key(name) {
                return Ok(());
            }

            let entity = std::sync::Arc::clone(self.entity());
            let spec = self.spec(name)?.clone();
            let context = self.context().with_field(name);

            let session = self.session.clone().ok_or_else(|| {
                ModelError::resolution(context.clone(), "no session bound; load the record through a session or bind one")
            })?;
            let registry = std::sync::Arc::clone(session.registry());
            let target = registry.resolve_target(spec.target(), context.clone())?;

            if let Some(through) = spec.through() {
                let via = through.relationship.clone();
                self.ensure_resolved(&via).await?;
            }

            let params = spec.build_params(self).map_err(|err| {
                if err.is_resolution() {
                    err
                } else {
                    ModelError::resolution_caused_by(context.clone(), "parameter builder failed", err)
                }
            })?;
            let resolver = registry.resolver(spec.resolver(), context.clone())?;

            debug!(
                entity = entity.name(),
                relationship = name,
                record = %self.identity(),
                resolver = spec.resolver(),
                ?params,
                "resolving relationship"
            );

            let resolved = resolver
                .resolve(
                    ResolveContext {
                        session: &session,
                        owner: self,
                        relationship: &spec,
                        target: &target,
                    },
                    params,
                )
                .await?;

            let mut cached = session.materialize(&target, spec.cardinality(), resolved)?;
            if let Some(through) = spec.through() {
                let fetched = match cached {
                    Cached::Many(records) => records,
                    Cached::One(record) => record.map(|r| *r).into_iter().collect(),
                };
                let rows = self.cached_many(&through.relationship).unwrap_or_default();
                cached = Cached::Many(expand_through(rows, &through.foreign_key, &index_by_id(fetched)));
            }

            debug!(
                entity = entity.name(),
                relationship = name,
                record = %self.identity(),
                count = cached.records().len(),
                "resolved relationship"
            );
            self.relations.insert(name.to_string(), cached);
            Ok(())
        })
    }
}

/// Fetched records keyed by server id
pub(crate) fn index_by_id(records: Vec<Record>) -> HashMap<String, Record> {
    records
        .into_iter()
        .filter_map(|record| {
            let key = value_key(record.id()?);
            Some((key, record))
        })
        .collect()
}

/// Re-expand fetched targets to follow the through rows: one entry per row,
/// in row order, repeated when several rows point at the same target. Rows
/// whose target was not returned are skipped.
pub(crate) fn expand_through(rows: &[Record], foreign_key: &str, by_id: &HashMap<String, Record>) -> Vec<Record> {
    rows.iter()
        .filter_map(|row| row.get(foreign_key))
        .filter_map(|fk| by_id.get(&value_key(fk)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityType;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn record(entity: &Arc<EntityType>, payload: Value) -> Record {
        let Value::Object(attributes) = payload else {
            panic!("fixture must be an object");
        };
        Record::with_attributes(Arc::clone(entity), attributes)
    }

    #[test]
    fn test_expand_through_preserves_order_and_multiplicity() {
        let link = Arc::new(EntityType::builder("Link").build().unwrap());
        let op = Arc::new(EntityType::builder("Operation").build().unwrap());

        let rows = vec![
            record(&link, json!({"operation_id": 7})),
            record(&link, json!({"operation_id": 9})),
            record(&link, json!({"operation_id": 9})),
            record(&link, json!({"operation_id": 404})),
        ];
        let fetched = index_by_id(vec![
            record(&op, json!({"id": 9, "name": "b"})),
            record(&op, json!({"id": 7, "name": "a"})),
        ]);

        let expanded = expand_through(&rows, "operation_id", &fetched);
        let ids: Vec<_> = expanded.iter().map(|r| r.get_i64("id").unwrap()).collect();
        assert_eq!(ids, vec![7, 9, 9]);
        assert_ne!(expanded[1].local_id(), expanded[2].local_id());
    }
}
