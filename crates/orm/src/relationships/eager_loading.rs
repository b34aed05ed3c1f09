//! Eager include - pre-resolve relationships across a batch of records
//!
//! Instead of one round trip per record, each named relationship is fetched
//! with one query per chunk of owner keys (`{"id": [..]}` for foreign keys,
//! `{"<owner>_id": [..]}` for reverse keys) and the rows are distributed back
//! to their owners. Relationships with a custom parameter builder or resolver
//! cannot be batched and fall back to per-record resolution.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::{Cached, Record};
use crate::schema::EntityType;
use crate::session::Session;
use crate::transport::Criteria;

use super::loader::{expand_through, index_by_id};
use super::metadata::{dedup_values, value_key, Linkage, RelationshipSpec};
use super::polymorphic::OwnerRef;

type IncludeFuture<'a> = Pin<Box<dyn Future<Output = ModelResult<()>> + Send + 'a>>;

/// Counters reported by an include pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeStats {
    /// Transport queries issued by batched relationships
    pub query_count: usize,
    /// Target rows fetched by batched relationships
    pub record_count: usize,
    /// Records resolved one at a time because their relationship cannot be batched
    pub fallback_count: usize,
}

/// Batched relationship loader over one session
pub struct EagerLoader<'s> {
    session: &'s Session,
    batch_size: usize,
}

impl<'s> EagerLoader<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            batch_size: session.config().eager_batch_size.max(1),
        }
    }

    /// Maximum number of keys sent in one query
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolve every relationship in `names` on every record of `records`.
    /// The records must share one type; unbound records are bound first and
    /// relationships already resolved are left as they are.
    pub async fn load(&self, records: &mut [Record], names: &[&str]) -> ModelResult<IncludeStats> {
        let mut stats = IncludeStats::default();
        let Some(first) = records.first() else {
            return Ok(stats);
        };
        let entity = Arc::clone(first.entity());

        if let Some(other) = records.iter().find(|r| r.type_name() != entity.name()) {
            return Err(ModelError::schema(
                other.context(),
                format!("include needs records of one type, expected {}", entity.name()),
            ));
        }
        for record in records.iter_mut() {
            record.bind(self.session);
        }

        for name in names {
            self.include(&entity, records, name, &mut stats).await?;
        }

        debug!(
            entity = entity.name(),
            records = records.len(),
            relationships = names.len(),
            queries = stats.query_count,
            fallbacks = stats.fallback_count,
            "include finished"
        );
        Ok(stats)
    }

    fn include<'a>(
        &'a self,
        entity: &'a Arc<EntityType>,
        records: &'a mut [Record],
        name: &'a str,
        stats: &'a mut IncludeStats,
    ) -> IncludeFuture<'a> {
        Box::pin(async move {
            let spec = entity
                .relationship(name)
                .ok_or_else(|| ModelError::lookup(name, entity.context().with_field(name)))?
                .clone();

            let pending: Vec<usize> = (0..records.len())
                .filter(|&i| !records[i].is_resolved(name))
                .collect();
            if pending.is_empty() {
                return Ok(());
            }

            let context = entity.context().with_field(name);
            let target = self.session.registry().resolve_target(spec.target(), context)?;

            if !is_batchable(&spec) {
                for &i in &pending {
                    records[i].ensure_resolved(name).await?;
                    stats.fallback_count += 1;
                }
                return Ok(());
            }

            match spec.linkage().clone() {
                Linkage::ForeignKey { field } => {
                    let ids = dedup_values(pending.iter().filter_map(|&i| records[i].get(&field)));
                    let rows = self.fetch(&target, "id", ids, Criteria::new(), stats).await?;
                    let by_id = group_rows(rows, "id");

                    for &i in &pending {
                        let row = records[i]
                            .get(&field)
                            .and_then(|fk| by_id.get(&value_key(fk)))
                            .and_then(|rows| rows.first());
                        let cached = match row {
                            Some(row) => Cached::One(Some(Box::new(self.session.materialize_record(&target, row)?))),
                            None => Cached::One(None),
                        };
                        records[i].relations.insert(name.to_string(), cached);
                    }
                }
                Linkage::ReverseKey { key, attr } => {
                    let values = dedup_values(pending.iter().filter_map(|&i| records[i].get(&attr)));
                    let rows = self.fetch(&target, &key, values, Criteria::new(), stats).await?;
                    let groups = group_rows(rows, &key);
                    self.distribute(records, &pending, name, &target, &groups, |owner| {
                        owner.get(&attr).map(value_key)
                    })?;
                }
                Linkage::Polymorphic { keys, attr } => {
                    let values = dedup_values(pending.iter().filter_map(|&i| records[i].get(&attr)));
                    let mut base = Criteria::new();
                    base.insert(keys.kind.clone(), Value::String(entity.name().to_string()));
                    let rows = self.fetch(&target, &keys.id, values, base, stats).await?;
                    let owned: Vec<Value> = rows
                        .into_iter()
                        .filter(|row| row.get(&keys.kind).and_then(Value::as_str) == Some(entity.name()))
                        .collect();
                    let groups = group_rows(owned, &keys.id);
                    self.distribute(records, &pending, name, &target, &groups, |owner| {
                        OwnerRef::of(owner, &attr).map(|owner_ref| value_key(&owner_ref.id))
                    })?;
                }
                Linkage::Through(config) => {
                    self.include(entity, records, &config.relationship, stats).await?;

                    let ids = dedup_values(
                        pending
                            .iter()
                            .filter_map(|&i| records[i].cached_many(&config.relationship))
                            .flatten()
                            .filter_map(|row| row.get(&config.foreign_key)),
                    );
                    let rows = self.fetch(&target, "id", ids, Criteria::new(), stats).await?;
                    let fetched = rows
                        .iter()
                        .map(|row| self.session.materialize_record(&target, row))
                        .collect::<ModelResult<Vec<_>>>()?;
                    let by_id = index_by_id(fetched);

                    for &i in &pending {
                        let expanded = {
                            let via = records[i].cached_many(&config.relationship).unwrap_or_default();
                            expand_through(via, &config.foreign_key, &by_id)
                        };
                        records[i].relations.insert(name.to_string(), Cached::Many(expanded));
                    }
                }
                Linkage::Custom => {}
            }

            Ok(())
        })
    }

    /// One query per chunk of `values` on `key`, merged in order
    async fn fetch(
        &self,
        target: &EntityType,
        key: &str,
        values: Vec<Value>,
        base: Criteria,
        stats: &mut IncludeStats,
    ) -> ModelResult<Vec<Value>> {
        let mut rows = Vec::new();
        for chunk in values.chunks(self.batch_size) {
            let mut criteria = base.clone();
            criteria.insert(key.to_string(), Value::Array(chunk.to_vec()));

            debug!(entity = target.name(), key, batch = chunk.len(), "include batch query");
            let batch = self
                .session
                .transport()
                .query(target.name(), &criteria)
                .await
                .map_err(|e| self.session.transport_error(target, e))?;

            stats.query_count += 1;
            stats.record_count += batch.len();
            rows.extend(batch);
        }
        Ok(rows)
    }

    fn distribute<F>(
        &self,
        records: &mut [Record],
        pending: &[usize],
        name: &str,
        target: &Arc<EntityType>,
        groups: &HashMap<String, Vec<Value>>,
        owner_key: F,
    ) -> ModelResult<()>
    where
        F: Fn(&Record) -> Option<String>,
    {
        for &i in pending {
            let rows = owner_key(&records[i])
                .and_then(|key| groups.get(&key))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let related = rows
                .iter()
                .map(|row| self.session.materialize_record(target, row))
                .collect::<ModelResult<Vec<_>>>()?;
            records[i].relations.insert(name.to_string(), Cached::Many(related));
        }
        Ok(())
    }
}

/// Only the generated parameter builders with the built-in resolver have a
/// structure that can be turned into one query for many owners.
fn is_batchable(spec: &RelationshipSpec) -> bool {
    !matches!(spec.linkage(), Linkage::Custom) && spec.resolver() == spec.kind().default_resolver()
}

/// Rows grouped by the value of `key`, row order preserved within a group
fn group_rows(rows: Vec<Value>, key: &str) -> HashMap<String, Vec<Value>> {
    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    for row in rows {
        let Some(value) = row.get(key).filter(|value| !value.is_null()) else {
            continue;
        };
        groups.entry(value_key(value)).or_default().push(row);
    }
    groups
}

impl Session {
    /// Pre-resolve `names` across `records` with batched queries
    pub async fn include(&self, records: &mut [Record], names: &[&str]) -> ModelResult<IncludeStats> {
        EagerLoader::new(self).load(records, names).await
    }
}
