//! Model Registry - name to entity type catalog with late-bound lookup
//!
//! Relationship targets are plain type names. They are looked up here the
//! first time a relationship is loaded or resolved, so mutually referencing
//! types can be registered in any order and a typo surfaces as a lookup
//! error naming the missing type.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ErrorContext, ModelError, ModelResult};
use crate::marshaller::Marshaller;
use crate::relationships::resolver::{self, FindResolver, QueryResolver, Resolver};
use crate::schema::{EntityType, Loaded};

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_models: usize,
    pub total_relationships: usize,
    pub total_resolvers: usize,
}

/// Thread-safe catalog of entity types and named resolvers
pub struct ModelRegistry {
    models: DashMap<String, Arc<EntityType>>,
    resolvers: DashMap<String, Arc<dyn Resolver>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Empty catalog with the built-in `find` and `query` resolvers
    pub fn new() -> Self {
        let resolvers: DashMap<String, Arc<dyn Resolver>> = DashMap::new();
        resolvers.insert(resolver::FIND.to_string(), Arc::new(FindResolver));
        resolvers.insert(resolver::QUERY.to_string(), Arc::new(QueryResolver));

        Self {
            models: DashMap::new(),
            resolvers,
        }
    }

    /// Register an entity type. A name may be registered once.
    pub fn register(&self, entity: EntityType) -> ModelResult<Arc<EntityType>> {
        let name = entity.name().to_string();
        let entity = Arc::new(entity);
        match self.models.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => Err(ModelError::schema(
                ErrorContext::new(occupied.key().clone()),
                "entity type is already registered",
            )),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                debug!(
                    entity = entity.name(),
                    fields = entity.fields().len(),
                    relationships = entity.relationships().len(),
                    "registered entity type"
                );
                vacant.insert(Arc::clone(&entity));
                Ok(entity)
            }
        }
    }

    /// Register an entity type, replacing any earlier registration of the same name
    pub fn register_or_replace(&self, entity: EntityType) -> Arc<EntityType> {
        let entity = Arc::new(entity);
        if self
            .models
            .insert(entity.name().to_string(), Arc::clone(&entity))
            .is_some()
        {
            warn!(entity = entity.name(), "replaced existing entity type registration");
        }
        entity
    }

    /// Look up an entity type by name
    pub fn resolve(&self, name: &str) -> ModelResult<Arc<EntityType>> {
        self.resolve_target(name, ErrorContext::new(name))
    }

    /// Look up a relationship target, reporting `context` on failure
    pub(crate) fn resolve_target(&self, name: &str, context: ErrorContext) -> ModelResult<Arc<EntityType>> {
        self.models
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ModelError::lookup(name, context))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Register a named resolver, replacing any resolver of the same name
    pub fn register_resolver<R>(&self, name: impl Into<String>, resolver: R)
    where
        R: Resolver + 'static,
    {
        let name = name.into();
        debug!(resolver = %name, "registered resolver");
        self.resolvers.insert(name, Arc::new(resolver));
    }

    pub(crate) fn resolver(&self, name: &str, context: ErrorContext) -> ModelResult<Arc<dyn Resolver>> {
        self.resolvers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ModelError::lookup(name, context))
    }

    pub fn has_resolver(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Load a payload as the named type, unbound
    pub fn load(&self, type_name: &str, payload: &Value) -> ModelResult<Loaded> {
        let entity = self.resolve(type_name)?;
        Marshaller::new(self).load(&entity, payload)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_models: self.models.len(),
            total_relationships: self
                .models
                .iter()
                .map(|entry| entry.value().relationships().len())
                .sum(),
            total_resolvers: self.resolvers.len(),
        }
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
