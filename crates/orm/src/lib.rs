//! # labbind-orm: Object mapping for laboratory JSON resources
//!
//! Maps remote JSON resources into in-memory records whose relationships are
//! resolved lazily through a bound session instead of server-side joins.
//!
//! - [`registry`]: name to entity type catalog, consulted on first use
//! - [`schema`]: fields and relationships of each entity type
//! - [`relationships`]: the six relationship shapes, resolvers, lazy and eager loading
//! - [`marshaller`]: recursive load and depth-bounded dump
//! - [`model`]: the record base
//! - [`session`]: binding records to a transport and registry
//! - [`models`]: the Aquarium schema catalog

pub mod error;
pub mod marshaller;
pub mod model;
pub mod models;
pub mod naming;
pub mod registry;
pub mod relationships;
pub mod schema;
pub mod session;
pub mod transport;

pub use error::{json_kind, ErrorContext, ModelError, ModelResult, OrmError, OrmResult, RecordId};
pub use marshaller::{DumpOptions, Marshaller};
pub use model::{Record, RelationState, Related};
pub use registry::{ModelRegistry, RegistryStats};
pub use relationships::{
    Cardinality, EagerLoader, IncludeStats, OwnerKeys, OwnerRef, QueryParams, Relationship, RelationshipKind,
    RelationshipSpec, ResolveContext, Resolved, Resolver,
};
pub use schema::{EntityType, EntityTypeBuilder, FieldKind, FieldSpec, Loaded};
pub use session::{ModelInterface, Session};
pub use transport::{criteria, Criteria, Transport, TransportError};

/// Commonly used items
pub mod prelude {
    pub use crate::error::{ModelError, ModelResult};
    pub use crate::marshaller::DumpOptions;
    pub use crate::model::{Record, RelationState};
    pub use crate::registry::ModelRegistry;
    pub use crate::relationships::{OwnerKeys, QueryParams, Relationship};
    pub use crate::schema::{EntityType, FieldSpec, Loaded};
    pub use crate::session::Session;
    pub use crate::transport::{criteria, Criteria, Transport, TransportError};
}
