//! Relationship Descriptors - declarative lazy joins between entity types
//!
//! Six shapes (`One`, `Many`, `HasOne`, `HasMany`, `HasManyGeneric`,
//! `HasManyThrough`), named resolvers that fetch their targets, lazy
//! per-record access, and a batched include pass.

pub mod descriptor;
pub mod eager_loading;
pub mod loader;
pub mod metadata;
pub mod polymorphic;
pub mod resolver;

pub use descriptor::Relationship;
pub use eager_loading::{EagerLoader, IncludeStats};
pub use metadata::{
    Cardinality, Linkage, ParamBuilder, QueryParams, RelationshipKind, RelationshipSpec, ThroughConfig,
};
pub use polymorphic::{OwnerKeys, OwnerRef};
pub use resolver::{FindResolver, QueryResolver, ResolveContext, Resolved, Resolver};
