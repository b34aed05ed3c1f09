//! Record base
//!
//! A [`Record`] keeps every attribute it was loaded with, declared or not,
//! and a cache that distinguishes "not yet queried" from "queried and empty".

mod record;

pub(crate) use record::Cached;
pub use record::{Record, RelationState, Related};
