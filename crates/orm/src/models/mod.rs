//! Schema catalogs for concrete services

pub mod aquarium;
