//! Domain types shared across all Cadence services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; `infra/` converts at the edges.

pub mod business_hours;
pub mod id;
pub mod status;
