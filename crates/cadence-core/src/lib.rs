//! Ambient plumbing shared by Cadence services: env config, tracing, health probes.

pub mod config;
pub mod health;
pub mod tracing;
