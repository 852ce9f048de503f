//! datadog-entity-sync - Software catalog to Datadog entity synchronization
//!
//! This crate reads components and groups from a Backstage-style catalog,
//! serializes them into Datadog service definitions and pushes them on a
//! schedule, on an event, or as a dry run over HTTP.

pub mod catalog;
pub mod config;
pub mod datadog;
pub mod error;
pub mod events;
pub mod jobs;
pub mod otel;
pub mod serializers;
pub mod server;
pub mod sync;
