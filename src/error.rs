//! Application error types for datadog-entity-sync
//!
//! This module defines the error types shared across the sync engine, the
//! catalog and Datadog clients, and the scheduler. All error types use
//! `thiserror` for ergonomic error handling.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the software catalog client
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    /// Network-level failure talking to the catalog
    #[error("Catalog network error: {0}")]
    Network(String),

    /// Catalog rejected the service credentials
    #[error("Catalog request unauthorized")]
    Unauthorized,

    /// Catalog answered with an unexpected status
    #[error("Catalog returned HTTP {0}")]
    Status(u16),

    /// Catalog response could not be decoded
    #[error("Invalid catalog response: {0}")]
    InvalidData(String),
}

/// Errors returned when obtaining service credentials
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// No credentials are configured for this service
    #[error("No service credentials configured")]
    MissingCredentials,

    /// Credentials could not be issued
    #[error("Failed to issue service credentials: {0}")]
    Issue(String),
}

/// Errors returned by the Datadog registry API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Rate limited by Datadog
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Datadog answered with a non-success status
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Datadog rejected the record
    #[error("Record rejected: HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error detail returned by Datadog
        message: String,
    },

    /// API or application key refused
    #[error("Unauthorized")]
    Unauthorized,

    /// Response body could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised while turning a catalog entity into a Datadog record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializeError {
    /// The entity is not of the kind this serializer accepts
    #[error("Only Components are allowed to be synced, and {0} is not a component.")]
    NotAComponent(String),

    /// The serializer produced no record for the entity
    #[error("The entity {0} was unable to be processed.")]
    Unprocessable(String),
}

/// Errors that abort a whole sync run
///
/// Per-entity failures never surface here; only the fetch and preload
/// steps can fail a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Fetching entities from the catalog failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Service credentials could not be obtained
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The preload step failed
    #[error("Preload failed: {0}")]
    Preload(String),
}

/// Errors raised when registering a task with a task runner
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    /// The schedule definition cannot be run
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A task with this id is already registered
    #[error("Task already registered: {0}")]
    AlreadyRegistered(String),
}

/// Entity filter parsing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// A filter segment does not follow `key=value`
    #[error("Invalid filter format: '{0}'. Expected format is 'key=value'")]
    InvalidFormat(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote side before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl RetryableError for RegistryError {
    fn is_retryable(&self) -> bool {
        match self {
            RegistryError::NetworkTimeout => true,
            RegistryError::ConnectionRefused => true,
            RegistryError::RateLimited(_) => true,
            RegistryError::ServerError(code) if *code >= 500 => true,
            RegistryError::Network(_) => true,

            RegistryError::ServerError(_) => false,
            RegistryError::Rejected { .. } => false,
            RegistryError::Unauthorized => false,
            RegistryError::InvalidData(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RegistryError::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}
