//! Error types for the Bulkload import pipeline.
//!
//! Errors are split by the two-tier failure policy of an import run:
//!
//! - [`EntryError`] - anything that can go wrong while building one entry
//! - [`FatalError`] - the subset of entry faults that must halt the run
//!
//! Everything that is not fatal is captured on the entry itself as
//! [`crate::models::ErrorInfo`] and the run moves on to the next entry.
//!
//! Lower-level errors ([`ValidationError`], [`FactoryError`], [`QueueError`],
//! [`CollectionsCreatedError`]) convert into [`EntryError`] via `From`, so `?`
//! works across the build steps.

use thiserror::Error;

pub use crate::parser::CsvError;

// =============================================================================
// Validation Errors
// =============================================================================

/// Required metadata is missing from a record.
///
/// Only the metadata-build step raises these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required elements are absent after normalization.
    #[error("Missing required elements, missing element(s) are: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    /// The record has no value in its source identifier column.
    #[error("Missing source identifier column '{0}'")]
    MissingSourceIdentifier(String),
}

// =============================================================================
// Factory Errors
// =============================================================================

/// Errors raised by an [`crate::factory::ObjectFactory`] while persisting.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The search index could not be reached. Halts the run.
    #[error("Search index communication failed: {0}")]
    IndexCommunication(String),

    /// No object type was resolved for the entry.
    #[error("No object type resolved for '{0}'")]
    UnresolvedType(String),

    /// Generic persistence failure.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// IO error from an on-disk store.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error from an on-disk store.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Relationship Queue Errors
// =============================================================================

/// Errors from a [`crate::relationships::RelationshipQueue`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Nobody is listening on the queue anymore.
    #[error("Relationship queue is closed")]
    Closed,
}

// =============================================================================
// Collections Prerequisite
// =============================================================================

/// Collections referenced by an entry do not exist yet.
///
/// Not a per-entry failure: the run must stop so collections can be created
/// first.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Collections referenced by entry '{entry_identifier}' have not been created")]
pub struct CollectionsCreatedError {
    pub entry_identifier: String,
}

// =============================================================================
// Entry Errors
// =============================================================================

/// Every fault that can occur while building a single entry.
#[derive(Debug, Error)]
pub enum EntryError {
    /// Required metadata missing.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Collections prerequisite not met.
    #[error(transparent)]
    CollectionsNotCreated(#[from] CollectionsCreatedError),

    /// Persistence failure.
    #[error(transparent)]
    Factory(#[from] FactoryError),

    /// Relationship request could not be enqueued.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Any other processing fault.
    #[error("{0}")]
    Processing(String),
}

impl EntryError {
    /// Whether this fault halts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EntryError::CollectionsNotCreated(_)
                | EntryError::Factory(FactoryError::IndexCommunication(_))
        )
    }

    /// Split the fatal kinds out, handing recoverable faults back.
    pub fn into_fatal(self) -> Result<FatalError, EntryError> {
        match self {
            EntryError::CollectionsNotCreated(e) => Ok(FatalError::CollectionsNotCreated(e)),
            EntryError::Factory(FactoryError::IndexCommunication(msg)) => {
                Ok(FatalError::IndexCommunication(msg))
            }
            other => Err(other),
        }
    }

    /// Stable class name recorded in the entry's error info.
    pub fn class_name(&self) -> &'static str {
        match self {
            EntryError::Validation(_) => "ValidationError",
            EntryError::CollectionsNotCreated(_) => "CollectionsCreatedError",
            EntryError::Factory(FactoryError::IndexCommunication(_)) => "IndexCommunicationError",
            EntryError::Factory(_) | EntryError::Queue(_) | EntryError::Processing(_) => {
                "GenericProcessingError"
            }
        }
    }
}

// =============================================================================
// Fatal Errors
// =============================================================================

/// Faults that propagate out of `build_for_importer` and stop the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// Prerequisite collections are missing.
    #[error(transparent)]
    CollectionsNotCreated(CollectionsCreatedError),

    /// The search index is unreachable.
    #[error("Search index communication failed: {0}")]
    IndexCommunication(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading importer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for an importer.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantically invalid configuration.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Run Errors (top-level)
// =============================================================================

/// Top-level errors returned by the CLI commands.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CSV reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Object store error.
    #[error("Store error: {0}")]
    Store(#[from] FactoryError),

    /// The run was stopped by a fatal fault.
    #[error("Import halted: {0}")]
    Halted(#[from] FatalError),

    /// Failed to write an output file.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Command-level failure, e.g. an unknown object id.
    #[error("{0}")]
    Command(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for a single entry build step.
pub type EntryResult<T> = Result<T, EntryError>;

/// Result type for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
