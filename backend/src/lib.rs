//! # Bulkload - entry-import orchestration
//!
//! Bulkload turns externally-sourced metadata records (CSV rows) into
//! persisted repository objects, schedules parent/child relationship work,
//! and records a status per record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌───────────────┐
//! │ CSV File │──▶│  Parser   │──▶│ Normalizer │──▶│ Factory  │──▶│ Relationship  │
//! │          │   │ (auto-enc)│   │ + Enricher │   │ (persist)│   │    queue      │
//! └──────────┘   └───────────┘   └────────────┘   └──────────┘   └───────────────┘
//! ```
//!
//! A missing field fails only its own entry. Missing collections or an
//! unreachable search index halt the whole run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bulkload::*;
//!
//! let config = ImporterConfig::from_json_file("importer.json")?;
//! let parsed = parse_csv_file_auto("works.csv")?;
//! let run = ImporterRun::start(&config.name);
//! let registry = TypeRegistry::from_config(&config);
//! let factory = InMemoryFactory::new();
//! let queue = InMemoryQueue::new();
//! let ctx = ImportContext::new(&config, &run, &registry, &factory, &queue);
//!
//! let mut entries = entries_from_records(parsed.records, &config, &run);
//! let report = run_import(&mut entries, &ctx)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types and the fatal/recoverable split
//! - [`logs`] - Log broadcasting
//! - [`models`] - Entries, runs, metadata and handles
//! - [`config`] - Importer configuration and field mapping
//! - [`parser`] - CSV parsing with auto-detection
//! - [`normalize`] - Raw record to parsed metadata
//! - [`enrich`] - Configured defaults
//! - [`registry`] - Object types and type resolution
//! - [`factory`] / [`store`] - Persistence
//! - [`relationships`] - Relationship requests and queues
//! - [`entry`] - Entry behavior and the CSV entry
//! - [`import`] - Build orchestration and runs

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Metadata
pub mod enrich;
pub mod normalize;

// Types and persistence
pub mod factory;
pub mod registry;
pub mod store;

// Relationships
pub mod relationships;

// Orchestration
pub mod entry;
pub mod import;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CollectionsCreatedError,
    ConfigError,
    EntryError,
    FactoryError,
    FatalError,
    QueueError,
    RunError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Entry,
    EntryStatus,
    ErrorInfo,
    ImporterRun,
    ObjectHandle,
    ObjectKind,
    ParsedMetadata,
    RawRecord,
    TypeHandle,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{FieldMapping, FieldSpec, ImporterConfig, ParserFields, Split};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv_file_auto,
    CsvError,
    ParseResult,
};

// =============================================================================
// Re-exports - Metadata
// =============================================================================

pub use enrich::{add_admin_set_id, add_rights_statement, add_visibility, apply_defaults};
pub use normalize::{normalize, FieldNormalizer};

// =============================================================================
// Re-exports - Types and persistence
// =============================================================================

pub use factory::{FactoryRequest, FileOptions, InMemoryFactory, ObjectFactory, StoredObject};
pub use registry::{resolve_factory_type, TypeRegistry};
pub use store::JsonObjectStore;

// =============================================================================
// Re-exports - Relationships
// =============================================================================

pub use relationships::{
    schedule_child_relationships,
    schedule_parent_relationships,
    ChannelQueue,
    InMemoryQueue,
    RelationshipQueue,
    RelationshipRequest,
};

// =============================================================================
// Re-exports - Orchestration
// =============================================================================

pub use entry::{CsvEntry, EntryImportBehavior};
pub use import::run::{entries_from_records, run_import, RunHalted, RunReport};
pub use import::{build_for_importer, BuildState, ImportContext};
