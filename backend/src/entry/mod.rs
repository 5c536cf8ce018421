//! Entry import behavior.
//!
//! Every entry variant implements [`EntryImportBehavior`]: it owns an
//! [`Entry`], knows how to build its metadata, and may gate persistence on
//! its collections existing. The shared build sequence lives in
//! [`crate::import::build_for_importer`].

pub mod csv;

use crate::error::{EntryResult, FatalError};
use crate::import::ImportContext;
use crate::models::{Entry, ObjectHandle};

pub use self::csv::CsvEntry;

pub trait EntryImportBehavior {
    fn entry(&self) -> &Entry;

    fn entry_mut(&mut self) -> &mut Entry;

    /// Normalize, validate and enrich the raw record into
    /// `entry.parsed_metadata`. The only step allowed to fail validation.
    fn build_metadata(&mut self, ctx: &ImportContext<'_>) -> EntryResult<()>;

    /// Whether the collections this entry belongs to already exist.
    ///
    /// Must be side-effect free.
    fn collections_created(&self, _ctx: &ImportContext<'_>) -> bool {
        true
    }

    fn build_for_importer(&mut self, ctx: &ImportContext<'_>) -> Result<Option<ObjectHandle>, FatalError> {
        crate::import::build_for_importer(self, ctx)
    }
}
