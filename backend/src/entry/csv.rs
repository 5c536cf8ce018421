//! Entry built from one CSV row.

use serde_json::{json, Map, Value};

use super::EntryImportBehavior;
use crate::config::ImporterConfig;
use crate::enrich;
use crate::error::{EntryResult, ValidationError};
use crate::import::ImportContext;
use crate::models::{Entry, ImporterRun, ObjectKind, ParsedMetadata, RawRecord};
use crate::normalize::{normalize, strip_enumeration};

pub const MEMBER_OF_COLLECTIONS: &str = "member_of_collections_attributes";

#[derive(Debug, Clone)]
pub struct CsvEntry {
    entry: Entry,
}

impl CsvEntry {
    pub fn new(entry: Entry) -> Self {
        Self { entry }
    }

    pub fn from_record(identifier: impl Into<String>, raw_record: RawRecord, run: &ImporterRun) -> Self {
        Self::new(Entry::new(identifier, raw_record, run))
    }

    pub fn into_entry(self) -> Entry {
        self.entry
    }

    /// Non-blank value of the source identifier column.
    pub fn source_identifier_value(&self, config: &ImporterConfig) -> Option<String> {
        let value = match self.entry.raw_record.get(&config.source_identifier)? {
            Value::Array(items) => items.first()?,
            other => other,
        };
        let id = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!id.is_empty()).then_some(id)
    }

    /// Collection identifiers from the collection column and its enumerated
    /// variants, `|`-separated, first occurrence kept.
    pub fn collection_identifiers(&self, config: &ImporterConfig) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for (key, value) in &self.entry.raw_record {
            if strip_enumeration(key).0 != config.collection_field {
                continue;
            }
            let raw: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for id in raw.iter().flat_map(|v| v.split('|')).map(str::trim) {
                if !id.is_empty() && !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }

    /// Metadata key the source identifier column normalizes to.
    fn source_identifier_key<'c>(config: &'c ImporterConfig) -> &'c str {
        config
            .field_mapping
            .field_for_source(&config.source_identifier)
            .map(|(name, _)| name)
            .unwrap_or(&config.source_identifier)
    }

    fn add_collections(&self, metadata: &mut ParsedMetadata, config: &ImporterConfig) {
        metadata.remove(&config.collection_field);
        let ids = self.collection_identifiers(config);
        if ids.is_empty() {
            return;
        }
        let members: Map<String, Value> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| (i.to_string(), json!({ "id": id })))
            .collect();
        metadata.insert(MEMBER_OF_COLLECTIONS, Value::Object(members));
    }
}

impl EntryImportBehavior for CsvEntry {
    fn entry(&self) -> &Entry {
        &self.entry
    }

    fn entry_mut(&mut self) -> &mut Entry {
        &mut self.entry
    }

    fn build_metadata(&mut self, ctx: &ImportContext<'_>) -> EntryResult<()> {
        let config = ctx.config;
        let identifier = self
            .source_identifier_value(config)
            .ok_or_else(|| ValidationError::MissingSourceIdentifier(config.source_identifier.clone()))?;

        let mut metadata = normalize(&self.entry.raw_record, &config.field_mapping);
        metadata.remove(Self::source_identifier_key(config));
        metadata.insert(config.work_identifier.as_str(), json!([identifier]));

        let missing: Vec<String> = config
            .required_elements
            .iter()
            .filter(|field| !metadata.is_present(field))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.entry.parsed_metadata = metadata;
            return Err(ValidationError::MissingRequired(missing).into());
        }

        enrich::apply_defaults(&mut metadata, config);
        self.add_collections(&mut metadata, config);
        self.entry.parsed_metadata = metadata;
        Ok(())
    }

    fn collections_created(&self, ctx: &ImportContext<'_>) -> bool {
        self.collection_identifiers(ctx.config).iter().all(|id| {
            ctx.factory
                .find(id)
                .is_some_and(|handle| handle.kind == ObjectKind::Collection)
        })
    }
}
