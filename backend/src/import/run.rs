//! Running a batch of entries.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::ImportContext;
use crate::config::ImporterConfig;
use crate::entry::{CsvEntry, EntryImportBehavior};
use crate::error::FatalError;
use crate::logs::{log_error, log_info, log_success};
use crate::models::{EntryStatus, ImporterRun, RawRecord};

/// Per-status tally of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub total: usize,
    pub complete: usize,
    pub failed: usize,
    pub pending: usize,
}

impl RunReport {
    fn tally<E: EntryImportBehavior>(run: &ImporterRun, entries: &[E]) -> Self {
        let count = |status: EntryStatus| entries.iter().filter(|e| e.entry().status == status).count();
        Self {
            run_id: run.id,
            total: entries.len(),
            complete: count(EntryStatus::Complete),
            failed: count(EntryStatus::Failed),
            pending: count(EntryStatus::Pending),
        }
    }
}

/// A run stopped by a fatal fault.
#[derive(Debug, Clone)]
pub struct RunHalted {
    /// Tally at the moment of the stop; unprocessed entries are pending.
    pub report: RunReport,
    pub cause: FatalError,
}

impl fmt::Display for RunHalted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} complete, {} failed, {} pending)",
            self.cause, self.report.complete, self.report.failed, self.report.pending
        )
    }
}

impl std::error::Error for RunHalted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// One [`CsvEntry`] per record.
///
/// The identifier is the record's source identifier, or `row-N` (1-based)
/// when the column is blank; such entries fail validation when built.
pub fn entries_from_records(records: Vec<RawRecord>, config: &ImporterConfig, run: &ImporterRun) -> Vec<CsvEntry> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let mut entry = CsvEntry::from_record(String::new(), raw, run);
            let identifier = entry
                .source_identifier_value(config)
                .unwrap_or_else(|| format!("row-{}", i + 1));
            entry.entry_mut().identifier = identifier;
            entry
        })
        .collect()
}

/// Build every entry in order, stopping at the first fatal fault.
pub fn run_import<E: EntryImportBehavior>(entries: &mut [E], ctx: &ImportContext<'_>) -> Result<RunReport, RunHalted> {
    log_info(format!(
        "Run {} ({}): {} entries",
        ctx.run.id,
        ctx.run.importer_name,
        entries.len()
    ));

    let mut halted = None;
    for entry in entries.iter_mut() {
        if let Err(cause) = entry.build_for_importer(ctx) {
            halted = Some(cause);
            break;
        }
    }

    let report = RunReport::tally(ctx.run, &*entries);
    if let Some(cause) = halted {
        log_error(format!("Run {} halted: {}", ctx.run.id, cause));
        return Err(RunHalted { report, cause });
    }
    log_success(format!(
        "Run {} finished: {} complete, {} failed",
        ctx.run.id, report.complete, report.failed
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::InMemoryFactory;
    use crate::registry::TypeRegistry;
    use crate::relationships::InMemoryQueue;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    #[test]
    fn test_identifiers_from_records() {
        let config = ImporterConfig::default();
        let run = ImporterRun::start("test");
        let entries = entries_from_records(
            records(vec![
                json!({ "source_identifier": "w1", "title": "a" }),
                json!({ "source_identifier": "", "title": "b" }),
            ]),
            &config,
            &run,
        );

        let ids: Vec<_> = entries.iter().map(|e| e.entry().identifier.as_str()).collect();
        assert_eq!(ids, vec!["w1", "row-2"]);
    }

    #[test]
    fn test_failed_entry_does_not_stop_run() {
        let config = ImporterConfig::default();
        let run = ImporterRun::start("test");
        let registry = TypeRegistry::from_config(&config);
        let factory = InMemoryFactory::new();
        let queue = InMemoryQueue::new();
        let ctx = ImportContext::new(&config, &run, &registry, &factory, &queue);

        let mut entries = entries_from_records(
            records(vec![
                json!({ "source_identifier": "w1", "title": "a" }),
                json!({ "source_identifier": "w2" }),
                json!({ "source_identifier": "w3", "title": "c" }),
            ]),
            &config,
            &run,
        );

        let report = run_import(&mut entries, &ctx).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.complete, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.pending, 0);
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_fatal_fault_halts_with_rest_pending() {
        let config = ImporterConfig::default();
        let run = ImporterRun::start("test");
        let registry = TypeRegistry::from_config(&config);
        let factory = InMemoryFactory::new();
        let queue = InMemoryQueue::new();
        let ctx = ImportContext::new(&config, &run, &registry, &factory, &queue);

        let mut entries = entries_from_records(
            records(vec![
                json!({ "source_identifier": "w1", "title": "a" }),
                json!({ "source_identifier": "w2", "title": "b", "collection": "nowhere" }),
                json!({ "source_identifier": "w3", "title": "c" }),
            ]),
            &config,
            &run,
        );

        let halted = run_import(&mut entries, &ctx).unwrap_err();
        assert!(matches!(halted.cause, FatalError::CollectionsNotCreated(_)));
        assert_eq!(halted.report.complete, 1);
        assert_eq!(halted.report.failed, 0);
        assert_eq!(halted.report.pending, 2);
        assert_eq!(entries[2].entry().status, EntryStatus::Pending);
    }
}
