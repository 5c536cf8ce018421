//! Import orchestration for one entry.
//!
//! ```text
//! Building ──▶ Validating ──┬─▶ ValidateOnlyExit ──┐
//!                           └─▶ Persisting ────────┴─▶ Scheduling ──▶ Done
//! ```
//!
//! Any recoverable fault short-circuits to `Done(Failed)` with the error
//! recorded on the entry. The two fatal faults (missing collections, search
//! index unreachable) leave the entry untouched and are returned to the caller,
//! which is expected to stop the run.

pub mod run;

use std::fmt;

use crate::config::ImporterConfig;
use crate::entry::EntryImportBehavior;
use crate::error::{CollectionsCreatedError, EntryResult, FatalError};
use crate::factory::{FactoryRequest, FileOptions, ObjectFactory};
use crate::logs::{log_error_for, log_info_for, log_success_for, log_warning_for};
use crate::models::{EntryStatus, ImporterRun, ObjectHandle};
use crate::registry::{resolve_factory_type, TypeRegistry};
use crate::relationships::{schedule_child_relationships, schedule_parent_relationships, RelationshipQueue};

/// Shared, read-only collaborators of a run.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    pub config: &'a ImporterConfig,
    pub run: &'a ImporterRun,
    pub registry: &'a TypeRegistry,
    pub factory: &'a dyn ObjectFactory,
    pub queue: &'a dyn RelationshipQueue,
}

impl<'a> ImportContext<'a> {
    pub fn new(
        config: &'a ImporterConfig,
        run: &'a ImporterRun,
        registry: &'a TypeRegistry,
        factory: &'a dyn ObjectFactory,
        queue: &'a dyn RelationshipQueue,
    ) -> Self {
        Self {
            config,
            run,
            registry,
            factory,
            queue,
        }
    }

    pub fn file_options(&self) -> FileOptions {
        FileOptions {
            replace_files: self.config.replace_files,
            update_files: self.config.update_files,
        }
    }
}

/// Steps of a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Building,
    Validating,
    ValidateOnlyExit,
    Persisting,
    Scheduling,
    Done(EntryStatus),
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Building => write!(f, "building"),
            BuildState::Validating => write!(f, "validating"),
            BuildState::ValidateOnlyExit => write!(f, "validate-only exit"),
            BuildState::Persisting => write!(f, "persisting"),
            BuildState::Scheduling => write!(f, "scheduling"),
            BuildState::Done(status) => write!(f, "done ({:?})", status),
        }
    }
}

/// Build one entry: metadata, collections guard, persist, relationships.
///
/// Returns the persisted handle, or `None` under validate-only or when the
/// entry failed before persisting. Status is recorded exactly once unless a
/// fatal fault is returned.
pub fn build_for_importer<E>(entry: &mut E, ctx: &ImportContext<'_>) -> Result<Option<ObjectHandle>, FatalError>
where
    E: EntryImportBehavior + ?Sized,
{
    let mut item = None;
    match run_steps(entry, ctx, &mut item) {
        Ok(()) => {
            entry.entry_mut().mark_complete();
            transition(&entry.entry().identifier, BuildState::Done(EntryStatus::Complete));
            log_success_for(&entry.entry().identifier, "Entry imported");
        }
        Err(err) => match err.into_fatal() {
            Ok(fatal) => {
                log_error_for(&entry.entry().identifier, format!("Run halted: {}", fatal));
                return Err(fatal);
            }
            Err(recoverable) => {
                log_warning_for(
                    &entry.entry().identifier,
                    format!("{}: {}", recoverable.class_name(), recoverable),
                );
                entry.entry_mut().mark_failed(&recoverable);
                transition(&entry.entry().identifier, BuildState::Done(EntryStatus::Failed));
            }
        },
    }
    Ok(item)
}

fn run_steps<E>(entry: &mut E, ctx: &ImportContext<'_>, item: &mut Option<ObjectHandle>) -> EntryResult<()>
where
    E: EntryImportBehavior + ?Sized,
{
    transition(&entry.entry().identifier, BuildState::Building);
    entry.entry_mut().last_run = ctx.run.id;
    entry.build_metadata(ctx)?;

    transition(&entry.entry().identifier, BuildState::Validating);
    if ctx.config.validate_only {
        transition(&entry.entry().identifier, BuildState::ValidateOnlyExit);
    } else {
        if !entry.collections_created(ctx) {
            return Err(CollectionsCreatedError {
                entry_identifier: entry.entry().identifier.clone(),
            }
            .into());
        }
        transition(&entry.entry().identifier, BuildState::Persisting);
        *item = Some(persist(&*entry, ctx)?);
    }

    transition(&entry.entry().identifier, BuildState::Scheduling);
    let mapping = &ctx.config.field_mapping;
    let record = entry.entry();
    let parents = mapping.related_parents_parsed_mapping();
    if record.parsed_metadata.is_present(parents) {
        schedule_parent_relationships(record, parents, ctx.queue)?;
    }
    let children = mapping.related_children_parsed_mapping();
    if record.parsed_metadata.is_present(children) {
        schedule_child_relationships(record, children, ctx.queue)?;
    }
    Ok(())
}

fn persist<E>(entry: &E, ctx: &ImportContext<'_>) -> EntryResult<ObjectHandle>
where
    E: EntryImportBehavior + ?Sized,
{
    let record = entry.entry();
    let type_handle = resolve_factory_type(
        &record.parsed_metadata,
        &ctx.config.field_mapping,
        ctx.registry,
        &ctx.config.default_work_type,
    );
    let handle = ctx.factory.persist(FactoryRequest {
        attributes: &record.parsed_metadata,
        source_identifier_value: &record.identifier,
        work_identifier: &ctx.config.work_identifier,
        type_handle,
        user: ctx.config.user.as_deref(),
        file_options: ctx.file_options(),
    })?;
    log_info_for(&record.identifier, format!("Persisted as {} {}", handle.type_name, handle.id));
    Ok(handle)
}

fn transition(identifier: &str, state: BuildState) {
    log_info_for(identifier, format!("-> {}", state));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldMapping, FieldSpec};
    use crate::entry::CsvEntry;
    use crate::error::{EntryError, FactoryError, FactoryResult};
    use crate::factory::InMemoryFactory;
    use crate::models::{Entry, ObjectKind, RawRecord};
    use crate::relationships::{ChannelQueue, InMemoryQueue};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Factory counting calls and failing on demand.
    #[derive(Default)]
    struct ScriptedFactory {
        inner: InMemoryFactory,
        calls: AtomicUsize,
        fail_with: Option<fn() -> FactoryError>,
    }

    impl ScriptedFactory {
        fn failing(make: fn() -> FactoryError) -> Self {
            Self {
                fail_with: Some(make),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ObjectFactory for ScriptedFactory {
        fn persist(&self, request: FactoryRequest<'_>) -> FactoryResult<ObjectHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(make) => Err(make()),
                None => self.inner.persist(request),
            }
        }

        fn find(&self, source_identifier: &str) -> Option<ObjectHandle> {
            self.inner.find(source_identifier)
        }
    }

    /// Entry whose metadata step fails with a plain processing error.
    struct BrokenEntry(Entry);

    impl EntryImportBehavior for BrokenEntry {
        fn entry(&self) -> &Entry {
            &self.0
        }

        fn entry_mut(&mut self) -> &mut Entry {
            &mut self.0
        }

        fn build_metadata(&mut self, _ctx: &ImportContext<'_>) -> EntryResult<()> {
            Err(EntryError::Processing("unexpected nil".into()))
        }
    }

    struct Fixture {
        config: ImporterConfig,
        run: ImporterRun,
        registry: TypeRegistry,
        factory: ScriptedFactory,
        queue: InMemoryQueue,
    }

    impl Fixture {
        fn new(config: ImporterConfig) -> Self {
            Self::with_factory(config, ScriptedFactory::default())
        }

        fn with_factory(config: ImporterConfig, factory: ScriptedFactory) -> Self {
            Self {
                registry: TypeRegistry::from_config(&config),
                config,
                run: ImporterRun::start("test"),
                factory,
                queue: InMemoryQueue::new(),
            }
        }

        fn ctx(&self) -> ImportContext<'_> {
            ImportContext::new(&self.config, &self.run, &self.registry, &self.factory, &self.queue)
        }

        fn entry(&self, id: &str, record: Value) -> CsvEntry {
            let raw: RawRecord = record.as_object().cloned().unwrap_or_default();
            CsvEntry::from_record(id, raw, &self.run)
        }
    }

    fn config() -> ImporterConfig {
        let mut config = ImporterConfig::default();
        config.visibility = "restricted".into();
        config.admin_set_id = "MyString".into();
        config.parser_fields.rights_statement = Some("http://rightsstatements.org/vocab/InC/1.0/".into());
        config
    }

    #[test]
    fn test_missing_required_field_fails_without_persist() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e1", json!({ "source_identifier": "1", "some_field": "some data" }));

        let item = entry.build_for_importer(&fx.ctx()).unwrap();
        assert!(item.is_none());
        assert_eq!(entry.entry().status, EntryStatus::Failed);
        assert_eq!(fx.factory.calls(), 0);

        let info = entry.entry().last_error.clone().unwrap();
        assert_eq!(info.error_class, "ValidationError");
        assert!(info.error_message.contains("title"));
    }

    #[test]
    fn test_success_adds_defaults_and_completes() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e2", json!({ "source_identifier": "2", "title": "some title" }));

        let item = entry.build_for_importer(&fx.ctx()).unwrap().unwrap();
        assert_eq!(item.type_name, "Work");
        assert_eq!(item.source_identifier, "e2");
        assert_eq!(fx.factory.calls(), 1);

        let record = entry.entry();
        assert_eq!(record.status, EntryStatus::Complete);
        assert!(record.last_error.is_none());
        assert_eq!(record.last_run, fx.run.id);
        assert_eq!(record.parsed_metadata.get("admin_set_id"), Some(&json!("MyString")));
        assert_eq!(record.parsed_metadata.get("visibility"), Some(&json!("restricted")));
        assert_eq!(
            record.parsed_metadata.get("rights_statement"),
            Some(&json!(["http://rightsstatements.org/vocab/InC/1.0/"]))
        );
    }

    #[test]
    fn test_missing_collection_is_fatal_and_status_untouched() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e3", json!({ "source_identifier": "3", "title": "t", "collection": "c9" }));

        let err = entry.build_for_importer(&fx.ctx()).unwrap_err();
        assert!(matches!(err, FatalError::CollectionsNotCreated(ref e) if e.entry_identifier == "e3"));
        assert_eq!(entry.entry().status, EntryStatus::Pending);
        assert!(entry.entry().last_error.is_none());
        assert_eq!(fx.factory.calls(), 0);
    }

    #[test]
    fn test_index_failure_is_fatal() {
        let factory = ScriptedFactory::failing(|| FactoryError::IndexCommunication("connection refused".into()));
        let fx = Fixture::with_factory(config(), factory);
        let mut entry = fx.entry("e4", json!({ "source_identifier": "4", "title": "t" }));

        let err = entry.build_for_importer(&fx.ctx()).unwrap_err();
        assert!(matches!(err, FatalError::IndexCommunication(_)));
        assert_eq!(entry.entry().status, EntryStatus::Pending);
    }

    #[test]
    fn test_generic_persist_failure_is_captured() {
        let factory = ScriptedFactory::failing(|| FactoryError::Persistence("disk full".into()));
        let fx = Fixture::with_factory(config(), factory);
        let mut entry = fx.entry("e5", json!({ "source_identifier": "5", "title": "t" }));

        let item = entry.build_for_importer(&fx.ctx()).unwrap();
        assert!(item.is_none());
        assert_eq!(entry.entry().status, EntryStatus::Failed);
        assert_eq!(entry.entry().last_error.as_ref().unwrap().error_class, "GenericProcessingError");
    }

    #[test]
    fn test_unregistered_model_fails_entry() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e6", json!({ "source_identifier": "6", "title": "t", "model": "Spaceship" }));

        let item = entry.build_for_importer(&fx.ctx()).unwrap();
        assert!(item.is_none());
        assert_eq!(entry.entry().status, EntryStatus::Failed);
        assert_eq!(fx.factory.calls(), 1);
    }

    #[test]
    fn test_processing_error_from_custom_entry_is_captured() {
        let fx = Fixture::new(config());
        let mut entry = BrokenEntry(Entry::new("e7", RawRecord::new(), &fx.run));

        let item = build_for_importer(&mut entry, &fx.ctx()).unwrap();
        assert!(item.is_none());
        assert_eq!(entry.0.status, EntryStatus::Failed);
        assert_eq!(entry.0.last_error.unwrap().error_message, "unexpected nil");
    }

    #[test]
    fn test_parents_schedule_one_request_each() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry(
            "e8",
            json!({ "source_identifier": "8", "title": "t", "parents": "p1|p2|p3" }),
        );

        entry.build_for_importer(&fx.ctx()).unwrap();
        let requests = fx.queue.requests();
        assert_eq!(requests.len(), 3);
        let parents: Vec<_> = requests.iter().filter_map(|r| r.parent_identifier.as_deref()).collect();
        assert_eq!(parents, vec!["p1", "p2", "p3"]);
        assert!(requests.iter().all(|r| r.entry_identifier == "e8" && r.importer_run == fx.run.id));
    }

    #[test]
    fn test_custom_relationship_fields() {
        let mut config = config();
        config.field_mapping = FieldMapping::new()
            .with("parents_column", FieldSpec::from_source("parent").parents())
            .with("children_column", FieldSpec::from_source("child").children());
        let fx = Fixture::new(config);
        let mut entry = fx.entry(
            "e9",
            json!({ "source_identifier": "9", "title": "t", "parent": "p1", "child": "c1|c2" }),
        );

        entry.build_for_importer(&fx.ctx()).unwrap();
        let requests = fx.queue.requests();
        assert_eq!(requests.iter().filter(|r| r.parent_identifier.is_some()).count(), 1);
        assert_eq!(requests.iter().filter(|r| r.child_identifier.is_some()).count(), 2);
    }

    #[test]
    fn test_validate_only_skips_persist_but_schedules() {
        let mut config = config();
        config.validate_only = true;
        let fx = Fixture::new(config);
        let mut entry = fx.entry(
            "e10",
            json!({ "source_identifier": "10", "title": "t", "children": "c1", "collection": "missing" }),
        );

        let item = entry.build_for_importer(&fx.ctx()).unwrap();
        assert!(item.is_none());
        assert_eq!(fx.factory.calls(), 0);
        assert_eq!(entry.entry().status, EntryStatus::Complete);
        assert_eq!(fx.queue.requests().len(), 1);
    }

    #[test]
    fn test_no_requests_when_validation_fails() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e11", json!({ "source_identifier": "11", "parents": "p1" }));

        entry.build_for_importer(&fx.ctx()).unwrap();
        assert_eq!(entry.entry().status, EntryStatus::Failed);
        assert!(fx.queue.requests().is_empty());
    }

    #[test]
    fn test_rebuild_replaces_previous_failure() {
        let fx = Fixture::new(config());
        let mut entry = fx.entry("e12", json!({ "source_identifier": "12" }));
        entry.build_for_importer(&fx.ctx()).unwrap();
        assert_eq!(entry.entry().status, EntryStatus::Failed);

        entry.entry_mut().raw_record.insert("title".into(), json!("now present"));
        entry.build_for_importer(&fx.ctx()).unwrap();
        assert_eq!(entry.entry().status, EntryStatus::Complete);
        assert!(entry.entry().last_error.is_none());
    }

    #[test]
    fn test_existing_collection_allows_persist() {
        let fx = Fixture::new(config());
        let mut collection = fx.entry("c1", json!({ "source_identifier": "c1", "title": "Coll", "model": "Collection" }));
        let handle = collection.build_for_importer(&fx.ctx()).unwrap().unwrap();
        assert_eq!(handle.kind, ObjectKind::Collection);

        let mut work = fx.entry("w1", json!({ "source_identifier": "w1", "title": "t", "collection": "c1" }));
        assert!(work.build_for_importer(&fx.ctx()).unwrap().is_some());
        assert_eq!(work.entry().status, EntryStatus::Complete);
    }

    #[test]
    fn test_closed_queue_fails_entry_after_persist() {
        let fx = Fixture::new(config());
        let (queue, receiver) = ChannelQueue::channel();
        drop(receiver);
        let ctx = ImportContext::new(&fx.config, &fx.run, &fx.registry, &fx.factory, &queue);
        let mut entry = fx.entry("e13", json!({ "source_identifier": "13", "title": "t", "parents": "p1" }));

        let item = entry.build_for_importer(&ctx).unwrap();
        let handle = item.unwrap();
        assert_eq!(handle.source_identifier, "e13");
        assert_eq!(fx.factory.calls(), 1);
        assert_eq!(entry.entry().status, EntryStatus::Failed);
        assert_eq!(entry.entry().last_error.as_ref().unwrap().error_class, "GenericProcessingError");
    }

    #[test]
    fn test_entries_build_concurrently_on_shared_context() {
        let fx = Fixture::new(config());
        let ctx = fx.ctx();
        let mut first = fx.entry("e14", json!({ "source_identifier": "14", "title": "a", "parents": "p1" }));
        let mut second = fx.entry("e15", json!({ "source_identifier": "15", "title": "b", "children": "c1" }));

        thread::scope(|scope| {
            let ctx = &ctx;
            let a = scope.spawn(|| first.build_for_importer(ctx));
            let b = scope.spawn(|| second.build_for_importer(ctx));
            assert!(a.join().unwrap().unwrap().is_some());
            assert!(b.join().unwrap().unwrap().is_some());
        });

        assert_eq!(first.entry().status, EntryStatus::Complete);
        assert_eq!(second.entry().status, EntryStatus::Complete);
        assert_eq!(fx.factory.calls(), 2);
        assert!(fx.factory.find("e14").is_some());
        assert!(fx.factory.find("e15").is_some());
        assert_eq!(fx.queue.requests().len(), 2);
    }
}
