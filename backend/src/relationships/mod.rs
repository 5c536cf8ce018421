//! Relationship scheduling.
//!
//! After an entry is built, every parent and child identifier it declares is
//! sent to a [`RelationshipQueue`] as a [`RelationshipRequest`]. Sending is
//! fire-and-forget: whoever consumes the queue links the objects later, so a
//! relationship may not exist yet when its entry reports `Complete`.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::QueueError;
use crate::models::Entry;

/// Request to link an entry with one parent or one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRequest {
    pub entry_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_identifier: Option<String>,
    pub importer_run: Uuid,
}

impl RelationshipRequest {
    pub fn parent(entry_identifier: &str, parent_identifier: &str, importer_run: Uuid) -> Self {
        Self {
            entry_identifier: entry_identifier.to_string(),
            parent_identifier: Some(parent_identifier.to_string()),
            child_identifier: None,
            importer_run,
        }
    }

    pub fn child(entry_identifier: &str, child_identifier: &str, importer_run: Uuid) -> Self {
        Self {
            entry_identifier: entry_identifier.to_string(),
            parent_identifier: None,
            child_identifier: Some(child_identifier.to_string()),
            importer_run,
        }
    }
}

/// Outbound queue of relationship requests.
pub trait RelationshipQueue: Send + Sync {
    /// Hand a request over without waiting for it to be processed.
    fn enqueue(&self, request: RelationshipRequest) -> Result<(), QueueError>;
}

// =============================================================================
// Queues
// =============================================================================

/// Collects requests in memory.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    requests: Mutex<Vec<RelationshipRequest>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<RelationshipRequest> {
        self.lock().clone()
    }

    pub fn drain(&self) -> Vec<RelationshipRequest> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RelationshipRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RelationshipQueue for InMemoryQueue {
    fn enqueue(&self, request: RelationshipRequest) -> Result<(), QueueError> {
        self.lock().push(request);
        Ok(())
    }
}

/// Sends requests to an async consumer over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<RelationshipRequest>,
}

impl ChannelQueue {
    /// Create a queue and the receiver its consumer reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RelationshipRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RelationshipQueue for ChannelQueue {
    fn enqueue(&self, request: RelationshipRequest) -> Result<(), QueueError> {
        self.sender.send(request).map_err(|_| QueueError::Closed)
    }
}

// =============================================================================
// Scheduling
// =============================================================================

/// One request per identifier listed under `field`, in list order.
///
/// Returns how many requests were sent.
pub fn schedule_parent_relationships(
    entry: &Entry,
    field: &str,
    queue: &dyn RelationshipQueue,
) -> Result<usize, QueueError> {
    schedule(entry, field, queue, RelationshipRequest::parent)
}

/// Child counterpart of [`schedule_parent_relationships`].
pub fn schedule_child_relationships(
    entry: &Entry,
    field: &str,
    queue: &dyn RelationshipQueue,
) -> Result<usize, QueueError> {
    schedule(entry, field, queue, RelationshipRequest::child)
}

fn schedule(
    entry: &Entry,
    field: &str,
    queue: &dyn RelationshipQueue,
    make: fn(&str, &str, Uuid) -> RelationshipRequest,
) -> Result<usize, QueueError> {
    let identifiers = entry.parsed_metadata.strings(field);
    let mut sent = 0;
    for identifier in identifiers.iter().filter(|id| !id.trim().is_empty()) {
        queue.enqueue(make(&entry.identifier, identifier, entry.last_run))?;
        sent += 1;
    }
    Ok(sent)
}
