// src/engine/engine.rs
//! The merge engine: live records + presence flags + notifications.
//!
//! All state changes go through `handle`, one event at a time. Sources never
//! touch the engine directly; their callbacks only forward an `EngineEvent` to
//! the sink, which the owner drains back into `handle`.

use crate::engine::model::{sort_newest_first, ApplicationRecord, STATUS_APPROVED};
use crate::engine::notifications::{Notification, NotificationKind, Notifications};
use crate::engine::presence::{
    count_online, PresenceEvent, PresenceSink, PresenceTracker, PRESENCE_ROOT,
};
use crate::engine::view::{compute_view, DerivedView, ViewQuery};
use crate::sources::{CollectionSource, Document, PresenceSource, SourceError, Subscription};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Where source callbacks deliver their events.
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Snapshot {
        generation: u64,
        documents: Vec<Document>,
    },
    SnapshotFailed {
        generation: u64,
        error: SourceError,
    },
    Presence(PresenceEvent),
    OnlineRoot {
        generation: u64,
        value: Value,
    },
    OnlineRootFailed {
        generation: u64,
        error: SourceError,
    },
    WriteFinished(WriteOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteIntent {
    SetStatus { id: String, status: String },
    Delete { id: String },
}

impl WriteIntent {
    pub fn approve(id: impl Into<String>) -> Self {
        WriteIntent::SetStatus {
            id: id.into(),
            status: STATUS_APPROVED.to_string(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        WriteIntent::Delete { id: id.into() }
    }

    pub fn record_id(&self) -> &str {
        match self {
            WriteIntent::SetStatus { id, .. } | WriteIntent::Delete { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub intent: WriteIntent,
    pub result: Result<(), SourceError>,
}

/// Forward a write to the collection. Local state is never touched here.
pub fn perform_write(
    collection: &dyn CollectionSource,
    collection_name: &str,
    intent: &WriteIntent,
) -> Result<(), SourceError> {
    match intent {
        WriteIntent::SetStatus { id, status } => collection.update_field(
            collection_name,
            id,
            "status",
            Value::String(status.clone()),
        ),
        WriteIntent::Delete { id } => collection.delete_record(collection_name, id),
    }
}

/// What the dashboard needs to render one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub view: DerivedView,
    /// Online entries under the presence root, live records or not.
    pub online_now: usize,
    pub loading: bool,
    pub presence_enabled: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDetail {
    pub record: ApplicationRecord,
    pub online: bool,
}

struct SinkPresence(EventSink);

impl PresenceSink for SinkPresence {
    fn on_value(&self, id: String, generation: u64) -> Box<dyn Fn(Value) + Send + Sync> {
        let sink = Arc::clone(&self.0);
        Box::new(move |value| {
            sink(EngineEvent::Presence(PresenceEvent::Value {
                id: id.clone(),
                generation,
                value,
            }))
        })
    }

    fn on_error(&self, id: String, generation: u64) -> Box<dyn Fn(SourceError) + Send + Sync> {
        let sink = Arc::clone(&self.0);
        Box::new(move |error| {
            sink(EngineEvent::Presence(PresenceEvent::Failed {
                id: id.clone(),
                generation,
                error,
            }))
        })
    }
}

pub struct MergeEngine {
    collection_name: String,
    collection: Arc<dyn CollectionSource>,
    presence_source: Option<Arc<dyn PresenceSource>>,
    sink: EventSink,

    records: Vec<ApplicationRecord>,
    presence: PresenceTracker,
    online_now: usize,
    loading: bool,
    notifications: Notifications,

    collection_sub: Option<(u64, Subscription)>,
    online_sub: Option<(u64, Subscription)>,
    next_generation: u64,
}

impl MergeEngine {
    pub fn new(
        collection_name: impl Into<String>,
        collection: Arc<dyn CollectionSource>,
        presence_source: Option<Arc<dyn PresenceSource>>,
        sink: EventSink,
    ) -> Self {
        Self {
            collection_name: collection_name.into(),
            collection,
            presence_source,
            sink,
            records: Vec::new(),
            presence: PresenceTracker::new(),
            online_now: 0,
            loading: true,
            notifications: Notifications::new(),
            collection_sub: None,
            online_sub: None,
            next_generation: 0,
        }
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Open the collection stream and the presence root stream.
    pub fn start(&mut self) {
        let generation = self.generation();
        let on_snapshot = {
            let sink = Arc::clone(&self.sink);
            Box::new(move |documents| sink(EngineEvent::Snapshot { generation, documents }))
        };
        let on_error = {
            let sink = Arc::clone(&self.sink);
            Box::new(move |error| sink(EngineEvent::SnapshotFailed { generation, error }))
        };

        match self
            .collection
            .subscribe(&self.collection_name, on_snapshot, on_error)
        {
            Ok(sub) => {
                info!(collection = %self.collection_name, "collection subscription opened");
                self.collection_sub = Some((generation, sub));
            }
            Err(e) => self.collection_failed(e),
        }

        let Some(source) = self.presence_source.clone() else {
            debug!("no presence source configured, online count stays at zero");
            return;
        };

        let generation = self.generation();
        let on_value = {
            let sink = Arc::clone(&self.sink);
            Box::new(move |value| sink(EngineEvent::OnlineRoot { generation, value }))
        };
        let on_error = {
            let sink = Arc::clone(&self.sink);
            Box::new(move |error| sink(EngineEvent::OnlineRootFailed { generation, error }))
        };
        match source.subscribe(PRESENCE_ROOT, on_value, on_error) {
            Ok(sub) => self.online_sub = Some((generation, sub)),
            Err(e) => {
                warn!(error = %e, "online count subscription failed");
                self.notifications.push(
                    NotificationKind::SubscriptionError,
                    "Presence unavailable",
                    format!("Could not follow online users: {e}"),
                );
            }
        }
    }

    pub fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Snapshot {
                generation,
                documents,
            } => {
                if self.collection_generation() == Some(generation) {
                    self.ingest_snapshot(documents);
                }
            }
            EngineEvent::SnapshotFailed { generation, error } => {
                if self.collection_generation() == Some(generation) {
                    self.collection_failed(error);
                }
            }
            EngineEvent::Presence(event) => {
                if let Err(e) = self.presence.apply(event) {
                    warn!(error = %e, "presence stream failed");
                    self.notifications.push(
                        NotificationKind::SubscriptionError,
                        "Presence unavailable",
                        format!("Lost the online status stream: {e}"),
                    );
                }
            }
            EngineEvent::OnlineRoot { generation, value } => {
                if self.online_generation() == Some(generation) {
                    self.online_now = count_online(&value);
                }
            }
            EngineEvent::OnlineRootFailed { generation, error } => {
                if self.online_generation() == Some(generation) {
                    warn!(error = %error, "online count stream failed");
                    self.online_sub = None;
                    self.online_now = 0;
                    self.notifications.push(
                        NotificationKind::SubscriptionError,
                        "Presence unavailable",
                        format!("Lost the online users stream: {error}"),
                    );
                }
            }
            EngineEvent::WriteFinished(outcome) => self.apply_write_outcome(outcome),
        }
    }

    fn collection_generation(&self) -> Option<u64> {
        self.collection_sub.as_ref().map(|(g, _)| *g)
    }

    fn online_generation(&self) -> Option<u64> {
        self.online_sub.as_ref().map(|(g, _)| *g)
    }

    fn collection_failed(&mut self, error: SourceError) {
        error!(collection = %self.collection_name, error = %error, "collection stream failed");
        // The stream stays down; nothing resubscribes on its own.
        self.collection_sub = None;
        self.loading = false;
        self.notifications.push(
            NotificationKind::SubscriptionError,
            "Error loading data",
            format!("Could not load applications: {error}"),
        );
    }

    /// Replace the live set with `documents`, newest first, then re-follow presence.
    pub fn ingest_snapshot(&mut self, documents: Vec<Document>) {
        let mut seen = HashSet::with_capacity(documents.len());
        let mut records = Vec::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                warn!(record_id = %doc.id, "duplicate id in snapshot, keeping the first");
                continue;
            }
            records.push(ApplicationRecord::from_document(doc));
        }
        sort_newest_first(&mut records);

        debug!(count = records.len(), "snapshot ingested");
        self.records = records;
        self.loading = false;
        self.reconcile_presence();
    }

    pub fn reconcile_presence(&mut self) {
        let Some(source) = self.presence_source.as_deref() else {
            return;
        };
        let sink = SinkPresence(Arc::clone(&self.sink));
        let outcome = self
            .presence
            .reconcile(self.records.iter().map(|r| r.id.as_str()), source, &sink);

        if !outcome.opened.is_empty() || !outcome.cancelled.is_empty() {
            debug!(
                opened = outcome.opened.len(),
                cancelled = outcome.cancelled.len(),
                "presence reconciled"
            );
        }
        if let Some((id, e)) = outcome.failed.first() {
            self.notifications.push(
                NotificationKind::SubscriptionError,
                "Presence unavailable",
                format!(
                    "Could not follow {} applicant(s), first {id}: {e}",
                    outcome.failed.len()
                ),
            );
        }
    }

    /// Send a write to the collection without blocking the caller.
    /// The result arrives later as `EngineEvent::WriteFinished`.
    pub fn request_write(&mut self, intent: WriteIntent) {
        let collection = Arc::clone(&self.collection);
        let collection_name = self.collection_name.clone();
        let sink = Arc::clone(&self.sink);
        let pending = intent.clone();

        let spawned = thread::Builder::new()
            .name("loan-desk-write".into())
            .spawn(move || {
                let result = perform_write(collection.as_ref(), &collection_name, &pending);
                sink(EngineEvent::WriteFinished(WriteOutcome {
                    intent: pending,
                    result,
                }));
            });

        if let Err(e) = spawned {
            self.apply_write_outcome(WriteOutcome {
                intent,
                result: Err(SourceError::Unavailable(e.to_string())),
            });
        }
    }

    pub fn apply_write_outcome(&mut self, outcome: WriteOutcome) {
        let id = outcome.intent.record_id().to_string();
        match (&outcome.intent, outcome.result) {
            (WriteIntent::SetStatus { status, .. }, Ok(())) => {
                info!(record_id = %id, status = %status, "status updated");
                self.notifications.push(
                    NotificationKind::Success,
                    "Updated",
                    "Application status updated.",
                );
            }
            (WriteIntent::Delete { .. }, Ok(())) => {
                info!(record_id = %id, "application deleted");
                self.notifications.push(
                    NotificationKind::Success,
                    "Deleted",
                    "Application deleted.",
                );
            }
            (WriteIntent::SetStatus { .. }, Err(e)) => {
                warn!(record_id = %id, error = %e, "status update failed");
                self.notifications.push(
                    NotificationKind::WriteFailed,
                    "Error",
                    format!("Could not update the application status: {e}"),
                );
            }
            (WriteIntent::Delete { .. }, Err(e)) => {
                warn!(record_id = %id, error = %e, "delete failed");
                self.notifications.push(
                    NotificationKind::WriteFailed,
                    "Error",
                    format!("Could not delete the application: {e}"),
                );
            }
        }
    }

    pub fn dismiss(&mut self, notification_id: u64) -> bool {
        self.notifications.dismiss(notification_id)
    }

    pub fn view(&self, query: &ViewQuery) -> DerivedView {
        compute_view(&self.records, &self.presence.flags(), query)
    }

    pub fn dashboard(&self, query: &ViewQuery) -> DashboardSnapshot {
        DashboardSnapshot {
            view: self.view(query),
            online_now: self.online_now,
            loading: self.loading,
            presence_enabled: self.presence_source.is_some(),
            notifications: self.notifications.list(),
        }
    }

    pub fn record(&self, id: &str) -> Option<RecordDetail> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .map(|r| RecordDetail {
                record: r.clone(),
                online: self.presence.is_online(id),
            })
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    #[cfg(test)]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    #[cfg(test)]
    pub fn online_now(&self) -> usize {
        self.online_now
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[cfg(test)]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.list()
    }

    #[cfg(test)]
    pub fn is_subscribed(&self) -> bool {
        self.collection_sub.is_some()
    }

    /// Cancel every stream. Events that were already queued are ignored afterwards.
    pub fn shutdown(&mut self) {
        if let Some((_, sub)) = self.collection_sub.take() {
            sub.cancel();
        }
        if let Some((_, sub)) = self.online_sub.take() {
            sub.cancel();
        }
        self.presence.clear();
        info!(collection = %self.collection_name, "engine streams closed");
    }
}
