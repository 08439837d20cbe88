// src/store/collection.rs
//! `CollectionSource` over the SQLite document table.
//!
//! Subscribers get the full collection on subscribe and again after every
//! write made through this source. `watch` adds a polling thread that notices
//! commits from other processes (via `PRAGMA data_version`) and pushes too.
//!
//! Snapshots are loaded and delivered under one emit lock, so every subscriber
//! sees them in commit order. Callbacks must not call back into the source.

use crate::sources::{
    CollectionSource, Document, ErrorFn, SnapshotFn, SourceError, Subscription,
};
use crate::store::connection::Database;
use crate::store::documents;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

struct Listener {
    collection: String,
    active: AtomicBool,
    on_snapshot: SnapshotFn,
    on_error: ErrorFn,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<u64, Arc<Listener>>,
    next_id: u64,
}

#[derive(Default)]
struct Shared {
    registry: Mutex<Registry>,
    emit: Mutex<()>,
}

pub struct SqliteCollectionSource {
    db: Database,
    shared: Arc<Shared>,
}

impl SqliteCollectionSource {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            shared: Arc::new(Shared::default()),
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().listeners.len()
    }

    /// Insert a new document with a generated id and notify subscribers.
    #[cfg(test)]
    pub fn insert(&self, collection: &str, fields: &serde_json::Map<String, Value>) -> Result<String, SourceError> {
        let id = self
            .db
            .with_conn(|conn| documents::put_document(conn, collection, None, fields))?;
        broadcast(&self.db, &self.shared, Some(collection));
        Ok(id)
    }

    /// Load a JSON array of documents, typically a seed file at startup.
    pub fn import(&self, collection: &str, json: &str) -> Result<usize, SourceError> {
        let n = self
            .db
            .with_conn(|conn| documents::import_documents(conn, collection, json))?;
        broadcast(&self.db, &self.shared, Some(collection));
        Ok(n)
    }

    /// Poll for commits made by other connections and push fresh snapshots.
    /// The thread ends once this source is dropped.
    pub fn watch(&self, interval: Duration) -> Result<JoinHandle<()>, SourceError> {
        let db = self.db.clone();
        let shared = Arc::downgrade(&self.shared);
        let conn = db.open()?;

        thread::Builder::new()
            .name("loan-desk-store-watch".into())
            .spawn(move || {
                let mut last = data_version(&conn);
                loop {
                    thread::sleep(interval);
                    let Some(shared) = Weak::upgrade(&shared) else {
                        debug!("store watcher stopping");
                        return;
                    };
                    let current = data_version(&conn);
                    if current != last {
                        debug!("external change detected");
                        last = current;
                        broadcast(&db, &shared, None);
                    }
                }
            })
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

fn data_version(conn: &rusqlite::Connection) -> Option<i64> {
    match conn.query_row("PRAGMA data_version", [], |row| row.get(0)) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "data_version query failed");
            None
        }
    }
}

/// Push the current membership to every active listener of `only`
/// (or of every subscribed collection).
fn broadcast(db: &Database, shared: &Shared, only: Option<&str>) {
    let _emit = shared.emit.lock();

    let listeners: Vec<(u64, Arc<Listener>)> = {
        let registry = shared.registry.lock();
        registry
            .listeners
            .iter()
            .filter(|(_, l)| only.map_or(true, |c| l.collection == c))
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect()
    };

    let collections: BTreeSet<&str> = listeners.iter().map(|(_, l)| l.collection.as_str()).collect();
    for collection in collections {
        let loaded: Result<Vec<Document>, SourceError> =
            db.with_conn(|conn| documents::list_documents(conn, collection));

        for (id, listener) in listeners.iter().filter(|(_, l)| l.collection == collection) {
            if !listener.active.load(Ordering::SeqCst) {
                continue;
            }
            match &loaded {
                Ok(docs) => (listener.on_snapshot)(docs.clone()),
                Err(e) => {
                    warn!(collection = %collection, error = %e, "snapshot load failed");
                    listener.active.store(false, Ordering::SeqCst);
                    shared.registry.lock().listeners.remove(id);
                    (listener.on_error)(e.clone());
                }
            }
        }
    }
}

impl CollectionSource for SqliteCollectionSource {
    fn subscribe(
        &self,
        collection: &str,
        on_snapshot: SnapshotFn,
        on_error: ErrorFn,
    ) -> Result<Subscription, SourceError> {
        let _emit = self.shared.emit.lock();

        let initial = self
            .db
            .with_conn(|conn| documents::list_documents(conn, collection))?;

        let listener = Arc::new(Listener {
            collection: collection.to_string(),
            active: AtomicBool::new(true),
            on_snapshot,
            on_error,
        });

        let listener_id = {
            let mut registry = self.shared.registry.lock();
            registry.next_id += 1;
            let id = registry.next_id;
            registry.listeners.insert(id, Arc::clone(&listener));
            id
        };
        info!(collection = %collection, listener_id, "collection subscriber added");

        (listener.on_snapshot)(initial);

        let shared = Arc::downgrade(&self.shared);
        let cancelled = Arc::clone(&listener);
        Ok(Subscription::new(move || {
            cancelled.active.store(false, Ordering::SeqCst);
            if let Some(shared) = shared.upgrade() {
                shared.registry.lock().listeners.remove(&listener_id);
            }
            debug!(listener_id, "collection subscriber removed");
        }))
    }

    fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), SourceError> {
        self.db.with_conn(|conn| {
            documents::update_document_field(conn, collection, id, field, value)
        })?;
        broadcast(&self.db, &self.shared, Some(collection));
        Ok(())
    }

    fn delete_record(&self, collection: &str, id: &str) -> Result<(), SourceError> {
        let removed = self
            .db
            .with_conn(|conn| documents::delete_document(conn, collection, id))?;
        if removed {
            broadcast(&self.db, &self.shared, Some(collection));
        }
        Ok(())
    }
}
