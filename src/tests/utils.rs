use crate::engine::engine::{EngineEvent, EventSink, MergeEngine};
use crate::sources::{CollectionSource, PresenceSource};
use crate::store::{init_db, Database};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A fresh database file under the temp dir with the production schema applied.
pub fn init_test_db() -> Database {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let path = std::env::temp_dir().join(format!(
        "loan_desk_test_{}_{}_{}.sqlite",
        std::process::id(),
        nanos,
        DB_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));

    let db = Database::new(path.to_string_lossy().into_owned());
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    db
}

/// An engine whose events land in a channel the test drains with [`pump`].
pub fn engine_with(
    collection: Arc<dyn CollectionSource>,
    presence: Option<Arc<dyn PresenceSource>>,
) -> (MergeEngine, Receiver<EngineEvent>) {
    let (tx, rx) = channel();
    let tx = parking_lot::Mutex::new(tx);
    let sink: EventSink = Arc::new(move |event| {
        let _ = tx.lock().send(event);
    });
    (MergeEngine::new("applications", collection, presence, sink), rx)
}

/// Apply every event already queued.
pub fn pump(engine: &mut MergeEngine, rx: &Receiver<EngineEvent>) -> usize {
    let mut n = 0;
    while let Ok(event) = rx.try_recv() {
        engine.handle(event);
        n += 1;
    }
    n
}

/// Wait for the next event (e.g. a finished write) and apply it.
pub fn pump_one(engine: &mut MergeEngine, rx: &Receiver<EngineEvent>) {
    let event = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("no engine event within 2s");
    engine.handle(event);
}
