use crate::engine::view::ViewQuery;
use crate::engine::EngineHandle;
use crate::sources::{CollectionSource, Document, SourceError};
use crate::store::SqliteCollectionSource;
use crate::tests::utils::init_test_db;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Seen = Arc<Mutex<Vec<Vec<Document>>>>;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn listen(source: &SqliteCollectionSource, collection: &str) -> (Seen, crate::sources::Subscription) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = source
        .subscribe(
            collection,
            Box::new(move |docs| sink.lock().push(docs)),
            Box::new(|e| panic!("unexpected stream error: {e}")),
        )
        .expect("subscribe should succeed");
    (seen, sub)
}

fn last_ids(seen: &Seen) -> Vec<String> {
    let seen = seen.lock();
    let mut ids: Vec<String> = seen
        .last()
        .map(|docs| docs.iter().map(|d| d.id.clone()).collect())
        .unwrap_or_default();
    ids.sort();
    ids
}

#[test]
fn subscribe_delivers_the_current_membership_immediately() {
    let source = SqliteCollectionSource::new(init_test_db());
    source
        .insert("applications", &fields(json!({ "fullName": "Amina" })))
        .unwrap();

    let (seen, _sub) = listen(&source, "applications");

    assert_eq!(seen.lock().len(), 1);
    assert_eq!(seen.lock()[0][0].fields["fullName"], json!("Amina"));
}

#[test]
fn writes_push_a_fresh_snapshot() {
    let source = SqliteCollectionSource::new(init_test_db());
    source
        .import(
            "applications",
            r#"[{"id":"a","fullName":"Amina"},{"id":"b","fullName":"Budi"}]"#,
        )
        .unwrap();
    let (seen, _sub) = listen(&source, "applications");

    source
        .update_field("applications", "a", "status", json!("approved"))
        .unwrap();
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        let a = seen[1].iter().find(|d| d.id == "a").unwrap();
        assert_eq!(a.fields["status"], json!("approved"));
        // Other fields survive a single-field update.
        assert_eq!(a.fields["fullName"], json!("Amina"));
    }

    source.delete_record("applications", "b").unwrap();
    assert_eq!(last_ids(&seen), vec!["a"]);
}

#[test]
fn updating_a_missing_document_fails() {
    let source = SqliteCollectionSource::new(init_test_db());
    let err = source
        .update_field("applications", "ghost", "status", json!("approved"))
        .unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
}

#[test]
fn deleting_a_missing_document_is_quiet() {
    let source = SqliteCollectionSource::new(init_test_db());
    let (seen, _sub) = listen(&source, "applications");

    source.delete_record("applications", "ghost").unwrap();

    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn other_collections_do_not_notify() {
    let source = SqliteCollectionSource::new(init_test_db());
    let (seen, _sub) = listen(&source, "applications");

    source
        .insert("archive", &fields(json!({ "fullName": "Old" })))
        .unwrap();

    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn cancelled_subscription_gets_no_more_snapshots() {
    let source = SqliteCollectionSource::new(init_test_db());
    let (seen, sub) = listen(&source, "applications");
    assert_eq!(source.subscriber_count(), 1);

    sub.cancel();
    source
        .insert("applications", &fields(json!({ "fullName": "Late" })))
        .unwrap();

    assert_eq!(source.subscriber_count(), 0);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn watcher_picks_up_commits_from_other_connections() {
    let db = init_test_db();
    let source = SqliteCollectionSource::new(db.clone());
    let (seen, _sub) = listen(&source, "applications");
    let _watch = source.watch(Duration::from_millis(20)).unwrap();

    // A separate connection, as another process would have.
    let other = db.open().unwrap();
    other
        .execute(
            "insert into documents (collection, id, body, updated_at) values ('applications', 'x', '{\"fullName\":\"Elsewhere\"}', 0)",
            [],
        )
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while last_ids(&seen) != vec!["x"] {
        assert!(Instant::now() < deadline, "watcher never pushed");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn engine_over_the_store_sees_approvals_end_to_end() {
    let source = Arc::new(SqliteCollectionSource::new(init_test_db()));
    source
        .import(
            "applications",
            r#"[{"id":"a","fullName":"Amina","createdDate":"2024-01-01T08:00:00Z"}]"#,
        )
        .unwrap();

    let (engine, _join) = EngineHandle::spawn(
        "applications",
        Arc::clone(&source) as Arc<dyn CollectionSource>,
        None,
    )
    .unwrap();

    engine
        .request(crate::engine::WriteIntent::approve("a"))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let snap = engine.dashboard(ViewQuery::default()).unwrap();
        if snap.view.counts.approved == 1 {
            assert_eq!(snap.view.counts.pending, 0);
            break;
        }
        assert!(Instant::now() < deadline, "approval never arrived: {snap:?}");
        thread::sleep(Duration::from_millis(10));
    }

    engine.shutdown().unwrap();
}
