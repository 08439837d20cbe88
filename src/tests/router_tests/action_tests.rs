use super::{body_of, request, start_app};
use crate::errors::ServerError;
use crate::router::handle;
use crate::sources::SourceError;
use crate::tests::fakes::{application, FakeCollection};
use http::Method;
use serde_json::json;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(Instant::now() < deadline, "write never reached the store");
        thread::sleep(Duration::from_millis(10));
    }
}

fn location(resp: &astra::Response) -> String {
    resp.headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[test]
fn approve_redirects_back_and_writes_the_status() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![application("a", "Amina", "2024-01-01T08:00:00Z", None)]);

    let resp = handle(
        request(Method::POST, "/applications/a/approve?filter=pending&page=2"),
        &app,
    )
    .unwrap();

    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/dashboard?filter=pending&page=2");

    wait_for(|| !collection.updates().is_empty());
    assert_eq!(collection.updates()[0].1, "a");
    assert_eq!(collection.updates()[0].3, json!("approved"));
}

#[test]
fn delete_redirects_back_and_removes_the_document() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![application("a", "Amina", "2024-01-01T08:00:00Z", None)]);

    let resp = handle(request(Method::POST, "/applications/a/delete?q=amina"), &app).unwrap();

    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/dashboard?filter=all&q=amina&page=1");
    wait_for(|| !collection.deletes().is_empty());
    assert_eq!(collection.deletes()[0].1, "a");
}

#[test]
fn escaped_ids_reach_the_store_decoded() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![
        application("a b", "Amina", "2024-01-01T08:00:00Z", None),
        application("c/d", "Citra", "2024-01-02T08:00:00Z", None),
    ]);

    let resp = handle(request(Method::POST, "/applications/a%20b/approve"), &app).unwrap();
    assert_eq!(resp.status(), 303);
    let resp = handle(request(Method::POST, "/applications/c%2Fd/delete"), &app).unwrap();
    assert_eq!(resp.status(), 303);

    wait_for(|| !collection.updates().is_empty() && !collection.deletes().is_empty());
    assert_eq!(collection.updates()[0].1, "a b");
    assert_eq!(collection.deletes()[0].1, "c/d");
}

#[test]
fn failed_write_shows_a_dismissible_error() {
    let collection = FakeCollection::new();
    collection.fail_writes(SourceError::Rejected("permission denied".into()));
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![application("a", "Amina", "2024-01-01T08:00:00Z", None)]);

    handle(request(Method::POST, "/applications/a/approve"), &app).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let body = loop {
        let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());
        if body.contains(r#"class="toast toast-error""#) {
            break body;
        }
        assert!(Instant::now() < deadline, "no error notice shown");
        thread::sleep(Duration::from_millis(10));
    };
    assert!(body.contains("permission denied"));
    // The record is still listed as pending.
    assert!(body.contains("button-approve-a"));

    let notice = app
        .engine
        .dashboard(Default::default())
        .unwrap()
        .notifications[0]
        .id;
    let resp = handle(
        request(Method::POST, &format!("/notifications/{notice}/dismiss")),
        &app,
    )
    .unwrap();
    assert_eq!(resp.status(), 303);

    let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());
    assert!(!body.contains(r#"class="toast toast-error""#));
}

#[test]
fn dismiss_with_a_bad_id_is_rejected() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);

    let result = handle(request(Method::POST, "/notifications/abc/dismiss"), &app);
    assert!(matches!(result, Err(ServerError::BadRequest(_))));
}
