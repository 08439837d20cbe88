use super::{body_of, request, start_app};
use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::fakes::{application, FakeCollection, FakePresence};
use http::Method;
use serde_json::json;

fn push_three(collection: &FakeCollection) {
    collection.push(vec![
        application("a", "Amina Rahma", "2024-01-01T08:00:00Z", None),
        application("b", "Budi Santoso", "2024-01-02T08:00:00Z", Some("approved")),
        application("c", "Citra Lestari", "2024-01-03T08:00:00Z", Some("pending")),
    ]);
}

#[test]
fn home_links_to_the_dashboard() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);

    let resp = handle(request(Method::GET, "/"), &app).expect("Handler failed");
    assert_eq!(resp.status(), 200);
    let body = body_of(resp);
    assert!(body.contains(r#"href="/dashboard""#));
    assert!(body.contains(r#"<div class="card"><h2>Applications</h2>"#));
}

#[test]
fn dashboard_shows_loading_before_first_snapshot() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);

    let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());

    assert!(body.contains("Loading data..."));
    assert!(!body.contains("No applications"));
}

#[test]
fn dashboard_renders_counts_and_rows() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    push_three(&collection);

    let resp = handle(request(Method::GET, "/dashboard"), &app).unwrap();
    assert_eq!(resp.status(), 200);
    let body = body_of(resp);

    assert!(body.contains(r#"data-testid="text-total-applications">3<"#));
    assert!(body.contains(r#"data-testid="text-pending-count">2<"#));
    assert!(body.contains(r#"data-testid="text-approved-count">1<"#));
    assert!(body.contains(r#"data-testid="text-online-count">0<"#));
    assert!(body.contains(r#"data-testid="text-presence-off""#));
    assert!(body.contains("Showing 3 of 3 applications"));
    assert!(body.contains("Amina Rahma"));

    // Newest first.
    let citra = body.find("Citra Lestari").unwrap();
    let amina = body.find("Amina Rahma").unwrap();
    assert!(citra < amina);

    // Approved rows have no approve button.
    assert!(!body.contains("button-approve-b"));
    assert!(body.contains("button-approve-a"));
}

#[test]
fn empty_collection_shows_empty_state() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![]);

    let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());

    assert!(body.contains("No applications"));
    assert!(body.contains(r#"data-testid="text-total-applications">0<"#));
}

#[test]
fn filter_and_search_narrow_the_list() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    push_three(&collection);

    let body = body_of(handle(request(Method::GET, "/dashboard?filter=approved"), &app).unwrap());
    assert!(body.contains("Budi Santoso"));
    assert!(!body.contains("Amina Rahma"));
    assert!(body.contains("Showing 1 of 1 applications"));
    // Totals stay global.
    assert!(body.contains(r#"data-testid="text-total-applications">3<"#));

    let body = body_of(handle(request(Method::GET, "/dashboard?filter=all&q=CITRA"), &app).unwrap());
    assert!(body.contains("Citra Lestari"));
    assert!(!body.contains("Budi Santoso"));

    let body = body_of(handle(request(Method::GET, "/dashboard?q=nobody"), &app).unwrap());
    assert!(body.contains("No applications"));
}

#[test]
fn out_of_range_page_is_clamped() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(
        (0..12)
            .map(|i| {
                let created = format!("2024-01-{:02}T08:00:00Z", i + 1);
                application(&format!("r{i:02}"), &format!("Applicant {i:02}"), &created, None)
            })
            .collect(),
    );

    let body = body_of(handle(request(Method::GET, "/dashboard?page=9"), &app).unwrap());

    assert!(body.contains("Page 2 of 2"));
    assert!(body.contains("Showing 2 of 12 applications"));
}

#[test]
fn live_fragment_is_just_the_polled_section() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    push_three(&collection);

    let body = body_of(handle(request(Method::GET, "/dashboard/live?filter=pending"), &app).unwrap());

    assert!(body.starts_with(r#"<div id="live""#));
    assert!(!body.contains("<!DOCTYPE html>"));
    assert!(body.contains("Showing 2 of 2 applications"));
}

#[test]
fn online_badges_follow_presence() {
    let collection = FakeCollection::new();
    let presence = FakePresence::new();
    let (app, _join) = start_app(&collection, Some(&presence));
    push_three(&collection);

    // Forces the snapshot through so presence subscriptions exist.
    handle(request(Method::GET, "/dashboard"), &app).unwrap();
    presence.emit("status/a", json!({ "state": "online" }));
    presence.emit(
        "status",
        json!({ "a": { "state": "online" }, "x": { "state": "online" } }),
    );

    let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());
    assert!(body.contains(r#"data-testid="online-a""#));
    assert!(!body.contains(r#"data-testid="online-b""#));
    assert!(body.contains(r#"data-testid="text-online-count">2<"#));
    assert!(!body.contains(r#"data-testid="text-presence-off""#));
}

#[test]
fn selected_record_opens_the_detail_card() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    push_three(&collection);

    let body = body_of(handle(request(Method::GET, "/dashboard?selected=b"), &app).unwrap());

    assert!(body.contains(r#"data-testid="detail-b""#));
    assert!(body.contains("Close details"));
}

#[test]
fn detail_page_shows_every_field() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![crate::tests::fakes::doc(
        "z",
        json!({ "fullName": "Zahra", "hasKiCard": "yes", "monthlySalary": "" }),
    )]);

    let body = body_of(handle(request(Method::GET, "/applications/z"), &app).unwrap());

    assert!(body.contains("Zahra"));
    assert!(body.contains(r#"data-testid="detail-ki-card">Yes<"#));
    assert!(body.contains(r#"data-testid="detail-salary">Unavailable<"#));
}

#[test]
fn ids_with_spaces_link_and_resolve() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![application("a b", "Amina Rahma", "2024-01-01T08:00:00Z", None)]);

    let body = body_of(handle(request(Method::GET, "/dashboard"), &app).unwrap());
    assert!(body.contains(r#"action="/applications/a%20b/approve?"#));
    assert!(body.contains(r#"action="/applications/a%20b/delete?"#));

    let body = body_of(handle(request(Method::GET, "/applications/a%20b"), &app).unwrap());
    assert!(body.contains("Amina Rahma"));
}

#[test]
fn unknown_application_is_not_found() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);
    collection.push(vec![]);

    let result = handle(request(Method::GET, "/applications/ghost"), &app);
    assert!(matches!(result, Err(ServerError::NotFound)));
}

#[test]
fn unknown_routes_are_not_found() {
    let collection = FakeCollection::new();
    let (app, _join) = start_app(&collection, None);

    for (method, uri) in [
        (Method::GET, "/nope"),
        (Method::GET, "/applications/a/approve"),
        (Method::POST, "/dashboard"),
    ] {
        let result = handle(request(method, uri), &app);
        assert!(matches!(result, Err(ServerError::NotFound)), "{uri}");
    }
}

#[test]
fn stopped_engine_is_unavailable() {
    let collection = FakeCollection::new();
    let (app, join) = start_app(&collection, None);
    app.engine.shutdown().unwrap();
    join.join().unwrap();

    let result = handle(request(Method::GET, "/dashboard"), &app);
    assert!(matches!(result, Err(ServerError::EngineUnavailable)));
}
