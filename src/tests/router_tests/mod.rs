mod action_tests;
mod dashboard_tests;

use crate::engine::EngineHandle;
use crate::router::AppState;
use crate::sources::PresenceSource;
use crate::tests::fakes::{FakeCollection, FakePresence};
use astra::{Body, Response};
use http::{Method, Request};
use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;

pub fn start_app(
    collection: &FakeCollection,
    presence: Option<&FakePresence>,
) -> (AppState, JoinHandle<()>) {
    let presence = presence.map(|p| Arc::new(p.clone()) as Arc<dyn PresenceSource>);
    let (engine, join) = EngineHandle::spawn("applications", Arc::new(collection.clone()), presence)
        .expect("engine should start");
    collection.wait_subscribed();
    (
        AppState {
            engine,
            page_size: 10,
        },
        join,
    )
}

pub fn request(method: Method, uri: &str) -> astra::Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn body_of(resp: Response) -> String {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    body
}
