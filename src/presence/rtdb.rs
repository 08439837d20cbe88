// src/presence/rtdb.rs
//! Presence over a Realtime Database REST event stream.
//!
//! Each subscription is one long-lived `GET {base}/{path}.json` with
//! `Accept: text/event-stream`, read on its own thread. The server sends
//! `put` / `patch` events carrying `{"path": ..., "data": ...}` relative to
//! the subscribed location; we keep a local copy of that subtree and hand
//! the whole value to the callback after every change.
//!
//! Cancelling closes a gate shared with the reader thread and waits for any
//! callback already running, so nothing is delivered once `cancel` returns.
//! A blocking read cannot be interrupted, so the thread itself exits and
//! drops the connection when the next line arrives (at the latest, the
//! server's periodic `keep-alive`).

use crate::presence::sse::SseParser;
use crate::sources::{ErrorFn, PresenceSource, SourceError, Subscription, ValueFn};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

pub struct RtdbPresenceSource {
    base: Url,
    auth: Option<String>,
    client: Client,
}

impl RtdbPresenceSource {
    pub fn new(base_url: &str, auth: Option<String>) -> Result<Self, SourceError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| SourceError::Malformed(format!("presence url {base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // The stream stays open indefinitely; no overall request timeout.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(Self { base, auth, client })
    }

    pub fn url_for(&self, path: &str) -> Result<Url, SourceError> {
        let mut url = self
            .base
            .join(&format!("{}.json", path.trim_matches('/')))
            .map_err(|e| SourceError::Malformed(format!("presence path {path}: {e}")))?;
        if let Some(token) = &self.auth {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

impl PresenceSource for RtdbPresenceSource {
    fn subscribe(
        &self,
        path: &str,
        on_value: ValueFn,
        on_error: ErrorFn,
    ) -> Result<Subscription, SourceError> {
        let url = self.url_for(path)?;
        let client = self.client.clone();
        let (stream, subscription) = StreamState::open(path, on_value, on_error);

        thread::Builder::new()
            .name(format!("presence:{path}"))
            .spawn(move || stream.run(&client, url))
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(subscription)
    }
}

struct StreamState {
    path: String,
    /// `true` while callbacks may run. Held for the duration of each callback.
    gate: Arc<Mutex<bool>>,
    on_value: ValueFn,
    on_error: ErrorFn,
}

impl StreamState {
    fn open(path: &str, on_value: ValueFn, on_error: ErrorFn) -> (Self, Subscription) {
        let gate = Arc::new(Mutex::new(true));
        let stream = Self {
            path: path.to_string(),
            gate: Arc::clone(&gate),
            on_value,
            on_error,
        };

        let path = path.to_string();
        let subscription = Subscription::new(move || {
            *gate.lock() = false;
            debug!(path = %path, "presence stream cancelled");
        });
        (stream, subscription)
    }

    fn is_cancelled(&self) -> bool {
        !*self.gate.lock()
    }

    fn deliver(&self, value: Value) {
        let open = self.gate.lock();
        if *open {
            (self.on_value)(value);
        }
    }

    fn fail(&self, error: SourceError) {
        let open = self.gate.lock();
        if *open {
            warn!(path = %self.path, error = %error, "presence stream ended");
            (self.on_error)(error);
        }
    }

    fn run(self, client: &Client, url: Url) {
        let resp = match client
            .get(url)
            .header(ACCEPT, mime::TEXT_EVENT_STREAM.as_ref())
            .send()
        {
            Ok(resp) => resp,
            Err(e) => return self.fail(SourceError::Unavailable(e.to_string())),
        };

        if !resp.status().is_success() {
            let status = resp.status();
            return self.fail(SourceError::Rejected(format!("HTTP {status}")));
        }
        info!(path = %self.path, "presence stream open");

        let mut parser = SseParser::new();
        let mut tree = Value::Null;

        for line in BufReader::new(resp).lines() {
            if self.is_cancelled() {
                return;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => return self.fail(SourceError::Stream(e.to_string())),
            };
            let Some(event) = parser.feed(&line) else {
                continue;
            };

            match event.event.as_str() {
                "put" | "patch" => {
                    let update: PathData = match serde_json::from_str(&event.data) {
                        Ok(update) => update,
                        Err(e) => {
                            warn!(path = %self.path, error = %e, "unreadable presence event");
                            continue;
                        }
                    };
                    if event.event == "put" {
                        apply_put(&mut tree, &update.path, update.data);
                    } else {
                        apply_patch(&mut tree, &update.path, update.data);
                    }
                    self.deliver(tree.clone());
                }
                "keep-alive" => {}
                "cancel" => {
                    return self.fail(SourceError::Rejected("read permission revoked".into()))
                }
                "auth_revoked" => {
                    return self.fail(SourceError::Rejected("credential expired".into()))
                }
                other => debug!(path = %self.path, event = other, "ignoring presence event"),
            }
        }

        self.fail(SourceError::Stream("stream closed by server".into()));
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replace the value at `path` (relative to `root`). Null removes it.
pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        *root = data;
        return;
    };

    let mut node = root;
    for seg in parents {
        if !node.is_object() {
            if data.is_null() {
                return;
            }
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(seg.to_string()).or_insert(Value::Null),
            _ => return,
        };
    }

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        if data.is_null() {
            map.remove(*last);
        } else {
            map.insert(last.to_string(), data);
        }
    }
}

/// Merge each child of `data` into the value at `path`.
pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        return apply_put(root, path, data);
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(root, &format!("{base}/{key}"), value);
    }
}
