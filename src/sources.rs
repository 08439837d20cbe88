// src/sources.rs
//! Contracts for the two push-based backends the dashboard reads from.
//!
//! Both sources deliver data through callbacks registered with `subscribe`.
//! The returned [`Subscription`] is the only way to stop a stream: calling
//! [`Subscription::cancel`] (or dropping it) guarantees that the callbacks
//! registered with it are not invoked afterwards.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Called with the complete membership of a collection on every change.
pub type SnapshotFn = Box<dyn Fn(Vec<Document>) + Send + Sync>;

/// Called with the current value stored at a presence path (`Value::Null` when absent).
pub type ValueFn = Box<dyn Fn(Value) + Send + Sync>;

/// Called once when a stream fails. The stream is dead afterwards.
pub type ErrorFn = Box<dyn Fn(SourceError) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("no document to update: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}

impl From<crate::errors::ServerError> for SourceError {
    fn from(err: crate::errors::ServerError) -> Self {
        SourceError::Storage(err.to_string())
    }
}

/// A raw document as stored in the collection: an id plus its JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from a JSON value; non-objects become an empty document.
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }
}

/// Handle to an open stream. Cancels the stream exactly once, on `cancel` or drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The document store holding the applications.
pub trait CollectionSource: Send + Sync {
    /// Push the full membership of `collection` now and after every change.
    fn subscribe(
        &self,
        collection: &str,
        on_snapshot: SnapshotFn,
        on_error: ErrorFn,
    ) -> Result<Subscription, SourceError>;

    /// Set a single field on an existing document.
    fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), SourceError>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete_record(&self, collection: &str, id: &str) -> Result<(), SourceError>;
}

/// The realtime key-value store holding connection state per applicant.
pub trait PresenceSource: Send + Sync {
    fn subscribe(
        &self,
        path: &str,
        on_value: ValueFn,
        on_error: ErrorFn,
    ) -> Result<Subscription, SourceError>;
}
