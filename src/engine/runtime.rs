// src/engine/runtime.rs
//! Runs a `MergeEngine` on its own thread.
//!
//! Source callbacks and HTTP handlers share one FIFO channel, so snapshot
//! pushes, presence pushes, write outcomes and view requests are applied
//! strictly one after another without any lock around engine state.
//!
//! Source callbacks keep their own senders alive, so the channel never closes
//! by itself. The engine stops on an explicit `shutdown` or when the last
//! `EngineHandle` clone is dropped.

use crate::engine::engine::{
    DashboardSnapshot, EngineEvent, EventSink, MergeEngine, RecordDetail, WriteIntent,
};
use crate::engine::view::ViewQuery;
use crate::engine::EngineError;
use crate::sources::{CollectionSource, PresenceSource};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

enum Message {
    Event(EngineEvent),
    Dashboard {
        query: ViewQuery,
        reply: Sender<DashboardSnapshot>,
    },
    Record {
        id: String,
        reply: Sender<Option<RecordDetail>>,
    },
    Write(WriteIntent),
    Dismiss(u64),
    Shutdown,
}

/// Sends `Shutdown` once every handle clone is gone.
struct StopOnDrop(Sender<Message>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(Message::Shutdown);
    }
}

/// Cheap to clone; every clone talks to the same engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Message>,
    _stop: Arc<StopOnDrop>,
}

impl EngineHandle {
    /// Build the engine on a new thread and open its streams.
    pub fn spawn(
        collection_name: impl Into<String>,
        collection: Arc<dyn CollectionSource>,
        presence: Option<Arc<dyn PresenceSource>>,
    ) -> Result<(Self, JoinHandle<()>), EngineError> {
        let (tx, rx) = channel::<Message>();

        let sink: EventSink = {
            let tx = tx.clone();
            Arc::new(move |event| {
                // A closed channel means the engine already stopped.
                let _ = tx.send(Message::Event(event));
            })
        };

        let collection_name = collection_name.into();
        let join = thread::Builder::new()
            .name("loan-desk-engine".into())
            .spawn(move || {
                let mut engine = MergeEngine::new(collection_name, collection, presence, sink);
                engine.start();
                run(engine, rx);
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        Ok((
            Self {
                _stop: Arc::new(StopOnDrop(tx.clone())),
                tx,
            },
            join,
        ))
    }

    fn send(&self, message: Message) -> Result<(), EngineError> {
        self.tx.send(message).map_err(|_| EngineError::Unavailable)
    }

    pub fn dashboard(&self, query: ViewQuery) -> Result<DashboardSnapshot, EngineError> {
        let (reply, rx) = channel();
        self.send(Message::Dashboard { query, reply })?;
        rx.recv().map_err(|_| EngineError::Unavailable)
    }

    pub fn record(&self, id: &str) -> Result<Option<RecordDetail>, EngineError> {
        let (reply, rx) = channel();
        self.send(Message::Record {
            id: id.to_string(),
            reply,
        })?;
        rx.recv().map_err(|_| EngineError::Unavailable)
    }

    pub fn request(&self, intent: WriteIntent) -> Result<(), EngineError> {
        self.send(Message::Write(intent))
    }

    pub fn dismiss(&self, notification_id: u64) -> Result<(), EngineError> {
        self.send(Message::Dismiss(notification_id))
    }

    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.send(Message::Shutdown)
    }
}

fn run(mut engine: MergeEngine, rx: Receiver<Message>) {
    while let Ok(message) = rx.recv() {
        match message {
            Message::Event(event) => engine.handle(event),
            Message::Dashboard { query, reply } => {
                let _ = reply.send(engine.dashboard(&query));
            }
            Message::Record { id, reply } => {
                let _ = reply.send(engine.record(&id));
            }
            Message::Write(intent) => {
                debug!(record_id = %intent.record_id(), "write requested");
                engine.request_write(intent);
            }
            Message::Dismiss(id) => {
                engine.dismiss(id);
            }
            Message::Shutdown => break,
        }
    }

    engine.shutdown();
    info!("engine stopped");
}
