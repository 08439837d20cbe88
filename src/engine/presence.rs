// src/engine/presence.rs
//! Per-record presence subscriptions.
//!
//! The tracker owns one subscription per live record id. `reconcile` diffs the
//! wanted ids against the open subscriptions and issues only the cancels and
//! opens needed to match. Every opened subscription gets a fresh generation
//! number; an event is applied only if its generation is still the active one
//! for that id, so late events from a cancelled stream are dropped.

use crate::sources::{PresenceSource, SourceError, Subscription};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

pub const PRESENCE_ROOT: &str = "status";
const ONLINE: &str = "online";

pub fn presence_path(record_id: &str) -> String {
    format!("{PRESENCE_ROOT}/{record_id}")
}

/// `{"state": "online"}` is online. Anything else, including null, is offline.
pub fn is_online(value: &Value) -> bool {
    value.get("state").and_then(Value::as_str) == Some(ONLINE)
}

/// Count children of the presence root whose state is online.
pub fn count_online(root: &Value) -> usize {
    match root {
        Value::Object(children) => children.values().filter(|v| is_online(v)).count(),
        Value::Array(children) => children.iter().filter(|v| is_online(v)).count(),
        _ => 0,
    }
}

/// Events a presence subscription produces, tagged with its generation.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Value {
        id: String,
        generation: u64,
        value: Value,
    },
    Failed {
        id: String,
        generation: u64,
        error: SourceError,
    },
}

/// Builds the callbacks for a newly opened subscription.
pub trait PresenceSink {
    fn on_value(&self, id: String, generation: u64) -> Box<dyn Fn(Value) + Send + Sync>;
    fn on_error(&self, id: String, generation: u64) -> Box<dyn Fn(SourceError) + Send + Sync>;
}

struct Tracked {
    generation: u64,
    /// `None` once the stream failed; the entry stays so it is not reopened.
    subscription: Option<Subscription>,
    online: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub opened: Vec<String>,
    pub cancelled: Vec<String>,
    /// Ids whose subscription could not be opened at all.
    pub failed: Vec<(String, SourceError)>,
}

#[derive(Default)]
pub struct PresenceTracker {
    tracked: HashMap<String, Tracked>,
    next_generation: u64,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile<'a>(
        &mut self,
        wanted: impl IntoIterator<Item = &'a str>,
        source: &dyn PresenceSource,
        sink: &dyn PresenceSink,
    ) -> ReconcileOutcome {
        let wanted: BTreeSet<&str> = wanted.into_iter().collect();
        let mut outcome = ReconcileOutcome::default();

        // Cancel first so a stale id can never report after the new set is live.
        let stale: Vec<String> = self
            .tracked
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(entry) = self.tracked.remove(&id) {
                if let Some(sub) = entry.subscription {
                    sub.cancel();
                }
            }
            debug!(record_id = %id, "presence subscription cancelled");
            outcome.cancelled.push(id);
        }

        for id in wanted {
            if self.tracked.contains_key(id) {
                continue;
            }
            self.next_generation += 1;
            let generation = self.next_generation;
            let path = presence_path(id);

            let subscription = match source.subscribe(
                &path,
                sink.on_value(id.to_string(), generation),
                sink.on_error(id.to_string(), generation),
            ) {
                Ok(sub) => Some(sub),
                Err(e) => {
                    warn!(record_id = %id, error = %e, "presence subscribe failed");
                    outcome.failed.push((id.to_string(), e));
                    None
                }
            };

            self.tracked.insert(
                id.to_string(),
                Tracked {
                    generation,
                    subscription,
                    online: false,
                },
            );
            debug!(record_id = %id, generation, "presence subscription opened");
            outcome.opened.push(id.to_string());
        }

        outcome
    }

    /// Apply a presence event. Returns false when the event was stale.
    pub fn apply(&mut self, event: PresenceEvent) -> Result<bool, SourceError> {
        match event {
            PresenceEvent::Value {
                id,
                generation,
                value,
            } => match self.tracked.get_mut(&id) {
                Some(entry) if entry.generation == generation && entry.subscription.is_some() => {
                    entry.online = is_online(&value);
                    Ok(true)
                }
                _ => Ok(false),
            },
            PresenceEvent::Failed {
                id,
                generation,
                error,
            } => match self.tracked.get_mut(&id) {
                Some(entry) if entry.generation == generation && entry.subscription.is_some() => {
                    entry.online = false;
                    if let Some(sub) = entry.subscription.take() {
                        sub.cancel();
                    }
                    Err(error)
                }
                _ => Ok(false),
            },
        }
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.tracked.get(id).map(|t| t.online).unwrap_or(false)
    }

    pub fn flags(&self) -> HashMap<String, bool> {
        self.tracked
            .iter()
            .map(|(id, t)| (id.clone(), t.online))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        for (_, entry) in self.tracked.drain() {
            if let Some(sub) = entry.subscription {
                sub.cancel();
            }
        }
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.clear();
    }
}
