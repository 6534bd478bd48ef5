//! In-process, topic-keyed event bus.
//!
//! [`EventBus`] multicasts each published [`Event`] to every handler
//! subscribed to the event's [`Topic`]. Delivery is fire-and-forget: every
//! handler invocation runs as its own tokio task, so `publish` never waits on
//! a subscriber and a slow handler cannot stall the publisher or its peers.
//!
//! Delivery is at-most-once per subscriber. There is no replay; a handler
//! registered after a publish never sees it.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ids::{DirectoryId, SeriesId, SubscriptionId};

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// Subscription key. Each [`EventPayload`] variant belongs to exactly one
/// topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "scan.started")]
    ScanStarted,
    #[serde(rename = "scan.progress")]
    ScanProgress,
    #[serde(rename = "scan.completed")]
    ScanCompleted,
    #[serde(rename = "scan.cancelled")]
    ScanCancelled,
    #[serde(rename = "series.discovered")]
    SeriesDiscovered,
    #[serde(rename = "metadata.updated")]
    MetadataUpdated,
}

impl Topic {
    /// Dotted wire name, e.g. `"scan.progress"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ScanStarted => "scan.started",
            Topic::ScanProgress => "scan.progress",
            Topic::ScanCompleted => "scan.completed",
            Topic::ScanCancelled => "scan.cancelled",
            Topic::SeriesDiscovered => "series.discovered",
            Topic::MetadataUpdated => "metadata.updated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Scan lifecycle ------------------------------------------------------
    ScanStarted {
        directory: PathBuf,
    },
    ScanProgress {
        directory: PathBuf,
        current: u64,
        total: u64,
    },
    ScanCompleted {
        added: u64,
        updated: u64,
        directory_id: Option<DirectoryId>,
    },
    ScanCancelled {
        directory_id: Option<DirectoryId>,
    },

    // -- Catalog -------------------------------------------------------------
    SeriesDiscovered {
        series_id: SeriesId,
        title: String,
    },
    MetadataUpdated {
        series_id: SeriesId,
    },
}

impl EventPayload {
    /// The topic this payload is published under.
    pub fn topic(&self) -> Topic {
        match self {
            EventPayload::ScanStarted { .. } => Topic::ScanStarted,
            EventPayload::ScanProgress { .. } => Topic::ScanProgress,
            EventPayload::ScanCompleted { .. } => Topic::ScanCompleted,
            EventPayload::ScanCancelled { .. } => Topic::ScanCancelled,
            EventPayload::SeriesDiscovered { .. } => Topic::SeriesDiscovered,
            EventPayload::MetadataUpdated { .. } => Topic::MetadataUpdated,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event as seen by handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn topic(&self) -> Topic {
        self.payload.topic()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Type-erased async handler.
pub type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Topic-keyed multicast bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<Topic, Vec<(SubscriptionId, Handler)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler for `topic`.
    pub fn subscribe<F, Fut>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        let id = SubscriptionId::new();
        self.subscribers
            .write()
            .entry(topic)
            .or_default()
            .push((id, handler));
        tracing::debug!(topic = %topic, subscription = %id, "Subscribed");
        id
    }

    /// Register a synchronous handler for `topic`.
    ///
    /// The closure still runs on its own task, never on the publisher.
    pub fn subscribe_fn<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.subscribe(topic, move |event| {
            let handler = handler.clone();
            async move { handler(event) }
        })
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    ///
    /// Deliveries already dispatched to the handler still run to completion.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(handlers) = subscribers.get_mut(&topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sub_id, _)| *sub_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(&topic);
        }
        removed
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.read().get(&topic).map_or(0, Vec::len)
    }

    /// Publish `payload` to every current subscriber of its topic.
    ///
    /// Returns the number of deliveries dispatched. Outside a tokio runtime
    /// nothing can be dispatched; the event is dropped with a warning.
    pub fn publish(&self, payload: EventPayload) -> usize {
        let topic = payload.topic();
        // Snapshot under the lock, dispatch after releasing it so handlers
        // may subscribe or unsubscribe freely.
        let handlers: Vec<Handler> = match self.subscribers.read().get(&topic) {
            Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(topic = %topic, "No async runtime; dropping event");
                return 0;
            }
        };

        let event = Event::new(payload);
        for handler in &handlers {
            runtime.spawn(handler(event.clone()));
        }
        handlers.len()
    }
}
