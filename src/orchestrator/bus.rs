//! In-process publish/subscribe transport with history
//!
//! Connects agents and the supervisor. Delivery is deferred: `publish`
//! records the message and hands it to a dispatcher task, so publishers
//! never block on subscriber processing. Handlers for one publish run in
//! registration order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::orchestrator::lock;

/// Topic used by workers to report completion to their parent
pub const TOPIC_TASK_COMPLETE: &str = "task:complete";

/// A message recorded on the bus. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    /// Target participant; `None` broadcasts to every subscriber
    pub to: Option<String>,
    pub topic: String,
    pub content: Value,
    #[serde(default)]
    pub meta: Value,
    pub ts: DateTime<Utc>,
}

/// Fields supplied by a publisher; id and timestamp are assigned by the bus
#[derive(Debug, Clone)]
pub struct Draft {
    pub from: String,
    pub to: Option<String>,
    pub topic: String,
    pub content: Value,
    pub meta: Value,
}

impl Draft {
    /// Message addressed to a single participant
    pub fn targeted(
        from: impl Into<String>,
        to: impl Into<String>,
        topic: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
            topic: topic.into(),
            content,
            meta: Value::Null,
        }
    }

    /// Message delivered to every current subscriber
    pub fn broadcast(from: impl Into<String>, topic: impl Into<String>, content: Value) -> Self {
        Self {
            from: from.into(),
            to: None,
            topic: topic.into(),
            content,
            meta: Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Optional sender/target filter for `history`
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub to: Option<String>,
    pub from: Option<String>,
}

type Handler = Arc<dyn Fn(Message) + Send + Sync>;

struct HandlerEntry {
    token: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    history: Vec<Message>,
    subscribers: HashMap<String, Vec<HandlerEntry>>,
    next_token: u64,
}

struct Delivery {
    message: Message,
    handlers: Vec<Handler>,
}

/// Asynchronous publish/subscribe bus shared by one run's participants.
/// History grows for the life of the bus; callers create a fresh bus per run.
pub struct MessageBus {
    inner: Mutex<BusInner>,
    dispatch_tx: mpsc::UnboundedSender<Delivery>,
}

impl MessageBus {
    /// Create a bus and start its dispatcher task
    pub fn new() -> Arc<Self> {
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel::<Delivery>();
        let bus = Arc::new(Self {
            inner: Mutex::new(BusInner::default()),
            dispatch_tx,
        });

        // The dispatcher ends when the bus is dropped and the channel closes.
        tokio::spawn(async move {
            while let Some(delivery) = dispatch_rx.recv().await {
                for handler in &delivery.handlers {
                    handler(delivery.message.clone());
                }
            }
        });

        bus
    }

    /// Register a handler under a participant id. Several handlers may share
    /// one id; the returned subscription removes exactly this handler.
    pub fn subscribe<F>(self: &Arc<Self>, participant: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let participant = participant.into();
        let mut inner = lock(&self.inner);
        let token = inner.next_token;
        inner.next_token += 1;
        inner
            .subscribers
            .entry(participant.clone())
            .or_default()
            .push(HandlerEntry { token, handler: Arc::new(handler) });

        Subscription {
            bus: Arc::downgrade(self),
            participant,
            token,
        }
    }

    /// Record a message and schedule its delivery. Resolves once the message
    /// is in the history and dispatch is queued; handler completion is not
    /// awaited. Publishing to an unknown target simply has zero recipients.
    pub fn publish(&self, draft: Draft) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            from: draft.from,
            to: draft.to,
            topic: draft.topic,
            content: draft.content,
            meta: draft.meta,
            ts: Utc::now(),
        };

        let handlers: Vec<Handler> = {
            let mut inner = lock(&self.inner);
            inner.history.push(message.clone());
            match &message.to {
                Some(target) => inner
                    .subscribers
                    .get(target)
                    .map(|entries| entries.iter().map(|e| e.handler.clone()).collect())
                    .unwrap_or_default(),
                None => {
                    let mut all: Vec<(u64, Handler)> = inner
                        .subscribers
                        .values()
                        .flatten()
                        .map(|e| (e.token, e.handler.clone()))
                        .collect();
                    all.sort_by_key(|(token, _)| *token);
                    all.into_iter().map(|(_, handler)| handler).collect()
                }
            }
        };

        if !handlers.is_empty() {
            let _ = self.dispatch_tx.send(Delivery {
                message: message.clone(),
                handlers,
            });
        }

        message
    }

    /// Messages in publish order, optionally filtered by sender or target
    pub fn history(&self, filter: &HistoryFilter) -> Vec<Message> {
        let inner = lock(&self.inner);
        inner
            .history
            .iter()
            .filter(|message| {
                let matches_to = filter
                    .to
                    .as_deref()
                    .map_or(true, |t| message.to.as_deref() == Some(t));
                let matches_from = filter.from.as_deref().map_or(true, |f| message.from == f);
                matches_to && matches_from
            })
            .cloned()
            .collect()
    }
}

/// Removes one handler when used; safe to call more than once
pub struct Subscription {
    bus: Weak<MessageBus>,
    participant: String,
    token: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            let mut inner = lock(&bus.inner);
            if let Some(entries) = inner.subscribers.get_mut(&self.participant) {
                entries.retain(|entry| entry.token != self.token);
                if entries.is_empty() {
                    inner.subscribers.remove(&self.participant);
                }
            }
        }
    }
}
