//! Topic-based event delivery
//!
//! Sync jobs subscribe to `datadog-entity-sync.<syncId>`; publishing a
//! `{ entityFilter, dryRun }` payload on that topic triggers a run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParams {
    pub topic: String,
    pub event_payload: serde_json::Value,
}

/// Receives events for the topics it subscribed to
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, params: EventParams);
}

pub struct EventSubscription {
    pub id: String,
    pub topics: Vec<String>,
    pub handler: Arc<dyn EventSubscriber>,
}

/// Publish/subscribe transport
#[async_trait]
pub trait EventBus: Send + Sync {
    fn subscribe(&self, subscription: EventSubscription);

    /// Deliver to every subscriber of the topic; returns the delivery count
    async fn publish(&self, params: EventParams) -> usize;
}

type Subscribers = HashMap<String, Vec<(String, Arc<dyn EventSubscriber>)>>;

/// In-process event bus
///
/// Each delivery runs in its own task, so a slow or panicking subscriber
/// never blocks the publisher or the other subscribers.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: RwLock<Subscribers>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn subscribe(&self, subscription: EventSubscription) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        for topic in subscription.topics {
            debug!(subscriber = %subscription.id, topic = %topic, "Subscribed to topic");
            subscribers
                .entry(topic)
                .or_default()
                .push((subscription.id.clone(), subscription.handler.clone()));
        }
    }

    async fn publish(&self, params: EventParams) -> usize {
        let handlers: Vec<_> = {
            let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subscribers
                .get(&params.topic)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        debug!(topic = %params.topic, subscribers = handlers.len(), "Publishing event");
        for handler in &handlers {
            let handler = handler.clone();
            let params = params.clone();
            tokio::spawn(async move { handler.on_event(params).await });
        }
        handlers.len()
    }
}
