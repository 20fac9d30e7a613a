//! Broker engine
//!
//! The broker owns the registry of subscribers and the reverse index from
//! topic name to subscriber ids, and fans published messages out to the
//! subscribers of a topic.
//!
//! Concurrency notes:
//! - The registry is one resource behind one `RwLock`. Every mutation
//!   (`add_subscriber`, `remove_subscriber`, `subscribe`, `unsubscribe`)
//!   holds the write lock for its whole critical section and updates both
//!   sides of a membership (topic index and subscriber topic set) before
//!   releasing it. Reads (`get_subscribers`, the publish snapshot) take the
//!   read lock.
//! - Lock order is registry, then subscriber state. The registry lock is
//!   never held while a message is delivered.
//! - `publish` and `broadcast` spawn one Tokio task per recipient and return
//!   immediately. Outside a Tokio runtime they dispatch nothing and return 0.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::broker::id::{IdGenerator, RandomIdGenerator};
use crate::broker::message::Message;
use crate::broker::subscriber::{DeliveryPolicy, Subscriber};
use crate::broker::topic::{SubscriberId, Topic};
use crate::config::BrokerSettings;
use crate::utils::error::{BrokerError, SubscriberError};

#[derive(Debug, Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
    topics: HashMap<String, Topic>,
}

impl Registry {
    fn ensure_registered(&self, subscriber: &Subscriber) -> Result<(), BrokerError> {
        match self.subscribers.get(subscriber.id()) {
            Some(registered) if std::ptr::eq(Arc::as_ptr(registered), subscriber) => Ok(()),
            _ => Err(BrokerError::UnknownSubscriber(subscriber.id().to_string())),
        }
    }

    fn unsubscribe(&mut self, subscriber: &Subscriber, topic: &str) -> bool {
        let removed = self
            .topics
            .get_mut(topic)
            .is_some_and(|t| t.unsubscribe(subscriber.id()));
        subscriber.remove_topic(topic);
        removed
    }

    fn snapshot(&self, topic: &str) -> Vec<Arc<Subscriber>> {
        self.topics
            .get(topic)
            .map(|t| {
                t.subscribers
                    .iter()
                    .filter_map(|id| self.subscribers.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct Broker {
    registry: RwLock<Registry>,
    ids: Box<dyn IdGenerator>,
    policy: DeliveryPolicy,
    id_attempts: u32,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::with_settings(&BrokerSettings::default())
    }

    pub fn with_settings(settings: &BrokerSettings) -> Self {
        Self::with_id_generator(settings, RandomIdGenerator)
    }

    /// Build a broker that mints subscriber ids from `ids`.
    pub fn with_id_generator(settings: &BrokerSettings, ids: impl IdGenerator + 'static) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            ids: Box::new(ids),
            policy: settings.delivery_policy(),
            id_attempts: settings.id_attempts.max(1),
        }
    }

    /// Registers a new, active subscriber with no topics.
    ///
    /// Fails if the id generator fails, or if it keeps returning ids that
    /// are already live.
    pub fn add_subscriber(&self) -> Result<Arc<Subscriber>, BrokerError> {
        let mut registry = self.registry.write();

        for _ in 0..self.id_attempts {
            let id = self.ids.new_id()?;
            if registry.subscribers.contains_key(&id) {
                warn!(%id, "generated subscriber id is already live, retrying");
                continue;
            }
            let subscriber = Arc::new(Subscriber::new(id.clone(), self.policy));
            registry.subscribers.insert(id.clone(), subscriber.clone());
            info!(subscriber = %id, "subscriber added");
            return Ok(subscriber);
        }

        Err(BrokerError::IdentityExhausted {
            attempts: self.id_attempts,
        })
    }

    /// Unsubscribes `subscriber` from all its topics, drops it from the
    /// registry and destructs it.
    ///
    /// Removing a subscriber that is not registered (for instance a second
    /// time) is reported as [`BrokerError::UnknownSubscriber`].
    pub fn remove_subscriber(&self, subscriber: &Subscriber) -> Result<(), BrokerError> {
        {
            let mut registry = self.registry.write();
            registry.ensure_registered(subscriber)?;

            for topic in subscriber.get_topics() {
                registry.unsubscribe(subscriber, &topic);
                info!(subscriber = %subscriber.id(), %topic, "unsubscribed");
            }
            registry.subscribers.remove(subscriber.id());
        }

        match subscriber.destruct() {
            Ok(()) => {}
            Err(SubscriberError::AlreadyDestructed(id)) => {
                warn!(subscriber = %id, "removed a subscriber that was already destructed");
            }
            Err(e) => return Err(e.into()),
        }

        info!(subscriber = %subscriber.id(), "subscriber removed");
        Ok(())
    }

    /// Subscribes a registered subscriber to a topic. Automatically creates
    /// the topic if it doesn't exist.
    ///
    /// A subscriber destructed directly but not yet removed is refused with
    /// [`SubscriberError::Inactive`] and neither side changes.
    pub fn subscribe(&self, subscriber: &Subscriber, topic: &str) -> Result<(), BrokerError> {
        if topic.is_empty() {
            return Err(BrokerError::EmptyTopic);
        }

        let mut registry = self.registry.write();
        registry.ensure_registered(subscriber)?;

        // Subscriber side first: a destructed subscriber must not enter the index.
        if let Err(e) = subscriber.add_topic(topic) {
            warn!(subscriber = %subscriber.id(), %topic, "subscribe refused for inactive subscriber");
            return Err(e.into());
        }
        registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber.id().to_string());

        info!(subscriber = %subscriber.id(), %topic, "subscribed");
        Ok(())
    }

    /// Unsubscribes a registered subscriber from a topic. Unknown topics and
    /// topics the subscriber never joined are a no-op.
    pub fn unsubscribe(&self, subscriber: &Subscriber, topic: &str) -> Result<(), BrokerError> {
        let mut registry = self.registry.write();
        registry.ensure_registered(subscriber)?;

        if registry.unsubscribe(subscriber, topic) {
            info!(subscriber = %subscriber.id(), %topic, "unsubscribed");
        }
        Ok(())
    }

    /// Number of subscribers currently joined to `topic`; 0 if unknown.
    pub fn get_subscribers(&self, topic: &str) -> usize {
        self.registry.read().topics.get(topic).map_or(0, Topic::len)
    }

    /// Publishes `body` to every subscriber of `topic`.
    ///
    /// Takes a snapshot of the topic's subscribers, then spawns one delivery
    /// task per active recipient. Inactive recipients are skipped and the
    /// rest are still attempted. Returns the number of tasks launched without
    /// waiting for any of them; 0 when called outside a Tokio runtime.
    pub fn publish(&self, topic: &str, body: &str) -> usize {
        let recipients = self.registry.read().snapshot(topic);
        if recipients.is_empty() {
            debug!(%topic, "no subscribers, nothing published");
            return 0;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(%topic, "publish called outside a Tokio runtime, nothing dispatched");
            return 0;
        };

        let mut dispatched = 0;
        for subscriber in recipients {
            if !subscriber.is_active() {
                debug!(subscriber = %subscriber.id(), %topic, "skipping inactive subscriber");
                continue;
            }
            let message = Message::new(topic, body);
            runtime.spawn(async move {
                let outcome = subscriber.signal(message).await;
                debug!(subscriber = %subscriber.id(), ?outcome, "delivery finished");
            });
            dispatched += 1;
        }

        debug!(%topic, dispatched, "published");
        dispatched
    }

    /// Publishes `body` to each topic in `topics`. Returns the total number
    /// of delivery tasks launched.
    pub fn broadcast<I, S>(&self, body: &str, topics: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        topics
            .into_iter()
            .map(|topic| self.publish(topic.as_ref(), body))
            .sum()
    }

    /// Looks up a registered subscriber by id.
    pub fn subscriber(&self, id: &str) -> Option<Arc<Subscriber>> {
        self.registry.read().subscribers.get(id).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    /// Every topic ever subscribed to, including ones left empty, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.registry.read().topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Ids joined to `topic`, sorted. Empty for unknown topics.
    pub fn topic_members(&self, topic: &str) -> Vec<SubscriberId> {
        let registry = self.registry.read();
        let mut ids: Vec<SubscriberId> = registry
            .topics
            .get(topic)
            .map(|t| t.subscribers.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Broker")
            .field("subscribers", &registry.subscribers.len())
            .field("topics", &registry.topics.len())
            .field("policy", &self.policy)
            .finish()
    }
}
