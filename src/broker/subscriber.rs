//! Subscriber endpoint
//!
//! A `Subscriber` owns an inbox, the set of topics the broker registered it
//! under, and a liveness flag. The broker hands messages to it through
//! [`Subscriber::signal`]; the owner drains them with [`Subscriber::listen`].
//!
//! Locking:
//! - `state` (topics, `active`, the inbox sender) sits behind its own
//!   `RwLock`, independent of the broker registry lock.
//! - `signal` holds the read lock only while it checks `active` and clones
//!   the sender. `destruct` takes the write lock, so no `signal` can start
//!   once a destruct has begun, and none can write to an inbox after its
//!   sender side is gone.
//! - the lock is never held across an `.await`.
//!
//! Delivery policy is chosen per subscriber, see [`DeliveryPolicy`].

use std::collections::BTreeSet;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::broker::topic::SubscriberId;
use crate::utils::error::SubscriberError;

/// How `signal` hands a message to the receive loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Hand-to-hand: `signal` resolves only once `listen` has taken the
    /// message. A stalled receiver blocks the dispatching task indefinitely;
    /// this is the backpressure the broker relies on.
    #[default]
    Rendezvous,
    /// Bounded FIFO of `capacity` messages. `signal` blocks only while the
    /// queue is full and never drops a message it accepted.
    Buffered { capacity: usize },
}

/// Outcome of a single [`Subscriber::signal`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Taken by the receive loop (rendezvous) or queued (buffered).
    Delivered,
    /// The subscriber was inactive or its inbox closed; the message is gone.
    Dropped,
}

struct Envelope {
    message: Message,
    ack: Option<oneshot::Sender<()>>,
}

struct SubscriberState {
    active: bool,
    topics: BTreeSet<String>,
    sender: Option<mpsc::Sender<Envelope>>,
}

pub struct Subscriber {
    id: SubscriberId,
    policy: DeliveryPolicy,
    state: RwLock<SubscriberState>,
    inbox: Mutex<Option<mpsc::Receiver<Envelope>>>,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, policy: DeliveryPolicy) -> Self {
        let capacity = match policy {
            DeliveryPolicy::Rendezvous => 1,
            DeliveryPolicy::Buffered { capacity } => capacity.max(1),
        };
        let (tx, rx) = mpsc::channel(capacity);

        Self {
            id,
            policy,
            state: RwLock::new(SubscriberState {
                active: true,
                topics: BTreeSet::new(),
                sender: Some(tx),
            }),
            inbox: Mutex::new(Some(rx)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Record `topic` locally. Returns `Ok(false)` if it was already present
    /// and `Inactive` once the subscriber has been destructed.
    ///
    /// Only the broker calls this, inside its registry write lock, so the
    /// topic set never drifts from the broker's reverse index.
    pub(crate) fn add_topic(&self, topic: &str) -> Result<bool, SubscriberError> {
        let mut state = self.state.write();
        if !state.active {
            return Err(SubscriberError::Inactive(self.id.clone()));
        }
        Ok(state.topics.insert(topic.to_string()))
    }

    /// Forget `topic` locally. Returns `false` if it was not present.
    ///
    /// Allowed after `destruct`: the broker still has to unwind the topics of
    /// a subscriber that was destructed before it was removed.
    pub(crate) fn remove_topic(&self, topic: &str) -> bool {
        self.state.write().topics.remove(topic)
    }

    /// Snapshot of the joined topics, sorted by name.
    pub fn get_topics(&self) -> Vec<String> {
        self.state.read().topics.iter().cloned().collect()
    }

    /// Hand `message` to the inbox.
    ///
    /// Inactive subscribers drop the message without blocking. Otherwise the
    /// call waits according to the subscriber's [`DeliveryPolicy`]. Has no
    /// timeout.
    pub async fn signal(&self, message: Message) -> Delivery {
        let sender = {
            let state = self.state.read();
            match (state.active, state.sender.as_ref()) {
                (true, Some(sender)) => sender.clone(),
                _ => {
                    debug!(subscriber = %self.id, topic = message.topic(), "dropped message for inactive subscriber");
                    return Delivery::Dropped;
                }
            }
        };

        match self.policy {
            DeliveryPolicy::Buffered { .. } => {
                let envelope = Envelope { message, ack: None };
                match sender.send(envelope).await {
                    Ok(()) => Delivery::Delivered,
                    Err(_) => Delivery::Dropped,
                }
            }
            DeliveryPolicy::Rendezvous => {
                let (ack_tx, ack_rx) = oneshot::channel();
                let envelope = Envelope {
                    message,
                    ack: Some(ack_tx),
                };
                if sender.send(envelope).await.is_err() {
                    return Delivery::Dropped;
                }
                // Release our sender clone before waiting so a destructed inbox can close.
                drop(sender);
                match ack_rx.await {
                    Ok(()) => Delivery::Delivered,
                    Err(_) => Delivery::Dropped,
                }
            }
        }
    }

    /// Run the receive loop, passing every message to `on_message` in the
    /// order it was accepted.
    ///
    /// Returns once the subscriber has been destructed and everything already
    /// accepted has been drained. There is no other way to stop it. Returns
    /// the number of messages surfaced. Dropping the future hands the inbox
    /// back, so a later `listen` picks up where this one stopped.
    pub async fn listen<F>(&self, mut on_message: F) -> Result<usize, SubscriberError>
    where
        F: FnMut(Message),
    {
        let mut lease = {
            let state = self.state.read();
            let taken = self.inbox.lock().take();
            match taken {
                Some(rx) => InboxLease {
                    subscriber: self,
                    rx: Some(rx),
                },
                None if state.active => {
                    return Err(SubscriberError::AlreadyListening(self.id.clone()));
                }
                None => return Err(SubscriberError::Inactive(self.id.clone())),
            }
        };

        let mut received = 0;
        while let Some(Envelope { message, ack }) = lease.recv().await {
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
            received += 1;
            on_message(message);
        }

        debug!(subscriber = %self.id, received, "receive loop finished");
        Ok(received)
    }

    /// Deactivate the subscriber and close its inbox.
    ///
    /// Topics are left in place; [`Broker::remove_subscriber`] unwinds them.
    /// Calling this twice is a lifecycle bug and is reported.
    ///
    /// [`Broker::remove_subscriber`]: crate::broker::Broker::remove_subscriber
    pub fn destruct(&self) -> Result<(), SubscriberError> {
        let mut state = self.state.write();
        if !state.active {
            warn!(subscriber = %self.id, "destruct called on inactive subscriber");
            return Err(SubscriberError::AlreadyDestructed(self.id.clone()));
        }
        state.active = false;
        state.sender = None;

        // Nobody is listening: close the inbox so pending signals give up.
        // Taken while still holding the state lock, so `listen` sees either the
        // receiver or an inactive subscriber.
        drop(self.inbox.lock().take());

        debug!(subscriber = %self.id, "subscriber destructed");
        Ok(())
    }
}

/// The inbox receiver while a receive loop holds it.
///
/// On drop the receiver goes back to the subscriber unless it was destructed
/// meanwhile; then it is closed, as `destruct` would have done.
struct InboxLease<'a> {
    subscriber: &'a Subscriber,
    rx: Option<mpsc::Receiver<Envelope>>,
}

impl InboxLease<'_> {
    async fn recv(&mut self) -> Option<Envelope> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for InboxLease<'_> {
    fn drop(&mut self) {
        let Some(rx) = self.rx.take() else {
            return;
        };
        // Same lock order as `destruct`: state, then inbox.
        let state = self.subscriber.state.read();
        if state.active {
            *self.subscriber.inbox.lock() = Some(rx);
            debug!(subscriber = %self.subscriber.id, "receive loop dropped, inbox returned");
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("active", &state.active)
            .field("topics", &state.topics)
            .finish()
    }
}
