//! The `error` module defines the error types used within `fanout`.
//!
//! Registry-level failures (identity generation, unknown or already removed
//! subscribers) are returned to the caller. Per-recipient delivery outcomes
//! are never errors; see [`Delivery`](crate::broker::subscriber::Delivery).

use thiserror::Error;

use crate::broker::topic::SubscriberId;

/// The identity generator could not produce an id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("identity source failed: {0}")]
    Entropy(String),
}

/// Errors reported by [`Subscriber`](crate::broker::Subscriber) lifecycle calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("subscriber {0} was already destructed")]
    AlreadyDestructed(SubscriberId),

    #[error("subscriber {0} already has a receive loop")]
    AlreadyListening(SubscriberId),

    #[error("subscriber {0} is inactive")]
    Inactive(SubscriberId),
}

/// Errors reported by [`Broker`](crate::broker::Broker) registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("failed to mint subscriber id")]
    Identity(#[from] IdError),

    #[error("no unused subscriber id after {attempts} attempts")]
    IdentityExhausted { attempts: u32 },

    #[error("subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),

    #[error("topic name must not be empty")]
    EmptyTopic,

    #[error(transparent)]
    Subscriber(#[from] SubscriberError),
}
