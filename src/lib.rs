//! # fanout
//!
//! `fanout` is an in-process, topic-based publish/subscribe broker built on
//! Tokio. Producers publish a body to a topic; every subscriber joined to the
//! topic receives its own [`Message`](broker::Message) through its inbox and
//! drains it from a receive loop.
//!
//! ## Core Modules
//!
//! - `broker`: the subscriber/topic registry, subscription management and
//!   concurrent fan-out delivery.
//! - `config`: loading settings from file and environment.
//! - `demo`: a sample price producer and printing sink used by the binary.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod demo;
pub mod utils;

pub use broker::{Broker, Delivery, DeliveryPolicy, Message, Subscriber};
pub use utils::error::{BrokerError, IdError, SubscriberError};
