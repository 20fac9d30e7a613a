//! The `broker` module: the registry of subscribers and topics, and the
//! fan-out of published messages to per-subscriber inboxes.

pub mod engine;
pub mod id;
pub mod message;
pub mod subscriber;
pub mod topic;

pub use engine::Broker;
pub use message::Message;
pub use subscriber::{Delivery, DeliveryPolicy, Subscriber};
