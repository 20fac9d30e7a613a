use serde::{Deserialize, Serialize};

/// A message delivered to a single subscriber.
///
/// The broker builds a fresh `Message` for every recipient of a publish,
/// so a value is owned by exactly one delivery path and never mutated
/// after construction.
///
/// # Example
///
/// ```rust
/// use fanout::broker::message::Message;
///
/// let msg = Message::new("BITCOIN", "0.4512");
/// assert_eq!(msg.topic(), "BITCOIN");
/// assert_eq!(msg.body(), "0.4512");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    topic: String,
    body: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }

    /// Name of the topic this message was published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The published payload.
    pub fn body(&self) -> &str {
        &self.body
    }
}
