//! Demonstration producer and sink.
//!
//! `PricePublisher` manufactures random price ticks for a fixed topic
//! catalog and pushes them through [`Broker::publish`] (or
//! [`Broker::broadcast`]). `print_sink` is a receive-loop callback that logs
//! each message as JSON. Neither is part of the broker contract; any producer
//! or sink can take their place.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::broker::{Broker, Message, Subscriber};
use crate::config::DemoSettings;
use crate::utils::error::BrokerError;

pub struct PricePublisher {
    broker: Arc<Broker>,
    topics: Vec<String>,
    max_pause_secs: u64,
    broadcast: bool,
}

impl PricePublisher {
    pub fn new(broker: Arc<Broker>, settings: &DemoSettings) -> Self {
        Self {
            broker,
            topics: settings.topics.clone(),
            max_pause_secs: settings.max_pause_secs,
            broadcast: settings.broadcast,
        }
    }

    /// Publish one random price. Returns the number of deliveries dispatched.
    pub fn publish_once(&self) -> usize {
        let mut rng = rand::thread_rng();
        let price = format!("{:.6}", rng.r#gen::<f64>());

        if self.broadcast {
            info!(%price, topics = self.topics.len(), "broadcasting price");
            return self.broker.broadcast(&price, &self.topics);
        }

        match self.topics.choose(&mut rng) {
            Some(topic) => {
                info!(%price, %topic, "publishing price");
                self.broker.publish(topic, &price)
            }
            None => {
                warn!("no demo topics configured, nothing to publish");
                0
            }
        }
    }

    fn next_pause(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(0..=self.max_pause_secs);
        Duration::from_secs(secs)
    }

    /// Publish forever, pausing a random number of seconds between ticks.
    pub async fn run(self) {
        loop {
            self.publish_once();
            tokio::time::sleep(self.next_pause()).await;
        }
    }
}

/// Catalog entry at `index`, if the catalog is that long.
pub fn catalog_topic(catalog: &[String], index: usize) -> Option<&str> {
    let topic = catalog.get(index).map(String::as_str);
    if topic.is_none() {
        warn!(index, catalog = catalog.len(), "demo catalog too short, topic skipped");
    }
    topic
}

/// Subscribes `subscriber` to the catalog entries at `indices`, skipping the
/// ones the catalog does not have. Returns the topics joined.
pub fn subscribe_catalog(
    broker: &Broker,
    subscriber: &Subscriber,
    catalog: &[String],
    indices: &[usize],
) -> Result<Vec<String>, BrokerError> {
    let mut joined = Vec::with_capacity(indices.len());
    for topic in indices.iter().filter_map(|&i| catalog_topic(catalog, i)) {
        broker.subscribe(subscriber, topic)?;
        joined.push(topic.to_string());
    }
    Ok(joined)
}

/// A receive-loop callback that logs every message for `subscriber`.
pub fn print_sink(subscriber: String) -> impl FnMut(Message) + Send + 'static {
    move |msg: Message| match serde_json::to_string(&msg) {
        Ok(json) => info!(%subscriber, message = %json, "received"),
        Err(e) => warn!(%subscriber, error = %e, "failed to serialize received message"),
    }
}
