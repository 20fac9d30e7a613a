use serde::Deserialize;

use crate::broker::subscriber::DeliveryPolicy;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker, logging and the demo producer.
/// `Default` provides the values used when no source sets them.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub log: LogSettings,
    pub demo: DemoSettings,
}

/// How subscriber inboxes hand off messages.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Rendezvous,
    Buffered,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub delivery: DeliveryMode,
    /// Queue length per subscriber in buffered mode. Ignored for rendezvous.
    pub inbox_capacity: usize,
    /// How many fresh ids to try before giving up on `add_subscriber`.
    pub id_attempts: u32,
}

impl BrokerSettings {
    pub fn delivery_policy(&self) -> DeliveryPolicy {
        match self.delivery {
            DeliveryMode::Rendezvous => DeliveryPolicy::Rendezvous,
            DeliveryMode::Buffered => DeliveryPolicy::Buffered {
                capacity: self.inbox_capacity.max(1),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Settings for the demonstration price producer.
#[derive(Debug, Deserialize, Clone)]
pub struct DemoSettings {
    pub topics: Vec<String>,
    pub max_pause_secs: u64,
    /// Broadcast every price to all topics instead of one random topic.
    pub broadcast: bool,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
    pub demo: Option<PartialDemoSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub delivery: Option<DeliveryMode>,
    pub inbox_capacity: Option<usize>,
    pub id_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDemoSettings {
    pub topics: Option<Vec<String>>,
    pub max_pause_secs: Option<u64>,
    pub broadcast: Option<bool>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Rendezvous,
            inbox_capacity: 16,
            id_attempts: 8,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            topics: ["BITCOIN", "ETHEREUM", "POLKADOT", "SOLANA"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_pause_secs: 3,
            broadcast: false,
        }
    }
}

impl PartialSettings {
    /// Merge onto `Settings::default()`.
    pub fn merge(self) -> Settings {
        let default = Settings::default();
        let broker = self.broker;
        let log = self.log;
        let demo = self.demo;

        Settings {
            broker: BrokerSettings {
                delivery: broker
                    .as_ref()
                    .and_then(|b| b.delivery)
                    .unwrap_or(default.broker.delivery),
                inbox_capacity: broker
                    .as_ref()
                    .and_then(|b| b.inbox_capacity)
                    .unwrap_or(default.broker.inbox_capacity),
                id_attempts: broker
                    .as_ref()
                    .and_then(|b| b.id_attempts)
                    .unwrap_or(default.broker.id_attempts),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
            demo: DemoSettings {
                topics: demo
                    .as_ref()
                    .and_then(|d| d.topics.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or(default.demo.topics),
                max_pause_secs: demo
                    .as_ref()
                    .and_then(|d| d.max_pause_secs)
                    .unwrap_or(default.demo.max_pause_secs),
                broadcast: demo
                    .as_ref()
                    .and_then(|d| d.broadcast)
                    .unwrap_or(default.demo.broadcast),
            },
        }
    }
}
