//! Demonstration binary.
//!
//! Wires a fixed topology onto the broker: two subscribers with overlapping
//! topics, a few delayed membership changes, and a random price producer.
//! Runs until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use fanout::broker::{Broker, Subscriber};
use fanout::config::load_config;
use fanout::demo::{PricePublisher, catalog_topic, print_sink, subscribe_catalog};
use fanout::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    if let Err(e) = run(config).await {
        error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn spawn_listener(subscriber: Arc<Subscriber>) {
    tokio::spawn(async move {
        let sink = print_sink(subscriber.id().to_string());
        match subscriber.listen(sink).await {
            Ok(received) => info!(subscriber = %subscriber.id(), received, "listener stopped"),
            Err(e) => error!("listener failed: {}", e),
        }
    });
}

async fn run(config: fanout::config::Settings) -> Result<(), Box<dyn std::error::Error>> {
    let broker = Arc::new(Broker::with_settings(&config.broker));
    let catalog = config.demo.topics.clone();
    let (ethereum, polkadot, solana) = (
        catalog_topic(&catalog, 1).map(str::to_string),
        catalog_topic(&catalog, 2).map(str::to_string),
        catalog_topic(&catalog, 3).map(str::to_string),
    );

    let s1 = broker.add_subscriber()?;
    subscribe_catalog(&broker, &s1, &catalog, &[0, 1])?;

    let s2 = broker.add_subscriber()?;
    subscribe_catalog(&broker, &s2, &catalog, &[1, 3])?;

    if let Some(polkadot) = polkadot {
        let (broker, s2) = (broker.clone(), s2.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            if let Err(e) = broker.subscribe(&s2, &polkadot) {
                error!("late subscribe failed: {}", e);
            }
        });
    }

    if let Some(solana) = solana {
        let (broker, s2, ethereum) = (broker.clone(), s2.clone(), ethereum.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            if let Err(e) = broker.unsubscribe(&s2, &solana) {
                error!("unsubscribe failed: {}", e);
            }
            if let Some(ethereum) = ethereum {
                info!(topic = %ethereum, subscribers = broker.get_subscribers(&ethereum), "subscriber count");
            }
        });
    }

    {
        let (broker, s2) = (broker.clone(), s2.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            if let Err(e) = broker.remove_subscriber(&s2) {
                error!("remove failed: {}", e);
            }
            if let Some(ethereum) = ethereum {
                info!(topic = %ethereum, subscribers = broker.get_subscribers(&ethereum), "subscriber count");
            }
        });
    }

    spawn_listener(s1);
    spawn_listener(s2);

    let publisher = PricePublisher::new(broker.clone(), &config.demo);

    tokio::select! {
        _ = publisher.run() => {
            error!("price publisher exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}
