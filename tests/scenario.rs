use std::sync::Arc;
use std::time::Duration;

use fanout::{Broker, Delivery, Message, Subscriber};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn listen_into(subscriber: &Arc<Subscriber>) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscriber = subscriber.clone();
    tokio::spawn(async move {
        let _ = subscriber
            .listen(move |msg| {
                let _ = tx.send(msg);
            })
            .await;
    });
    rx
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Message> {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn two_subscribers_join_leave_and_removal() {
    let broker = Broker::new();

    let s1 = broker.add_subscriber().unwrap();
    broker.subscribe(&s1, "X").unwrap();

    let s2 = broker.add_subscriber().unwrap();
    broker.subscribe(&s2, "X").unwrap();
    broker.subscribe(&s2, "Y").unwrap();

    let mut rx1 = listen_into(&s1);
    let mut rx2 = listen_into(&s2);

    assert_eq!(broker.publish("X", "p1"), 2);
    assert_eq!(recv(&mut rx1).await, Some(Message::new("X", "p1")));
    assert_eq!(recv(&mut rx2).await, Some(Message::new("X", "p1")));

    broker.unsubscribe(&s2, "Y").unwrap();
    assert_eq!(broker.get_subscribers("Y"), 0);
    assert_eq!(s2.get_topics(), vec!["X"]);

    broker.remove_subscriber(&s1).unwrap();
    assert_eq!(broker.get_subscribers("X"), 1);
    assert_eq!(s1.signal(Message::new("X", "late")).await, Delivery::Dropped);

    // s1's receive loop has ended and saw nothing after removal
    assert_eq!(recv(&mut rx1).await, None);

    assert_eq!(broker.publish("X", "p2"), 1);
    assert_eq!(recv(&mut rx2).await, Some(Message::new("X", "p2")));
}

#[tokio::test]
async fn removing_twice_is_reported() {
    let broker = Broker::new();
    let s = broker.add_subscriber().unwrap();
    broker.remove_subscriber(&s).unwrap();
    assert!(broker.remove_subscriber(&s).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_publishers_reach_every_listener() {
    let broker = Arc::new(Broker::new());
    let subscribers: Vec<_> = (0..5).map(|_| broker.add_subscriber().unwrap()).collect();
    for s in &subscribers {
        broker.subscribe(s, "prices").unwrap();
    }
    let mut inboxes: Vec<_> = subscribers.iter().map(listen_into).collect();

    let publishers: Vec<_> = (0..4)
        .map(|p| {
            let broker = broker.clone();
            tokio::spawn(async move {
                for i in 0..10 {
                    broker.publish("prices", &format!("{p}-{i}"));
                }
            })
        })
        .collect();
    for p in publishers {
        p.await.unwrap();
    }

    for rx in &mut inboxes {
        let mut bodies = Vec::new();
        for _ in 0..40 {
            bodies.push(recv(rx).await.unwrap().body().to_string());
        }
        bodies.sort();
        bodies.dedup();
        assert_eq!(bodies.len(), 40);
    }
}
