use super::{Message, Router, RoutingTable};
use crate::client::ClientLink;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::timeout;

fn table(routes: &[(&str, &[&str])]) -> RoutingTable {
    routes
        .iter()
        .map(|(from, to)| (*from, to.iter().copied()))
        .collect()
}

#[test]
fn test_routing_table_lookup() {
    let table = table(&[("a", &["b", "c"]), ("ping", &["pong"])]);
    assert_eq!(table.len(), 2);
    assert!(!table.is_empty());
    assert_eq!(table.lookup("a"), Some(&["b".to_string(), "c".to_string()][..]));
    assert_eq!(table.lookup("ping"), Some(&["pong".to_string()][..]));
    assert_eq!(table.lookup("nope"), None);
}

#[test]
fn test_routing_table_topics_are_route_keys() {
    let table = table(&[("a", &["b"]), ("ping", &["pong"])]);
    let expected: BTreeSet<String> = ["a".to_string(), "ping".to_string()].into();
    assert_eq!(table.topics(), expected);
}

#[test]
fn test_routing_table_from_map() {
    let mut routes = HashMap::new();
    routes.insert("x".to_string(), vec!["y".to_string()]);
    let table = RoutingTable::new(routes);
    assert_eq!(table.lookup("x"), Some(&["y".to_string()][..]));
    assert!(RoutingTable::default().is_empty());
}

#[test]
fn test_router_register_and_unregister() {
    let mut router = Router::new(RoutingTable::default(), false);
    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    let client_id = link.id.clone();

    router.register(link);
    assert!(router.contains_client(&client_id));
    assert_eq!(router.stats().clients, 1);

    assert!(router.unregister(&client_id));
    assert!(!router.contains_client(&client_id));
    // the router held the only sender
    assert!(rx.try_recv().is_err());
    assert!(rx.is_closed());

    // a second unregister is a no-op
    assert!(!router.unregister(&client_id));
}

#[tokio::test]
async fn test_route_relabels_and_keeps_body() {
    let mut router = Router::new(table(&[("A", &["B"])]), false);
    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    router.register(link);

    router.route(Message::new("A", vec![0u8, 1, 2, 255])).await;

    let received = rx.try_recv().unwrap();
    assert_eq!(received, Message::new("B", vec![0u8, 1, 2, 255]));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_route_fans_out_in_configured_order() {
    let mut router = Router::new(table(&[("a", &["b", "c"])]), false);
    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    router.register(link);

    router.route(Message::new("a", "x")).await;

    assert_eq!(rx.try_recv().unwrap(), Message::new("b", "x"));
    assert_eq!(rx.try_recv().unwrap(), Message::new("c", "x"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_route_unknown_topic_is_dropped() {
    let mut router = Router::new(table(&[("a", &["b"])]), true);
    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    let client_id = link.id.clone();
    router.register(link);

    router.route(Message::new("unknown", "x")).await;

    assert!(rx.try_recv().is_err());
    assert!(router.contains_client(&client_id));
}

#[tokio::test]
async fn test_full_subscriber_is_evicted() {
    let mut router = Router::new(table(&[("ping", &["pong"])]), false);

    let (first, mut first_rx) = ClientLink::new("127.0.0.1:1");
    let (second, mut second_rx) = ClientLink::new("127.0.0.1:2");
    let (slow, mut slow_rx) = ClientLink::with_capacity("127.0.0.1:3", 1);
    let slow_id = slow.id.clone();
    slow.sender.try_send(Message::new("old", "")).unwrap();

    router.register(first);
    router.register(second);
    router.register(slow);

    router.route(Message::new("ping", "x")).await;

    assert_eq!(first_rx.try_recv().unwrap(), Message::new("pong", "x"));
    assert_eq!(second_rx.try_recv().unwrap(), Message::new("pong", "x"));

    assert!(!router.contains_client(&slow_id));
    assert_eq!(router.stats().clients, 2);
    // what was already queued drains, then the queue reports closed
    assert_eq!(slow_rx.recv().await, Some(Message::new("old", "")));
    assert_eq!(slow_rx.recv().await, None);

    // the evicted link gets nothing more
    router.route(Message::new("ping", "y")).await;
    assert_eq!(first_rx.try_recv().unwrap(), Message::new("pong", "y"));
}

#[tokio::test]
async fn test_closed_subscriber_is_removed() {
    let mut router = Router::new(table(&[("a", &["b"])]), false);
    let (link, rx) = ClientLink::new("127.0.0.1:1");
    let client_id = link.id.clone();
    router.register(link);
    drop(rx);

    router.route(Message::new("a", "x")).await;

    assert!(!router.contains_client(&client_id));
}

#[tokio::test]
async fn test_handle_register_publish_unregister() {
    let handle = Router::new(table(&[("a", &["b"])]), false).start();
    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    let client_id = link.id.clone();

    handle.register(link).await.unwrap();
    // control and inbound are separate queues
    assert_eq!(handle.stats().await.unwrap().clients, 1);
    handle.publish(Message::new("a", "hello")).await.unwrap();

    let received = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(received, Message::new("b", "hello"));

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.clients, 1);
    assert_eq!(stats.bridges, 0);

    handle.unregister(client_id).await.unwrap();
    let closed = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out");
    assert_eq!(closed, None);
    assert_eq!(handle.stats().await.unwrap().clients, 0);
}

#[tokio::test]
async fn test_handle_control_commands() {
    let handle = Router::new(table(&[("a", &["b"])]), false).start();

    handle.set_message_logs(true).await.unwrap();
    assert!(handle.peer_info().await.unwrap().is_empty());
    assert_eq!(handle.table().lookup("a"), Some(&["b".to_string()][..]));

    let (link, mut rx) = ClientLink::new("127.0.0.1:1");
    handle.register(link).await.unwrap();
    handle.set_message_logs(false).await.unwrap();
    assert_eq!(handle.stats().await.unwrap().clients, 1);
    handle.publish(Message::new("a", "z")).await.unwrap();
    let received = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(received.topic, "b");
}
