use super::link::{ClientLink, OUTBOUND_CAPACITY};
use crate::broker::Message;
use tokio::sync::mpsc::error::TrySendError;

#[test]
fn test_client_link_new() {
    let (link, _rx) = ClientLink::new("127.0.0.1:5000");
    assert!(link.id.starts_with("client-"));
    assert_eq!(link.remote, "127.0.0.1:5000");
    assert_eq!(link.sender.max_capacity(), OUTBOUND_CAPACITY);
}

#[test]
fn test_client_link_ids_are_unique() {
    let (a, _) = ClientLink::new("a");
    let (b, _) = ClientLink::new("b");
    assert_ne!(a.id, b.id);
}

#[test]
fn test_outbound_queue_is_bounded() {
    let (link, _rx) = ClientLink::with_capacity("a", 2);
    link.sender.try_send(Message::new("t", "1")).unwrap();
    link.sender.try_send(Message::new("t", "2")).unwrap();
    assert!(matches!(
        link.sender.try_send(Message::new("t", "3")),
        Err(TrySendError::Full(_))
    ));
}

#[tokio::test]
async fn test_dropping_link_closes_queue() {
    let (link, mut rx) = ClientLink::new("a");
    link.sender.send(Message::new("t", "x")).await.unwrap();
    drop(link);
    assert_eq!(rx.recv().await, Some(Message::new("t", "x")));
    assert_eq!(rx.recv().await, None);
}
