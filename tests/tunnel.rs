//! WebSocket tunnel tests against mock pods.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use session_distributor::store::{CoordinationStore, MemoryStore};

mod common;

use common::PodEvent;

fn status_of(err: tokio_tungstenite::tungstenite::Error) -> u16 {
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {other}"),
    }
}

#[tokio::test]
async fn test_echo_through_tunnel() {
    let store = MemoryStore::new();
    let mut pod = common::start_mock_pod().await;
    common::register_pod(&store, "127.0.0.1").await;
    let (addr, shutdown) = common::start_distributor(&store, pod.addr.port()).await;

    let url = format!("ws://{addr}/cool/doc-1/ws?WOPISrc=S1");
    let (mut socket, _) = connect_async(url).await.expect("tunnel handshake");

    assert_eq!(
        pod.next_event().await,
        PodEvent::Opened {
            host: "collabora.local".into(),
            origin: "http://collabora.local".into(),
        }
    );
    assert_eq!(
        store.get("session-affinity:S1").await.unwrap().as_deref(),
        Some("127.0.0.1")
    );

    socket.send(Message::Text("X".into())).await.unwrap();
    match socket.next().await {
        Some(Ok(Message::Text(text))) => assert_eq!(text.as_str(), "X"),
        other => panic!("unexpected reply {other:?}"),
    }

    let payload = vec![0u8, 1, 2, 254, 255];
    socket.send(Message::Binary(payload.clone().into())).await.unwrap();
    match socket.next().await {
        Some(Ok(Message::Binary(data))) => assert_eq!(&data[..], &payload[..]),
        other => panic!("unexpected reply {other:?}"),
    }

    common::wait_for_value(&store, "connection-count:127.0.0.1", Some("1")).await;

    socket.close(None).await.unwrap();
    assert_eq!(pod.next_event().await, PodEvent::Closed);
    common::wait_for_value(&store, "connection-count:127.0.0.1", Some("0")).await;

    shutdown.trigger();
}

#[tokio::test]
async fn test_second_tunnel_keeps_affinity() {
    let store = MemoryStore::new();
    let mut pod = common::start_mock_pod().await;
    common::register_pod(&store, "127.0.0.1").await;
    common::register_pod(&store, "127.0.0.2").await;
    common::set_connections(&store, "127.0.0.2", 5).await;
    let (addr, shutdown) = common::start_distributor(&store, pod.addr.port()).await;

    let url = format!("ws://{addr}/cool/doc-2/ws?WOPISrc=S1");
    let (mut first, _) = connect_async(&url).await.expect("first tunnel");
    assert!(matches!(pod.next_event().await, PodEvent::Opened { .. }));
    first.close(None).await.unwrap();
    assert_eq!(pod.next_event().await, PodEvent::Closed);

    // least connections would now pick 127.0.0.2, where nothing listens
    common::set_connections(&store, "127.0.0.1", 10).await;

    let (mut second, _) = connect_async(&url).await.expect("second tunnel");
    assert!(matches!(pod.next_event().await, PodEvent::Opened { .. }));
    second.send(Message::Text("again".into())).await.unwrap();
    assert!(matches!(second.next().await, Some(Ok(Message::Text(_)))));
    assert_eq!(
        store.get("session-affinity:S1").await.unwrap().as_deref(),
        Some("127.0.0.1")
    );

    second.close(None).await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn test_least_loaded_pod_selected() {
    let store = MemoryStore::new();
    let mut pod = common::start_mock_pod().await;
    for (pod, count) in [("127.0.0.3", 3), ("127.0.0.1", 1), ("127.0.0.4", 5)] {
        common::register_pod(&store, pod).await;
        common::set_connections(&store, pod, count).await;
    }
    // counters without a heartbeat are ignored
    common::set_connections(&store, "127.0.0.9", 0).await;
    let (addr, shutdown) = common::start_distributor(&store, pod.addr.port()).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/cool/doc-3/ws?WOPISrc=S3"))
        .await
        .expect("tunnel handshake");
    assert!(matches!(pod.next_event().await, PodEvent::Opened { .. }));
    assert_eq!(
        store.get("session-affinity:S3").await.unwrap().as_deref(),
        Some("127.0.0.1")
    );

    socket.close(None).await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn test_tunnel_without_session_rejected() {
    let store = MemoryStore::new();
    let pod = common::start_mock_pod().await;
    common::register_pod(&store, "127.0.0.1").await;
    let (addr, shutdown) = common::start_distributor(&store, pod.addr.port()).await;

    let err = connect_async(format!("ws://{addr}/cool/doc/ws"))
        .await
        .expect_err("tunnel without session must be rejected");
    assert_eq!(status_of(err), 400);
    assert_eq!(store.len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_tunnel_without_pods() {
    let store = MemoryStore::new();
    let (addr, shutdown) = common::start_distributor(&store, 9980).await;

    let err = connect_async(format!("ws://{addr}/cool/doc/ws?WOPISrc=S1"))
        .await
        .expect_err("no pods registered");
    assert_eq!(status_of(err), 503);
    assert!(store.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_pod_is_bad_gateway() {
    let store = MemoryStore::new();
    common::register_pod(&store, "127.0.0.1").await;
    let (addr, shutdown) = common::start_distributor(&store, common::closed_port().await).await;

    let err = connect_async(format!("ws://{addr}/cool/doc/ws?WOPISrc=S1"))
        .await
        .expect_err("pod is down");
    assert_eq!(status_of(err), 502);
    assert_eq!(store.get("connection-count:127.0.0.1").await.unwrap(), None);

    shutdown.trigger();
}

#[tokio::test]
async fn test_pod_close_reaches_client() {
    let store = MemoryStore::new();
    let mut pod = common::start_mock_pod().await;
    common::register_pod(&store, "127.0.0.1").await;
    let (addr, shutdown) = common::start_distributor(&store, pod.addr.port()).await;

    let url = format!("ws://{addr}/cool/close-at-once/ws?WOPISrc=S4");
    let (mut socket, _) = connect_async(url).await.expect("tunnel handshake");
    assert!(matches!(pod.next_event().await, PodEvent::Opened { .. }));

    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
        .await
        .expect("close frame timed out");
    match reply {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4000);
            assert_eq!(frame.reason.as_str(), "document unloaded");
        }
        other => panic!("unexpected reply {other:?}"),
    }

    assert_eq!(pod.next_event().await, PodEvent::Closed);
    common::wait_for_value(&store, "connection-count:127.0.0.1", Some("0")).await;
    assert_eq!(
        store.get("session-affinity:S4").await.unwrap().as_deref(),
        Some("127.0.0.1")
    );

    shutdown.trigger();
}
