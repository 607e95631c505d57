use std::time::Duration;

use push_ws::channels::UnreadChannel;
use push_ws::config::PushConfig;
use push_ws::testing::{MockListener, MockServer, MockTransport};
use tokio::sync::watch;

fn config() -> PushConfig {
    PushConfig {
        base_url: "ws://push.test".to_string(),
        ..PushConfig::default()
    }
}

async fn wait_for<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("value did not change in time")
        .unwrap();
}

async fn connected_unread() -> (UnreadChannel<MockTransport>, MockServer, MockListener) {
    let (transport, mut listener) = MockTransport::listener();
    let unread = UnreadChannel::spawn(&config(), transport);
    let mut connected = unread.connected();
    unread.mount("EMP7").await.unwrap();
    let server = listener.accept().await.expect("connection");
    assert_eq!(server.url(), "ws://push.test/ws/notify?u=EMP7");
    wait_for(&mut connected, |open| *open).await;
    (unread, server, listener)
}

#[tokio::test(start_paused = true)]
async fn latest_snapshot_wins() {
    let (unread, server, _listener) = connected_unread().await;
    let mut badge = unread.unread();
    assert_eq!(unread.unread_count(), 0);

    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":7}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 7).await;

    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":3}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 3).await;
    assert_eq!(unread.refresh_unread().await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_totals_and_other_types_are_ignored() {
    let (unread, server, _listener) = connected_unread().await;
    let mut badge = unread.unread();

    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":4}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 4).await;

    for frame in [
        r#"{"type":"notify.snapshot","total_unseen":-1}"#,
        r#"{"type":"notify.snapshot","total_unseen":2.5}"#,
        r#"{"type":"notify.snapshot","total_unseen":"9"}"#,
        r#"{"type":"notify.snapshot"}"#,
        r#"{"type":"chat.message","total_unseen":12}"#,
        r#"{"type":"ping"}"#,
        "garbage",
    ] {
        server.send_text(frame).unwrap();
    }
    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":0}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 0).await;

    let stats = unread.stats().await.unwrap();
    // Only data payloads are counted; the ping and the garbage frame never reach the consumer.
    assert_eq!(stats.messages, 7);
    assert!(unread.is_connected());
}

#[tokio::test(start_paused = true)]
async fn badge_survives_reconnect_until_next_snapshot() {
    let (unread, mut server, mut listener) = connected_unread().await;
    let mut badge = unread.unread();
    let mut connected = unread.connected();

    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":5}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 5).await;

    server.drop_socket();
    wait_for(&mut connected, |open| !*open).await;
    assert_eq!(unread.unread_count(), 5);

    let server = listener
        .accept_timeout(Duration::from_secs(5))
        .await
        .expect("reconnect");
    wait_for(&mut connected, |open| *open).await;

    server
        .send_text(r#"{"type":"notify.snapshot","total_unseen":1}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 1).await;
}

#[tokio::test(start_paused = true)]
async fn frames_from_a_replaced_socket_are_ignored() {
    let (unread, mut old, mut listener) = connected_unread().await;
    let mut badge = unread.unread();
    let mut connected = unread.connected();

    old.drop_socket();
    wait_for(&mut connected, |open| !*open).await;
    assert!(old.send_text(r#"{"type":"notify.snapshot","total_unseen":99}"#).is_err());

    let fresh = listener
        .accept_timeout(Duration::from_secs(5))
        .await
        .expect("reconnect");
    wait_for(&mut connected, |open| *open).await;
    fresh
        .send_text(r#"{"type":"notify.snapshot","total_unseen":2}"#)
        .unwrap();
    wait_for(&mut badge, |value| *value == 2).await;
    assert_eq!(unread.unread_count(), 2);
}
