//! WebSocket lifecycle tests: upgrade checks, frames, supersession, shutdown

use std::time::Duration;

use pretty_assertions::assert_eq;
use roomchat::backend::realtime::{DelayPolicy, RealtimeConfig};
use serde_json::json;
use uuid::Uuid;

use crate::assert_event;
use crate::common::TestServer;

#[tokio::test]
async fn test_upgrade_without_token_is_unauthorized() {
    let server = TestServer::start().await;
    let url = format!("ws://{}/ws", server.addr);
    assert_eq!(server.connect_status(&url).await, 401);

    let url = format!("ws://{}/ws?token=not-a-jwt", server.addr);
    assert_eq!(server.connect_status(&url).await, 401);
}

#[tokio::test]
async fn test_non_member_cannot_join_room() {
    let server = TestServer::start().await;
    server.membership.set_members("r1", [Uuid::new_v4()]);

    let url = server.ws_url(Uuid::new_v4(), Some("r1"), None);
    assert_eq!(server.connect_status(&url).await, 403);
}

#[tokio::test]
async fn test_heartbeat_ack_and_unknown_types_ignored() {
    let server = TestServer::start().await;
    let mut client = server.connect(Uuid::new_v4(), None, None).await;

    client.send_json(json!({ "type": "typing", "data": { "on": true } })).await;
    client.send_json(json!({ "type": "heartbeat" })).await;
    assert_event!(client.next_event().await, "heartbeat_ack");

    client.send_json(json!({ "type": "ping" })).await;
    assert_event!(client.next_event().await, "pong");
    assert_eq!(server.hub.stats().connections, 1);
}

#[tokio::test]
async fn test_second_connection_supersedes_first() {
    let server = TestServer::start().await;
    let user = Uuid::new_v4();

    let mut first = server.connect(user, None, None).await;
    let _second = server.connect(user, None, None).await;

    assert_eq!(first.expect_close().await, 4000);
    assert_eq!(server.hub.stats().connections, 1);
}

#[tokio::test]
async fn test_two_devices_coexist() {
    let server = TestServer::start().await;
    let user = Uuid::new_v4();

    let _phone = server.connect(user, None, Some("phone")).await;
    let _laptop = server.connect(user, None, Some("laptop")).await;

    let stats = server.hub.stats();
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.users, 1);
}

#[tokio::test]
async fn test_client_close_deregisters() {
    let server = TestServer::start().await;
    let client = server.connect(Uuid::new_v4(), None, None).await;
    assert_eq!(server.hub.stats().connections, 1);

    client.close().await;
    for _ in 0..50 {
        if server.hub.stats().connections == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("connection still registered after client close");
}

#[tokio::test]
async fn test_rapid_reconnect_rejected_under_reject_policy() {
    let mut config = RealtimeConfig::default();
    config.admission.delay_policy = DelayPolicy::Reject;
    let server = TestServer::start_with(config).await;
    let user = Uuid::new_v4();

    let _first = server.connect(user, None, None).await;
    let url = server.ws_url(user, None, None);
    assert_eq!(server.connect_status(&url).await, 429);
}

#[tokio::test]
async fn test_new_device_label_does_not_bypass_admission() {
    let mut config = RealtimeConfig::default();
    config.admission.delay_policy = DelayPolicy::Reject;
    let server = TestServer::start_with(config).await;
    let user = Uuid::new_v4();

    let _phone = server.connect(user, None, Some("phone")).await;
    for device in ["laptop", "tablet", "dev3"] {
        let url = server.ws_url(user, None, Some(device));
        assert_eq!(server.connect_status(&url).await, 429);
    }
    assert_eq!(server.hub.stats().tracked_users, 1);
}

#[tokio::test]
async fn test_shutdown_closes_with_going_away() {
    let server = TestServer::start().await;
    let mut a = server.connect(Uuid::new_v4(), None, None).await;
    let mut b = server.connect(Uuid::new_v4(), None, None).await;

    assert_eq!(server.hub.shutdown().await, 2);
    assert_eq!(a.expect_close().await, 1001);
    assert_eq!(b.expect_close().await, 1001);

    let url = server.ws_url(Uuid::new_v4(), None, None);
    assert_eq!(server.connect_status(&url).await, 503);
}
