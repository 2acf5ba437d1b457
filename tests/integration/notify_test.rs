//! Broadcast delivery through `POST /api/realtime/notify`

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use crate::assert_event;
use crate::common::{token_for, TestServer};

#[tokio::test]
async fn test_new_message_reaches_room_member_once() {
    let server = TestServer::start().await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    server.membership.set_members("r1", [alice, bob]);

    let mut client = server.connect(alice, Some("r1"), None).await;

    let status = server
        .notify(json!({
            "type": "new_message",
            "chatroom_id": "r1",
            "data": { "id": "m1", "sender_id": bob, "content": "hi" },
            "audience": { "room": "r1" },
        }))
        .await;
    assert_eq!(status, 202);

    let event = client.next_event().await;
    assert_event!(&event, "new_message", "r1");
    assert_eq!(event.data["content"], "hi");
    client.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_room_event_skips_non_members_and_other_rooms() {
    let server = TestServer::start().await;
    let (alice, carol) = (Uuid::new_v4(), Uuid::new_v4());
    server.membership.set_members("r1", [alice]);
    server.membership.set_members("r2", [alice, carol]);

    let mut in_r2 = server.connect(alice, Some("r2"), None).await;
    let mut outsider = server.connect(carol, None, None).await;

    let status = server
        .notify(json!({
            "type": "unread_count_update",
            "chatroom_id": "r1",
            "data": { "chatroom_id": "r1", "unread_count": 1 },
            "audience": { "room": "r1" },
        }))
        .await;
    assert_eq!(status, 202);

    in_r2.expect_silence(Duration::from_millis(200)).await;
    outsider.expect_silence(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_message_read_reaches_every_device() {
    let server = TestServer::start().await;
    let user = Uuid::new_v4();

    let mut phone = server.connect(user, None, Some("phone")).await;
    let mut laptop = server.connect(user, None, Some("laptop")).await;

    let status = server
        .notify(json!({
            "type": "message_read",
            "chatroom_id": "r1",
            "data": { "message_id": "m1", "read_by_all": true },
            "audience": { "user": user },
        }))
        .await;
    assert_eq!(status, 202);

    assert_event!(phone.next_event().await, "message_read", "r1");
    assert_event!(laptop.next_event().await, "message_read", "r1");
}

#[tokio::test]
async fn test_notify_rejects_session_events() {
    let server = TestServer::start().await;
    let status = server
        .notify(json!({ "type": "connected", "audience": { "users": [] } }))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_user_token_cannot_forge_room_events() {
    let server = TestServer::start().await;
    let (member, outsider) = (Uuid::new_v4(), Uuid::new_v4());
    server.membership.set_members("r1", [member]);

    let mut victim = server.connect(member, Some("r1"), None).await;

    let status = server
        .notify_with(
            &token_for(outsider),
            json!({
                "type": "new_message",
                "chatroom_id": "r1",
                "data": { "content": "forged" },
                "audience": { "room": "r1" },
            }),
        )
        .await;
    assert_eq!(status, 403);
    victim.expect_silence(Duration::from_millis(200)).await;
}
