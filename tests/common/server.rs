//! Real server on an ephemeral port plus a small WebSocket client

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomchat::backend::membership::InMemoryMembership;
use roomchat::backend::realtime::{RealtimeConfig, RealtimeHub};
use roomchat::backend::routes::create_router;
use roomchat::backend::server::AppState;
use roomchat::shared::WireMessage;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use super::auth_helpers::{service_token, test_validator, token_for};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Arc<RealtimeHub>,
    pub membership: Arc<InMemoryMembership>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(RealtimeConfig::default()).await
    }

    pub async fn start_with(config: RealtimeConfig) -> Self {
        let membership = Arc::new(InMemoryMembership::new());
        let hub = Arc::new(RealtimeHub::new(config, membership.clone()));
        let router = create_router(AppState::new(hub.clone(), Arc::new(test_validator())));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Test server failed");
        });

        Self {
            addr,
            hub,
            membership,
            task,
        }
    }

    /// `ws://` URL for `user_id`, optionally scoped to a room and device
    pub fn ws_url(&self, user_id: Uuid, chatroom_id: Option<&str>, device: Option<&str>) -> String {
        let mut url = format!("ws://{}/ws?token={}", self.addr, token_for(user_id));
        if let Some(room) = chatroom_id {
            url.push_str(&format!("&chatroom_id={}", room));
        }
        if let Some(device) = device {
            url.push_str(&format!("&device={}", device));
        }
        url
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Connect and consume the `connected` greeting
    pub async fn connect(&self, user_id: Uuid, chatroom_id: Option<&str>, device: Option<&str>) -> WsClient {
        let (stream, _) = connect_async(self.ws_url(user_id, chatroom_id, device))
            .await
            .expect("WebSocket connect failed");
        let mut client = WsClient { stream };
        let greeting = client.next_event().await;
        assert_eq!(greeting.kind, "connected");
        client
    }

    /// HTTP status of a failed upgrade attempt
    pub async fn connect_status(&self, url: &str) -> u16 {
        match connect_async(url).await {
            Ok(_) => panic!("expected the upgrade to be refused"),
            Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
            Err(other) => panic!("unexpected connect error: {:?}", other),
        }
    }

    /// `POST /api/realtime/notify` with a service token
    pub async fn notify(&self, body: Value) -> u16 {
        self.notify_with(&service_token(), body).await
    }

    /// `POST /api/realtime/notify` with an arbitrary bearer token
    pub async fn notify_with(&self, token: &str, body: Value) -> u16 {
        reqwest::Client::new()
            .post(self.http_url("/api/realtime/notify"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("notify request failed")
            .status()
            .as_u16()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Client side of one realtime socket
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send_json(&mut self, value: Value) {
        self.stream
            .send(Message::text(value.to_string()))
            .await
            .expect("send failed");
    }

    /// Next JSON event, skipping control frames
    pub async fn next_event(&mut self) -> WireMessage {
        loop {
            match self.next_frame().await {
                Some(Message::Text(text)) => {
                    return WireMessage::decode(text.as_str()).expect("server sent invalid JSON")
                }
                Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    /// Close code the server ends the socket with
    pub async fn expect_close(&mut self) -> u16 {
        loop {
            match self.next_frame().await {
                Some(Message::Close(Some(frame))) => return u16::from(frame.code),
                Some(Message::Close(None)) | None => panic!("socket closed without a close code"),
                Some(_) => continue,
            }
        }
    }

    /// Assert no event arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(Ok(frame))) = tokio::time::timeout(window, self.stream.next()).await {
            if matches!(frame, Message::Text(_)) {
                panic!("expected no event, got {:?}", frame);
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }

    async fn next_frame(&mut self) -> Option<Message> {
        match tokio::time::timeout(RECV_TIMEOUT, self.stream.next()).await {
            Ok(Some(Ok(frame))) => Some(frame),
            Ok(Some(Err(_))) | Ok(None) => None,
            Err(_) => panic!("timed out waiting for a frame"),
        }
    }
}
