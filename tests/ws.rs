mod common;

use common::TestServer;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: &str, chat_id: Uuid, token: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/chat/ws/{chat_id}?token={token}"))
        .await
        .unwrap();
    ws
}

async fn next_event(ws: &mut Ws) -> serde_json::Value {
    let msg = ws.next().await.unwrap().unwrap();
    assert!(msg.is_text(), "expected text message, got {msg:?}");
    let text = msg.into_text().unwrap();
    serde_json::from_str(&text).unwrap()
}

async fn close_code(ws: &mut Ws) -> u16 {
    loop {
        match ws.next().await {
            Some(Ok(Message::Close(Some(frame)))) => return frame.code.into(),
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}

fn emails(event: &serde_json::Value) -> Vec<&str> {
    event["online_users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_two_members_chat_and_leave() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let bob = server.create_user_with_token("bob@example.com").await;
    let chat_id = server.create_chat(&[&alice, &bob]).await;
    let addr = server.spawn().await;

    let mut a = connect(&addr, chat_id, &alice.token).await;
    let event = next_event(&mut a).await;
    assert_eq!(event["kind"], "connect");
    assert_eq!(event["user"]["email"], "alice@example.com");
    assert_eq!(emails(&event), vec!["alice@example.com"]);

    let mut b = connect(&addr, chat_id, &bob.token).await;
    for ws in [&mut a, &mut b] {
        let event = next_event(ws).await;
        assert_eq!(event["kind"], "connect");
        assert_eq!(event["user"]["email"], "bob@example.com");
        assert_eq!(emails(&event), vec!["alice@example.com", "bob@example.com"]);
    }

    a.send(Message::Text(
        serde_json::json!({ "kind": "message", "message": "hi bob" })
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    for ws in [&mut a, &mut b] {
        let event = next_event(ws).await;
        assert_eq!(event["kind"], "message");
        assert_eq!(event["message"], "hi bob");
        assert_eq!(event["user"]["id"], alice.user.id);
        assert!(event["message_id"].is_number());
    }

    b.close(None).await.unwrap();
    let event = next_event(&mut a).await;
    assert_eq!(event["kind"], "disconnect");
    assert_eq!(event["user"]["email"], "bob@example.com");
    assert_eq!(emails(&event), vec!["alice@example.com"]);

    let stored = roomcast::db::messages::list_messages(server.pool(), chat_id, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "hi bob");
}

#[tokio::test]
async fn test_authorization_header_is_accepted() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let chat_id = server.create_chat(&[&alice]).await;
    let addr = server.spawn().await;

    let mut request = format!("ws://{addr}/chat/ws/{chat_id}")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&alice.auth_header()).unwrap(),
    );
    let (mut ws, _) = connect_async(request).await.unwrap();

    let event = next_event(&mut ws).await;
    assert_eq!(event["kind"], "connect");
    assert_eq!(event["user"]["id"], alice.user.id);
}

#[tokio::test]
async fn test_bad_token_closes_with_auth_failed() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let chat_id = server.create_chat(&[&alice]).await;
    let addr = server.spawn().await;

    let mut ws = connect(&addr, chat_id, "not-a-token").await;
    assert_eq!(close_code(&mut ws).await, 4001);
    assert_eq!(server.state.registry().session_count(chat_id), 0);
}

#[tokio::test]
async fn test_expired_token_closes_with_auth_failed() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let chat_id = server.create_chat(&[&alice]).await;
    let expired = server.issue_token(&alice, -60).await;
    let addr = server.spawn().await;

    let mut ws = connect(&addr, chat_id, &expired).await;
    assert_eq!(close_code(&mut ws).await, 4001);
    assert!(server.state.registry().online(chat_id).is_empty());
}

#[tokio::test]
async fn test_inactive_user_closes_with_auth_failed() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let chat_id = server.create_chat(&[&alice]).await;
    roomcast::db::users::set_active(server.pool(), alice.user.id, false)
        .await
        .unwrap();
    let addr = server.spawn().await;

    let mut ws = connect(&addr, chat_id, &alice.token).await;
    assert_eq!(close_code(&mut ws).await, 4001);
    assert!(server.state.registry().online(chat_id).is_empty());
}

#[tokio::test]
async fn test_non_member_closes_with_access_denied() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let mallory = server.create_user_with_token("mallory@example.com").await;
    let chat_id = server.create_chat(&[&alice]).await;
    let addr = server.spawn().await;

    let mut ws = connect(&addr, chat_id, &mallory.token).await;
    assert_eq!(close_code(&mut ws).await, 4003);
}

#[tokio::test]
async fn test_unknown_chat_closes_with_not_found() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let addr = server.spawn().await;

    let mut ws = connect(&addr, Uuid::new_v4(), &alice.token).await;
    assert_eq!(close_code(&mut ws).await, 4004);
}

#[tokio::test]
async fn test_invalid_message_only_errors_sender() {
    let server = TestServer::new().await;
    let alice = server.create_user_with_token("alice@example.com").await;
    let bob = server.create_user_with_token("bob@example.com").await;
    let chat_id = server.create_chat(&[&alice, &bob]).await;
    let addr = server.spawn().await;

    let mut a = connect(&addr, chat_id, &alice.token).await;
    next_event(&mut a).await;
    let mut b = connect(&addr, chat_id, &bob.token).await;
    next_event(&mut a).await;
    next_event(&mut b).await;

    a.send(Message::Text(
        serde_json::json!({ "kind": "message", "message": "  " })
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let event = next_event(&mut a).await;
    assert_eq!(event["kind"], "error");

    // the next thing bob sees is alice's valid message, not the error
    a.send(Message::Text(
        serde_json::json!({ "kind": "message", "message": "ok now" })
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let event = next_event(&mut b).await;
    assert_eq!(event["kind"], "message");
    assert_eq!(event["message"], "ok now");
}
