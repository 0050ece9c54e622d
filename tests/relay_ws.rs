use std::time::Duration;

use eco_relay::server::{ws_route, Server};
use serde_json::{json, Value};
use warp::test::WsClient;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(server: &Server) -> (WsClient, String) {
    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(ws_route(server.clone()))
        .await
        .expect("handshake");
    let hello = next_event(&mut client, "connection").await;
    let id = hello["data"]["socketId"].as_str().unwrap().to_string();
    (client, id)
}

async fn recv(client: &mut WsClient) -> Value {
    let msg = tokio::time::timeout(RECV_TIMEOUT, client.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("socket closed");
    serde_json::from_str(msg.to_str().expect("text frame")).expect("json event")
}

/// Skips events until one named `event` arrives.
async fn next_event(client: &mut WsClient, event: &str) -> Value {
    loop {
        let value = recv(client).await;
        if value["event"] == event {
            return value;
        }
    }
}

async fn emit(client: &mut WsClient, event: Value) {
    client.send_text(event.to_string()).await;
}

async fn register(client: &mut WsClient, name: &str) {
    emit(
        client,
        json!({"event": "register", "data": {"name": name, "type": "buyer", "language": "en"}}),
    )
    .await;
    next_event(client, "userList").await;
}

async fn join(client: &mut WsClient, room: &str) -> Value {
    emit(client, json!({"event": "joinRoom", "data": room})).await;
    next_event(client, "roomUsers").await
}

#[tokio::test]
async fn both_members_receive_one_message() {
    let server = Server::new(1024 * 1024);
    let (mut a, a_id) = connect(&server).await;
    let (mut b, _) = connect(&server).await;

    register(&mut a, "Ana").await;
    register(&mut b, "Ben").await;
    join(&mut a, "general").await;
    let room = join(&mut b, "general").await;
    assert_eq!(room["data"]["users"].as_array().unwrap().len(), 2);

    emit(
        &mut a,
        json!({"event": "sendMessage", "data": {"roomId": "general", "message": "hi"}}),
    )
    .await;

    for client in [&mut a, &mut b] {
        let message = next_event(client, "message").await;
        assert_eq!(message["data"]["message"], "hi");
        assert_eq!(message["data"]["user"]["id"], a_id.as_str());
        assert_eq!(message["data"]["user"]["name"], "Ana");
    }
}

#[tokio::test]
async fn unregistered_sender_is_silently_dropped() {
    let server = Server::new(1024 * 1024);
    let (mut a, _) = connect(&server).await;
    let (mut c, _) = connect(&server).await;

    register(&mut a, "Ana").await;
    join(&mut a, "general").await;

    emit(
        &mut c,
        json!({"event": "sendMessage", "data": {"roomId": "general", "message": "spam"}}),
    )
    .await;
    // Frames from one connection are handled in order, so once c sees its
    // own roomUsers the earlier sendMessage has been dropped.
    register(&mut c, "Cy").await;
    join(&mut c, "general").await;

    emit(
        &mut a,
        json!({"event": "sendMessage", "data": {"roomId": "general", "message": "after"}}),
    )
    .await;
    let message = next_event(&mut a, "message").await;
    assert_eq!(message["data"]["message"], "after");
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let server = Server::new(1024 * 1024);
    let (mut a, _) = connect(&server).await;

    a.send_text("{not json").await;
    emit(&mut a, json!({"event": "leaveRoom", "data": "general"})).await;
    register(&mut a, "Ana").await;
    let room = join(&mut a, "general").await;
    assert_eq!(room["data"]["room"], "general");
}

#[tokio::test]
async fn disconnect_cleans_up_rooms() {
    let server = Server::new(1024 * 1024);
    let (mut a, a_id) = connect(&server).await;
    let (mut b, _) = connect(&server).await;

    register(&mut a, "Ana").await;
    register(&mut b, "Ben").await;
    join(&mut a, "general").await;
    join(&mut b, "general").await;
    emit(&mut b, json!({"event": "joinRoom", "data": "side"})).await;
    next_event(&mut b, "roomUsers").await;

    drop(b);
    loop {
        let list = next_event(&mut a, "userList").await;
        if list["data"].as_array().unwrap().len() == 1 {
            break;
        }
    }

    let general = server.room_users("general").await.unwrap();
    assert_eq!(general.len(), 1);
    assert_eq!(general[0].id, a_id);
    assert!(server.room_users("side").await.is_none());
}

#[tokio::test]
async fn product_details_reach_the_other_member() {
    let server = Server::new(1024 * 1024);
    let (mut seller, _) = connect(&server).await;
    let (mut buyer, _) = connect(&server).await;

    register(&mut seller, "Sol").await;
    register(&mut buyer, "Ben").await;
    join(&mut seller, "market").await;
    join(&mut buyer, "market").await;

    emit(
        &mut seller,
        json!({"event": "sendMessage", "data": {
            "roomId": "market",
            "message": "fresh batch",
            "productDetails": {"type": "vegetables", "quantity": 2.5, "description": "Organic carrots"}
        }}),
    )
    .await;

    let message = next_event(&mut buyer, "message").await;
    assert_eq!(message["data"]["message"], "fresh batch");
    assert_eq!(message["data"]["productDetails"]["type"], "vegetables");
    assert_eq!(message["data"]["productDetails"]["quantity"], 2.5);
    assert!(message["data"].get("image").is_none());
}
