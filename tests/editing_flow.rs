use design_hub::{routes::create_app, store::MemoryContentStore, AppState, Config};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> String {
    let state = AppState::with_store(Config::default(), Arc::new(MemoryContentStore::new())).unwrap();
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{}", addr)
}

async fn connect(base: &str, design: &str, user: &str) -> Client {
    let url = format!("{}/api/v1/designs/{}/ws?user={}", base, design, user);
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, payload: Value) {
    client.send(Message::text(payload.to_string())).await.unwrap();
}

async fn send_raw(client: &mut Client, raw: &str) {
    client.send(Message::text(raw)).await.unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_two_editors_share_history() {
    let base = start_server().await;

    let mut alice = connect(&base, "D1", "alice").await;
    // The first ack proves alice joined before bob arrives
    send(&mut alice, json!({"type": "command", "commandId": 1, "command": {"op": "add", "path": "/users"}})).await;
    let ack = next_json(&mut alice).await;
    assert_eq!(ack, json!({"type": "ack", "ackType": "command", "commandId": 1, "contentVersion": 1}));

    let mut bob = connect(&base, "D1", "bob").await;
    let joined = next_json(&mut alice).await;
    assert_eq!(joined["type"], "join");
    assert_eq!(joined["user"], "bob");
    let existing = next_json(&mut bob).await;
    assert_eq!(existing["type"], "join");
    assert_eq!(existing["user"], "alice");

    // Command: ack to alice, replay to bob
    send(&mut alice, json!({"type": "command", "commandId": 2, "command": {"op": "add", "path": "/orders"}})).await;
    let ack = next_json(&mut alice).await;
    assert_eq!(ack, json!({"type": "ack", "ackType": "command", "commandId": 2, "contentVersion": 2}));
    let replay = next_json(&mut bob).await;
    assert_eq!(replay["type"], "command");
    assert_eq!(replay["user"], "alice");
    assert_eq!(replay["contentVersion"], 2);
    assert_eq!(replay["command"], json!({"op": "add", "path": "/orders"}));

    // Undo by bob
    send(&mut bob, json!({"type": "undo", "contentVersion": 2})).await;
    assert_eq!(next_json(&mut bob).await, json!({"type": "ack", "ackType": "undo", "contentVersion": 2}));
    assert_eq!(next_json(&mut alice).await, json!({"type": "undo", "contentVersion": 2}));

    // Noise that must not produce any frame
    send(&mut alice, json!({"type": "redo", "contentVersion": 7})).await;
    send(&mut alice, json!({"type": "ping"})).await;
    send(&mut alice, json!({"type": "bogus"})).await;
    send_raw(&mut alice, "not json").await;
    send(&mut alice, json!({"type": "undo"})).await;

    // The next frames each side sees belong to this redo
    send(&mut alice, json!({"type": "redo", "contentVersion": 2})).await;
    assert_eq!(next_json(&mut alice).await, json!({"type": "ack", "ackType": "redo", "contentVersion": 2}));
    assert_eq!(next_json(&mut bob).await, json!({"type": "redo", "contentVersion": 2}));

    // Bob leaves
    bob.close(None).await.unwrap();
    let left = next_json(&mut alice).await;
    assert_eq!(left["type"], "leave");
    assert_eq!(left["user"], "bob");
}

#[tokio::test]
async fn test_designs_are_isolated() {
    let base = start_server().await;

    let mut alice = connect(&base, "D1", "alice").await;
    let mut carol = connect(&base, "D2", "carol").await;

    send(&mut carol, json!({"type": "command", "commandId": 9, "command": {"op": "rename"}})).await;
    assert_eq!(
        next_json(&mut carol).await,
        json!({"type": "ack", "ackType": "command", "commandId": 9, "contentVersion": 1})
    );

    // D1 keeps its own version sequence and never sees D2 traffic
    send(&mut alice, json!({"type": "command", "commandId": 1, "command": {"op": "add"}})).await;
    assert_eq!(
        next_json(&mut alice).await,
        json!({"type": "ack", "ackType": "command", "commandId": 1, "contentVersion": 1})
    );
}

#[tokio::test]
async fn test_selection_reaches_only_peers() {
    let base = start_server().await;

    let mut alice = connect(&base, "D1", "alice").await;
    send(&mut alice, json!({"type": "command", "commandId": 1, "command": {}})).await;
    next_json(&mut alice).await;

    let mut bob = connect(&base, "D1", "bob").await;
    assert_eq!(next_json(&mut alice).await["type"], "join");
    assert_eq!(next_json(&mut bob).await["type"], "join");

    send(&mut bob, json!({"type": "selection", "selection": "/paths/~1users"})).await;
    let selection = next_json(&mut alice).await;
    assert_eq!(selection["type"], "selection");
    assert_eq!(selection["user"], "bob");
    assert_eq!(selection["selection"], "/paths/~1users");

    // Bob got nothing back: his next frame is the ack of his own command
    send(&mut bob, json!({"type": "command", "commandId": 5, "command": {}})).await;
    assert_eq!(next_json(&mut bob).await["ackType"], "command");
}
