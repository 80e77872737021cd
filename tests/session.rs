/// End-to-end test against an in-process websocket server standing in for
/// the Atlas endpoint.
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use solana_tx_subscribe::{
    registry::AddressRegistry,
    rpc::{build, CommitmentLevel, SubscriptionOptions},
    session::{CloseReason, SessionConfig, SessionController, SessionEvent, SessionState},
};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const PUSH_FRAME: &str = r#"{"jsonrpc":"2.0","method":"transactionNotification","params":{"subscription":4243,"result":{"signature":"5moMYe6a","transaction":{"meta":{"computeUnitsConsumed":2100,"fee":5000},"version":0}}}}"#;

#[tokio::test]
async fn subscribe_stream_and_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        // The first frame must be the canonical subscribe request.
        let request = socket.next().await.unwrap().unwrap().into_text().unwrap();
        let request: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["id"], 420);
        assert_eq!(request["method"], "transactionSubscribe");
        assert_eq!(
            request["params"][0],
            json!({
                "accountInclude": ["AccAddr1111111111111111111111111111111111111"],
                "accountRequire": ["ReqAddr1111111111111111111111111111111111111"],
            })
        );
        assert_eq!(request["params"][1]["commitment"], "finalized");
        assert_eq!(request["params"][1]["showRewards"], true);
        assert_eq!(request["params"][1]["maxSupportedTransactionVersion"], 1);

        // Ack, then a malformed frame, then a push notification.
        socket
            .send(Message::Text(
                r#"{"jsonrpc":"2.0","result":4243,"id":420}"#.to_string(),
            ))
            .await
            .unwrap();
        socket
            .send(Message::Text("this is not json".to_string()))
            .await
            .unwrap();
        socket
            .send(Message::Text(PUSH_FRAME.to_string()))
            .await
            .unwrap();

        // Drain until the client closes.
        while let Some(Ok(_)) = socket.next().await {}
    });

    let mut registry = AddressRegistry::new();
    registry
        .add("ReqAddr1111111111111111111111111111111111111", true)
        .unwrap();
    registry
        .add("AccAddr1111111111111111111111111111111111111", false)
        .unwrap();
    let (required, included) = registry.partition();
    let options = SubscriptionOptions {
        commitment: CommitmentLevel::Finalized,
        ..Default::default()
    };
    let request = build(&required, &included, &options);

    let endpoint = Url::parse(&format!("ws://{}", local_addr)).unwrap();
    let (handle, mut events) = SessionController::spawn(SessionConfig::new(endpoint));
    handle.start(request).unwrap();

    assert_eq!(events.recv().await, Some(SessionEvent::Connected));
    assert_eq!(handle.status().state, SessionState::Open);

    // The ack and the push frame arrive; the malformed frame is dropped.
    let ack = match events.recv().await {
        Some(SessionEvent::Notification(value)) => value,
        other => panic!("expected ack notification, got {:?}", other),
    };
    assert_eq!(ack["result"], 4243);

    let push = match events.recv().await {
        Some(SessionEvent::Notification(value)) => value,
        other => panic!("expected push notification, got {:?}", other),
    };
    assert_eq!(push["params"]["result"]["signature"], "5moMYe6a");

    assert_eq!(handle.status().state, SessionState::Open);
    handle.with_notifications(|sink| {
        assert_eq!(sink.len(), 2);
        let newest: Vec<_> = sink.newest_first().collect();
        assert_eq!(newest[0]["method"], "transactionNotification");
    });

    handle.stop().unwrap();
    assert_eq!(
        events.recv().await,
        Some(SessionEvent::Closed(CloseReason::Stopped))
    );
    assert_eq!(handle.status().state, SessionState::Idle);

    server.await.unwrap();
}

#[tokio::test]
async fn peer_close_resets_session_to_idle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _subscribe = socket.next().await.unwrap().unwrap();
        socket.close(None).await.unwrap();
    });

    let endpoint = Url::parse(&format!("ws://{}", local_addr)).unwrap();
    let (handle, mut events) = SessionController::spawn(SessionConfig::new(endpoint));
    handle
        .start(build(&[], &[], &SubscriptionOptions::default()))
        .unwrap();

    assert_eq!(events.recv().await, Some(SessionEvent::Connected));
    assert_eq!(
        events.recv().await,
        Some(SessionEvent::Closed(CloseReason::PeerClosed))
    );
    assert_eq!(handle.status().state, SessionState::Idle);

    // The session is reusable: a failed connect also lands back on idle.
    server.await.unwrap();
    handle
        .start(build(&[], &[], &SubscriptionOptions::default()))
        .unwrap();
    assert_eq!(
        events.recv().await,
        Some(SessionEvent::Closed(CloseReason::ConnectFailed))
    );
    assert_eq!(handle.status().state, SessionState::Idle);
}

#[tokio::test]
async fn connect_failure_surfaces_and_resets() {
    // Nothing listens here.
    let endpoint = Url::parse("ws://127.0.0.1:1").unwrap();
    let (handle, mut events) = SessionController::spawn(SessionConfig::new(endpoint));
    handle
        .start(build(&[], &[], &SubscriptionOptions::default()))
        .unwrap();

    assert_eq!(
        events.recv().await,
        Some(SessionEvent::Closed(CloseReason::ConnectFailed))
    );
    assert_eq!(handle.status().state, SessionState::Idle);
}
