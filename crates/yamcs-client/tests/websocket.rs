//! End-to-end over a real websocket on localhost.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use yamcs_client::{ClientConfig, ClientError, Connection, NoHistory, YamcsSubscriptions};

type ServerSocket = WebSocketStream<tokio::net::TcpStream>;

async fn accept(listener: TcpListener) -> (ServerSocket, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut path = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok(resp)
    })
    .await
    .unwrap();
    (ws, path)
}

async fn next_json(ws: &mut ServerSocket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("client went away")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn local_config() -> (TcpListener, ClientConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ClientConfig {
        url: format!("http://{}", listener.local_addr().unwrap()),
        reply_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    (listener, config)
}

#[tokio::test]
async fn time_subscription_round_trip() {
    let (listener, config) = local_config().await;

    let server = tokio::spawn(async move {
        let (mut ws, path) = accept(listener).await;
        assert_eq!(path, "/api/websocket");

        let status = next_json(&mut ws).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["id"], 1);

        let sub = next_json(&mut ws).await;
        assert_eq!(sub["type"], "time");
        assert_eq!(sub["options"]["instance"], "ground_station");
        send_json(&mut ws, json!({"type": "reply", "call": 7, "data": {"replyTo": sub["id"]}})).await;
        for (seq, value) in ["2024-05-01T10:00:00Z", "2024-05-01T10:00:01Z"].iter().enumerate() {
            send_json(
                &mut ws,
                json!({"type": "time", "call": 7, "seq": seq, "data": {"value": value}}),
            )
            .await;
        }

        next_json(&mut ws).await
    });

    let conn = Arc::new(Connection::connect(&config).await.unwrap());
    let subs = YamcsSubscriptions::new(Arc::clone(&conn), Arc::new(NoHistory), &config);
    let times: Vec<_> = subs.time().await.unwrap().take(2).collect().await;
    assert_eq!(times.len(), 2);
    assert_eq!(times[1].value.to_rfc3339(), "2024-05-01T10:00:01+00:00");

    let cancel = server.await.unwrap();
    assert_eq!(cancel["type"], "cancel");
    assert_eq!(cancel["options"]["call"], 7);

    let stats = conn.stats();
    assert_eq!(stats.events, 2);
    assert_eq!(stats.replies, 1);
}

#[tokio::test]
async fn close_sends_close_frame() {
    let (listener, config) = local_config().await;

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(listener).await;
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return false,
            }
        }
    });

    let conn = Connection::connect(&config).await.unwrap();
    conn.close().await;
    assert!(server.await.unwrap());
}

#[tokio::test]
async fn server_exception_is_reported() {
    let (listener, config) = local_config().await;

    tokio::spawn(async move {
        let (mut ws, _) = accept(listener).await;
        let _status = next_json(&mut ws).await;
        let req = next_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({"type": "reply", "data": {"replyTo": req["id"], "exception": {
                "code": 400, "type": "BadRequestException", "msg": "Invalid identifier"
            }}}),
        )
        .await;
        // Keep the socket open until the client is done.
        while ws.next().await.is_some() {}
    });

    let conn = Arc::new(Connection::connect(&config).await.unwrap());
    let subs = YamcsSubscriptions::new(conn, Arc::new(NoHistory), &config);
    let err = subs.parameter("/no/such").await.err().unwrap();
    assert!(matches!(err, ClientError::Server { code: 400, .. }));
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let (listener, config) = local_config().await;
    drop(listener);

    let err = Connection::connect(&config).await.err().unwrap();
    assert!(matches!(err, ClientError::Connect { .. }));
}
