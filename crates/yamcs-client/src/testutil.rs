//! Shared test helpers: a scripted server on the far end of an in-memory
//! transport.

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use yamcs_core::{CallId, ClientRequest, OutboundFrame, RequestId, ServerFrame};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::registry::Subscription;
use crate::transport::Transport;

const WAIT: Duration = Duration::from_secs(5);

/// Plays the server side of a [`Connection`].
pub(crate) struct MockServer {
    requests: mpsc::Receiver<String>,
    inbound: Option<mpsc::Sender<String>>,
}

impl MockServer {
    /// A connection with default settings wired to a fresh mock server.
    pub fn connect() -> (Connection, Self) {
        Self::connect_with(&ClientConfig::default())
    }

    pub fn connect_with(config: &ClientConfig) -> (Connection, Self) {
        let (transport, requests, inbound) = Transport::in_memory(64);
        let conn = Connection::with_transport(transport, config);
        (
            conn,
            Self {
                requests,
                inbound: Some(inbound),
            },
        )
    }

    /// Next frame the client wrote. Panics if none arrives.
    pub async fn next_request(&mut self) -> OutboundFrame {
        let text = tokio::time::timeout(WAIT, self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("client closed the transport");
        serde_json::from_str(&text).expect("client wrote an invalid frame")
    }

    pub fn try_next_request(&mut self) -> Option<OutboundFrame> {
        let text = self.requests.try_recv().ok()?;
        Some(serde_json::from_str(&text).expect("client wrote an invalid frame"))
    }

    pub async fn push_text(&self, text: &str) {
        self.inbound
            .as_ref()
            .expect("server already hung up")
            .send(text.to_string())
            .await
            .expect("client stopped reading");
    }

    pub async fn push(&self, frame: Value) {
        self.push_text(&frame.to_string()).await;
    }

    pub async fn reply(&self, to: RequestId, call: Option<u64>) {
        let mut frame = json!({"type": "reply", "data": {"replyTo": to}});
        if let Some(call) = call {
            frame["call"] = json!(call);
        }
        self.push(frame).await;
    }

    pub async fn event(&self, kind: &str, call: u64, seq: u64, data: Value) {
        self.push(json!({"type": kind, "call": call, "seq": seq, "data": data}))
            .await;
    }

    pub async fn time_event(&self, call: u64, seq: u64, value: &str) {
        self.event("time", call, seq, json!({"value": value})).await;
    }

    /// Drive `request` through `conn.subscribe`, answering with `call`.
    pub async fn subscribe(
        &mut self,
        conn: &Connection,
        request: ClientRequest,
        call: u64,
    ) -> Result<Subscription, ClientError> {
        let (sub, _) = tokio::join!(conn.subscribe(request), async {
            let req = self.next_request().await;
            self.reply(req.id, Some(call)).await;
        });
        sub
    }

    /// Expect the next frame to cancel `call`, and acknowledge it.
    pub async fn expect_cancel(&mut self, call: u64) {
        let req = self.next_request().await;
        assert_eq!(req.request, ClientRequest::cancel(CallId::new(call)));
        self.reply(req.id, None).await;
    }

    /// Wait until the client has processed every frame pushed so far.
    pub async fn sync(&self, conn: &Connection) {
        let mut frames = Box::pin(conn.frames());
        let marker = RequestId::new(u64::MAX);
        self.reply(marker, None).await;
        tokio::time::timeout(WAIT, async {
            while let Some(frame) = frames.next().await {
                if matches!(frame, ServerFrame::Reply(ref r) if r.reply_to == Some(marker)) {
                    return;
                }
            }
        })
        .await
        .expect("client never processed the sync marker");
    }

    /// Close the server side; the client sees end of stream.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }
}
