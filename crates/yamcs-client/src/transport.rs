//! Socket pumps. The rest of the client only sees two text channels.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ClientError;

/// Text frames to and from the server.
///
/// Dropping `outbound` closes the socket; `inbound` ends when the server
/// goes away.
pub struct Transport {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

impl Transport {
    /// A pair of channels not backed by any socket, plus the far ends:
    /// what the client writes arrives on the returned receiver, and text
    /// sent on the returned sender is read by the client.
    pub fn in_memory(capacity: usize) -> (Self, mpsc::Receiver<String>, mpsc::Sender<String>) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            out_rx,
            in_tx,
        )
    }
}

/// Open the websocket and start its reader and writer tasks. Returns once
/// the handshake has completed.
pub async fn open(
    url: &str,
    capacity: usize,
) -> Result<(Transport, Vec<JoinHandle<()>>), ClientError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| ClientError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    tracing::info!(url, "WebSocket opened");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(capacity);
    let (in_tx, in_rx) = mpsc::channel::<String>(capacity);

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                tracing::warn!(error = %e, "WebSocket write failed");
                return;
            }
        }
        // Every sender is gone: say goodbye.
        let _ = ws_tx.send(Message::Close(None)).await;
        let _ = ws_tx.close().await;
        tracing::debug!("WebSocket writer finished");
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    // Bounded: a slow dispatcher stops us reading the socket.
                    if in_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(bytes)) => {
                    tracing::debug!(len = bytes.len(), "Ignoring binary frame");
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "WebSocket closed by server");
                    break;
                }
                // Pongs are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    });

    Ok((
        Transport {
            outbound: out_tx,
            inbound: in_rx,
        },
        vec![writer, reader],
    ))
}
