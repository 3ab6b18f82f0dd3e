//! One websocket connection and the dispatcher task that owns its state.
//!
//! Callers talk to the dispatcher through channels. It stamps request ids,
//! correlates replies, routes events to subscriptions and fans every decoded
//! frame out to [`Connection::frames`] listeners. Nothing it owns is shared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use yamcs_core::model::ServerState;
use yamcs_core::{
    CallId, ClientRequest, EventFrame, OutboundFrame, ReplyFrame, RequestId, ServerFrame,
};
use yamcs_telemetry::{FrameCounters, FrameStatsSnapshot};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::registry::{Delivery, Routes, Subscription};
use crate::transport::{self, Transport};

const FRAME_FANOUT_CAPACITY: usize = 256;
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type ReplyTx = oneshot::Sender<Result<ReplyFrame, ClientError>>;
type EventTx = mpsc::UnboundedSender<EventFrame>;

enum Command {
    Send {
        request: ClientRequest,
        /// Where events go if the reply opens a call.
        route: Option<EventTx>,
        /// `None` for fire-and-forget requests.
        reply_tx: Option<ReplyTx>,
    },
    Close,
}

struct Pending {
    request: &'static str,
    route: Option<EventTx>,
    reply_tx: ReplyTx,
}

/// A live connection to the server.
pub struct Connection {
    cmd_tx: mpsc::Sender<Command>,
    cancel_tx: mpsc::UnboundedSender<CallId>,
    frames_tx: broadcast::Sender<ServerFrame>,
    counters: Arc<FrameCounters>,
    reply_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Open the websocket derived from `config.url` and start dispatching.
    /// Returns once the socket is open; an initial `status` request is sent
    /// without waiting for its reply.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let url = config.websocket_url()?;
        let (transport, pumps) = transport::open(&url, config.channel_capacity).await?;
        let mut conn = Self::with_transport(transport, config);
        conn.tasks.extend(pumps);
        conn.fire(ClientRequest::Status).await?;
        Ok(conn)
    }

    /// Dispatch over an already-open transport.
    pub fn with_transport(transport: Transport, config: &ClientConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let (frames_tx, _) = broadcast::channel(FRAME_FANOUT_CAPACITY);
        let counters = Arc::new(FrameCounters::new());

        let dispatcher = Dispatcher {
            outbound: transport.outbound,
            pending: HashMap::new(),
            abandoned: HashSet::new(),
            routes: Routes::default(),
            next_id: RequestId::new(1),
            frames_tx: frames_tx.clone(),
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(dispatcher.run(cmd_rx, cancel_rx, transport.inbound));

        Self {
            cmd_tx,
            cancel_tx,
            frames_tx,
            counters,
            reply_timeout: config.reply_timeout,
            tasks: vec![handle],
        }
    }

    /// Send a request and wait for its reply. Returns the call id the server
    /// assigned, if the request opened one.
    pub async fn send(&self, request: ClientRequest) -> Result<Option<CallId>, ClientError> {
        let reply = self.request(request, None).await?;
        Ok(reply.call)
    }

    /// Open a subscription. Events for the new call are routed to the
    /// returned handle from the moment the reply is read.
    pub async fn subscribe(&self, request: ClientRequest) -> Result<Subscription, ClientError> {
        let kind = request
            .subscription_kind()
            .ok_or(ClientError::NotASubscription(request.type_name()))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reply = self.request(request, Some(event_tx)).await?;
        let call = reply.call.ok_or(ClientError::MissingCall {
            request: kind.as_str(),
        })?;
        tracing::debug!(%call, %kind, "Subscribed");
        Ok(Subscription::new(call, kind, event_rx, self.cancel_tx.clone()))
    }

    /// Every decoded inbound frame, in arrival order. A listener that falls
    /// too far behind skips frames; the skipped count shows up in `dropped`.
    pub fn frames(&self) -> impl Stream<Item = ServerFrame> + Send + 'static {
        let counters = Arc::clone(&self.counters);
        BroadcastStream::new(self.frames_tx.subscribe()).filter_map(move |item| {
            let counters = Arc::clone(&counters);
            async move {
                match item {
                    Ok(frame) => Some(frame),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        counters.record_dropped(skipped);
                        tracing::warn!(skipped, "Frame listener lagged");
                        None
                    }
                }
            }
        })
    }

    /// Ask the server which calls it holds open for this connection.
    pub async fn request_state(&self) -> Result<ServerState, ClientError> {
        let mut frames = Box::pin(self.frames());
        self.fire(ClientRequest::State).await?;
        let wait = async {
            while let Some(frame) = frames.next().await {
                if let ServerFrame::State(state) = frame {
                    return Ok(state);
                }
            }
            Err(ClientError::Closed)
        };
        tokio::time::timeout(self.reply_timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout {
                request: "state",
                after: self.reply_timeout,
            })?
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.counters.snapshot()
    }

    /// Whether the dispatcher is still running.
    pub fn is_open(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Stop dispatching and close the socket. Open subscriptions end.
    pub async fn close(self) {
        let _ = self.cmd_tx.send(Command::Close).await;
        for task in self.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                abort.abort();
            }
        }
    }

    async fn request(
        &self,
        request: ClientRequest,
        route: Option<EventTx>,
    ) -> Result<ReplyFrame, ClientError> {
        let name = request.type_name();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                request,
                route,
                reply_tx: Some(reply_tx),
            })
            .await
            .map_err(|_| ClientError::Closed)?;

        let reply = tokio::time::timeout(self.reply_timeout, reply_rx)
            .await
            .map_err(|_| ClientError::Timeout {
                request: name,
                after: self.reply_timeout,
            })?
            .map_err(|_| ClientError::Closed)??;

        match reply.exception {
            Some(exception) => Err(ClientError::Server {
                request: name,
                code: exception.code,
                kind: exception.kind,
                message: exception.msg,
            }),
            None => Ok(reply),
        }
    }

    async fn fire(&self, request: ClientRequest) -> Result<(), ClientError> {
        self.cmd_tx
            .send(Command::Send {
                request,
                route: None,
                reply_tx: None,
            })
            .await
            .map_err(|_| ClientError::Closed)
    }
}

struct Dispatcher {
    outbound: mpsc::Sender<String>,
    pending: HashMap<RequestId, Pending>,
    /// Subscribe requests whose caller timed out before the reply came.
    abandoned: HashSet<RequestId>,
    routes: Routes,
    next_id: RequestId,
    frames_tx: broadcast::Sender<ServerFrame>,
    counters: Arc<FrameCounters>,
}

/// The socket's write side is gone.
struct Disconnected;

impl Dispatcher {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut cancel_rx: mpsc::UnboundedReceiver<CallId>,
        mut inbound: mpsc::Receiver<String>,
    ) {
        loop {
            let step = tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send { request, route, reply_tx }) => {
                        self.send(request, route, reply_tx).await
                    }
                    Some(Command::Close) | None => break,
                },
                Some(call) = cancel_rx.recv() => self.cancel(call).await,
                text = inbound.recv() => match text {
                    Some(text) => self.handle_inbound(&text).await,
                    None => {
                        tracing::info!("Server closed the connection");
                        break;
                    }
                },
            };
            if step.is_err() {
                tracing::warn!("WebSocket writer gone; stopping dispatcher");
                break;
            }
        }
        tracing::debug!(
            pending = self.pending.len(),
            routes = self.routes.len(),
            "Dispatcher stopped"
        );
        // Dropping `pending` fails waiting requests with `Closed`; dropping
        // `routes` ends every subscription stream.
    }

    async fn send(
        &mut self,
        request: ClientRequest,
        route: Option<EventTx>,
        reply_tx: Option<ReplyTx>,
    ) -> Result<(), Disconnected> {
        self.sweep_abandoned();
        let id = self.next_id.bump();
        let name = request.type_name();
        let text = match OutboundFrame::new(id, request).to_json() {
            Ok(text) => text,
            Err(e) => {
                if let Some(tx) = reply_tx {
                    let _ = tx.send(Err(ClientError::Encode(e)));
                }
                return Ok(());
            }
        };
        if let Some(reply_tx) = reply_tx {
            self.pending.insert(
                id,
                Pending {
                    request: name,
                    route,
                    reply_tx,
                },
            );
        }
        tracing::debug!(request_id = %id, request = name, "Sending request");
        self.write(text).await
    }

    /// Forget requests nobody waits for any more. A subscribe among them is
    /// remembered so a reply that still opens its call gets cancelled.
    fn sweep_abandoned(&mut self) {
        let abandoned = &mut self.abandoned;
        self.pending.retain(|&id, pending| {
            if !pending.reply_tx.is_closed() {
                return true;
            }
            tracing::debug!(request_id = %id, request = pending.request, "Forgetting abandoned request");
            if pending.route.is_some() {
                abandoned.insert(id);
            }
            false
        });
    }

    async fn cancel(&mut self, call: CallId) -> Result<(), Disconnected> {
        // Later events for this call count as unrouted and go nowhere.
        self.routes.remove(call);
        let id = self.next_id.bump();
        let text = match OutboundFrame::new(id, ClientRequest::cancel(call)).to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%call, error = %e, "Failed to encode cancel");
                return Ok(());
            }
        };
        tracing::debug!(request_id = %id, %call, "Cancelling call");
        self.write(text).await
    }

    async fn write(&mut self, text: String) -> Result<(), Disconnected> {
        self.outbound.send(text).await.map_err(|_| Disconnected)?;
        self.counters.record_sent();
        Ok(())
    }

    async fn handle_inbound(&mut self, text: &str) -> Result<(), Disconnected> {
        self.counters.record_received();
        let frame = ServerFrame::decode(text);
        tracing::debug!(frame = frame.label(), "Received frame");
        let fanout = (self.frames_tx.receiver_count() > 0).then(|| frame.clone());

        match frame {
            ServerFrame::Reply(reply) => self.handle_reply(reply).await?,
            ServerFrame::State(state) => {
                self.counters.record_state();
                tracing::debug!(calls = state.calls.len(), "Server state");
            }
            ServerFrame::Event(event) => {
                self.counters.record_event();
                let (call, seq) = (event.call, event.seq);
                match self.routes.deliver(event) {
                    Delivery::Delivered => tracing::trace!(%call, seq, "Routed event"),
                    Delivery::Unrouted => {
                        self.counters.record_unrouted();
                        tracing::trace!(%call, seq, "Event for unrouted call");
                    }
                }
            }
            ServerFrame::Unknown(err) => {
                self.counters.record_unknown(err.error_kind());
                tracing::warn!(error = %err, len = text.len(), "Ignoring unrecognised frame");
            }
        }

        if let Some(frame) = fanout {
            let _ = self.frames_tx.send(frame);
        }
        Ok(())
    }

    async fn handle_reply(&mut self, reply: ReplyFrame) -> Result<(), Disconnected> {
        self.counters.record_reply(reply.exception.is_some());

        let Some(pending) = reply.reply_to.and_then(|id| self.pending.remove(&id)) else {
            if let Some(call) = self.abandoned_call(&reply) {
                tracing::debug!(%call, "Late reply to abandoned subscribe; cancelling call");
                return self.cancel(call).await;
            }
            if let Some(exception) = &reply.exception {
                tracing::warn!(
                    reply_to = ?reply.reply_to,
                    code = exception.code,
                    kind = %exception.kind,
                    msg = %exception.msg,
                    "Exception reply to untracked request"
                );
            } else {
                tracing::trace!(reply_to = ?reply.reply_to, "Reply to untracked request");
            }
            return Ok(());
        };

        if let Some(exception) = &reply.exception {
            tracing::warn!(
                request = pending.request,
                code = exception.code,
                kind = %exception.kind,
                msg = %exception.msg,
                "Request rejected"
            );
        }

        // Register before anything else is read so no event for the call
        // can arrive unrouted.
        let opened = match (reply.call, reply.exception.is_none(), pending.route) {
            (Some(call), true, Some(route)) => {
                self.routes.insert(call, route);
                Some(call)
            }
            _ => None,
        };

        if pending.reply_tx.send(Ok(reply)).is_err() {
            // The caller gave up waiting. Do not leave the call open.
            if let Some(call) = opened {
                tracing::debug!(%call, request = pending.request, "Late reply; cancelling call");
                return self.cancel(call).await;
            }
        }
        Ok(())
    }

    /// The call a late reply opened, if its request was swept as abandoned.
    fn abandoned_call(&mut self, reply: &ReplyFrame) -> Option<CallId> {
        let id = reply.reply_to?;
        if !self.abandoned.remove(&id) || reply.exception.is_some() {
            return None;
        }
        reply.call
    }
}
