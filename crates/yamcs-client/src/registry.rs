//! Subscription handles and the call → consumer route table.

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use yamcs_core::{CallId, EventFrame, SubscriptionKind};

/// Lifecycle of one subscription.
///
/// `Unsubscribed → Subscribing → Subscribed → Unsubscribing → Closed`, with
/// `Subscribing → Closed` when the request fails and `Subscribed → Closed`
/// when the connection goes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
    Closed,
}

impl SubscriptionState {
    pub fn can_transition_to(self, next: Self) -> bool {
        use SubscriptionState::*;
        matches!(
            (self, next),
            (Unsubscribed, Subscribing)
                | (Subscribing, Subscribed)
                | (Subscribing, Closed)
                | (Subscribed, Unsubscribing)
                | (Subscribed, Closed)
                | (Unsubscribing, Closed)
        )
    }
}

/// Consumer end of a subscription: a stream of the events for one call.
///
/// Releasing it, through [`Subscription::unsubscribe`] or by dropping it,
/// asks the server to cancel the call. The cancel is sent exactly once.
#[derive(Debug)]
pub struct Subscription {
    call: CallId,
    kind: SubscriptionKind,
    state: SubscriptionState,
    events: mpsc::UnboundedReceiver<EventFrame>,
    cancel_tx: mpsc::UnboundedSender<CallId>,
}

impl Subscription {
    pub(crate) fn new(
        call: CallId,
        kind: SubscriptionKind,
        events: mpsc::UnboundedReceiver<EventFrame>,
        cancel_tx: mpsc::UnboundedSender<CallId>,
    ) -> Self {
        Self {
            call,
            kind,
            state: SubscriptionState::Subscribed,
            events,
            cancel_tx,
        }
    }

    pub fn call(&self) -> CallId {
        self.call
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Cancel the call on the server and stop delivering events.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.state != SubscriptionState::Subscribed {
            return;
        }
        self.transition(SubscriptionState::Unsubscribing);
        self.events.close();
        if self.cancel_tx.send(self.call).is_err() {
            // Dispatcher already gone, nothing left to cancel.
            self.transition(SubscriptionState::Closed);
            return;
        }
        tracing::debug!(call = %self.call, kind = %self.kind, "Unsubscribing");
    }

    fn transition(&mut self, next: SubscriptionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "{:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

impl Stream for Subscription {
    type Item = EventFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<EventFrame>> {
        let this = self.get_mut();
        if this.state != SubscriptionState::Subscribed {
            return Poll::Ready(None);
        }
        match this.events.poll_recv(cx) {
            Poll::Ready(None) => {
                this.transition(SubscriptionState::Closed);
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Outcome of routing one event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Nobody is listening on this call.
    Unrouted,
}

/// Call → consumer queue. Owned by the dispatcher, never shared.
///
/// Queues are unbounded. The dispatcher never waits on a consumer and no
/// event of a call is lost.
#[derive(Default)]
pub(crate) struct Routes {
    routes: HashMap<CallId, mpsc::UnboundedSender<EventFrame>>,
}

impl Routes {
    pub fn insert(&mut self, call: CallId, tx: mpsc::UnboundedSender<EventFrame>) {
        if self.routes.insert(call, tx).is_some() {
            tracing::warn!(%call, "Call id reused; replacing route");
        }
    }

    pub fn remove(&mut self, call: CallId) -> bool {
        self.routes.remove(&call).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn deliver(&mut self, frame: EventFrame) -> Delivery {
        let call = frame.call;
        let Some(tx) = self.routes.get(&call) else {
            return Delivery::Unrouted;
        };
        if tx.send(frame).is_err() {
            self.routes.remove(&call);
            return Delivery::Unrouted;
        }
        Delivery::Delivered
    }
}
