//! Typed streams derived from raw subscriptions.
//!
//! Each method opens its subscription before returning, so a failed
//! subscribe surfaces as an error here rather than inside the stream.
//! Dropping a returned stream cancels the call it wraps.

mod commands;
mod events;
mod parameters;

pub use commands::CommandLog;
pub use events::EventLog;
pub use parameters::{ParameterTracker, TrackerState};

use std::pin::Pin;
use std::sync::Arc;

use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};
use yamcs_core::model::{CommandHistoryEntry, Event, LinkInfo, ParameterValue, TimeInfo};
use yamcs_core::{ClientRequest, EventFrame, EventPayload, SubscriptionKind};

use crate::archive::HistorySource;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::registry::Subscription;

pub type DerivedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// The subscriptions a ground-station view needs, scoped to one instance
/// and processor.
#[derive(Clone)]
pub struct YamcsSubscriptions {
    conn: Arc<Connection>,
    history: Arc<dyn HistorySource>,
    instance: String,
    processor: String,
    event_window: Option<usize>,
}

impl YamcsSubscriptions {
    pub fn new(
        conn: Arc<Connection>,
        history: Arc<dyn HistorySource>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            conn,
            history,
            instance: config.instance.clone(),
            processor: config.processor.clone(),
            event_window: config.event_window,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Mission time updates.
    pub async fn time(&self) -> Result<DerivedStream<TimeInfo>, ClientError> {
        let sub = self
            .conn
            .subscribe(ClientRequest::time(&self.instance, &self.processor))
            .await?;
        Ok(payloads(sub, |payload| match payload {
            EventPayload::Time(time) => Some(time),
            _ => None,
        }))
    }

    /// The full link list, every time any link changes.
    pub async fn links(&self) -> Result<DerivedStream<Vec<LinkInfo>>, ClientError> {
        let sub = self.conn.subscribe(ClientRequest::links(&self.instance)).await?;
        Ok(payloads(sub, |payload| match payload {
            EventPayload::Links(links) => Some(links),
            _ => None,
        }))
    }

    /// Command history, newest first. Emits the prior history, then the
    /// whole list again after each live update.
    ///
    /// The live subscription opens before the archive is read, so an update
    /// landing in between is merged rather than lost.
    pub async fn commands(&self) -> Result<DerivedStream<Vec<CommandHistoryEntry>>, ClientError> {
        let sub = self.subscribe_commands().await?;
        let prior = self.history.list_commands(&self.instance).await?;
        Ok(command_snapshots(sub, CommandLog::new(prior)))
    }

    /// Like [`Self::commands`], seeded with `prior` instead of the archive.
    pub async fn commands_with_prior(
        &self,
        prior: Vec<CommandHistoryEntry>,
    ) -> Result<DerivedStream<Vec<CommandHistoryEntry>>, ClientError> {
        let sub = self.subscribe_commands().await?;
        Ok(command_snapshots(sub, CommandLog::new(prior)))
    }

    /// Values of one parameter, by qualified name.
    pub async fn parameter(&self, name: &str) -> Result<DerivedStream<ParameterValue>, ClientError> {
        let sub = self
            .conn
            .subscribe(ClientRequest::parameter(&self.instance, &self.processor, name))
            .await?;
        let mut tracker = ParameterTracker::new(name);
        Ok(payloads(sub, move |payload| match payload {
            EventPayload::Parameters(data) => tracker.apply(data),
            _ => None,
        }))
    }

    /// Events in arrival order, prior history first. Emits the prior list,
    /// then the whole list again after each new event.
    pub async fn events(&self) -> Result<DerivedStream<Vec<Event>>, ClientError> {
        let sub = self.subscribe_events().await?;
        let prior = self.history.list_events(&self.instance).await?;
        Ok(event_snapshots(sub, EventLog::new(prior, self.event_window)))
    }

    pub async fn events_with_prior(
        &self,
        prior: Vec<Event>,
    ) -> Result<DerivedStream<Vec<Event>>, ClientError> {
        let sub = self.subscribe_events().await?;
        Ok(event_snapshots(sub, EventLog::new(prior, self.event_window)))
    }

    /// Any subscription, undecoded beyond the frame level.
    pub async fn raw(&self, request: ClientRequest) -> Result<DerivedStream<EventFrame>, ClientError> {
        Ok(self.conn.subscribe(request).await?.boxed())
    }

    async fn subscribe_commands(&self) -> Result<Subscription, ClientError> {
        self.conn
            .subscribe(ClientRequest::commands(&self.instance, &self.processor))
            .await
    }

    async fn subscribe_events(&self) -> Result<Subscription, ClientError> {
        self.conn.subscribe(ClientRequest::events(&self.instance)).await
    }
}

/// Keep the payloads `pick` accepts. Anything else on the call is logged
/// and skipped.
fn payloads<T, F>(sub: Subscription, mut pick: F) -> DerivedStream<T>
where
    T: Send + 'static,
    F: FnMut(EventPayload) -> Option<T> + Send + 'static,
{
    let expected = sub.kind();
    sub.filter_map(move |frame| {
        let kind = frame.kind();
        if kind != expected {
            tracing::debug!(call = %frame.call, %expected, got = %kind, "Unexpected payload on call");
            return ready(None);
        }
        ready(pick(frame.payload))
    })
    .boxed()
}

fn command_snapshots(sub: Subscription, mut log: CommandLog) -> DerivedStream<Vec<CommandHistoryEntry>> {
    let initial = log.snapshot();
    let updates = payloads(sub, |payload| match payload {
        EventPayload::Commands(entry) => Some(entry),
        _ => None,
    })
    .map(move |entry| {
        log.apply(entry);
        log.snapshot()
    });
    stream::once(ready(initial)).chain(updates).boxed()
}

fn event_snapshots(sub: Subscription, mut log: EventLog) -> DerivedStream<Vec<Event>> {
    let initial = log.snapshot();
    let updates = payloads(sub, |payload| match payload {
        EventPayload::Events(event) => Some(event),
        _ => None,
    })
    .map(move |event| {
        log.push(event);
        log.snapshot()
    });
    stream::once(ready(initial)).chain(updates).boxed()
}
