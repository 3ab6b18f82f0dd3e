//! Realtime client for a YAMCS server's websocket API.
//!
//! A [`Connection`] multiplexes requests and subscriptions over one socket.
//! [`YamcsSubscriptions`] builds the typed views (time, links, commands,
//! parameters, events) on top of it.

pub mod archive;
pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod streams;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use archive::{ArchiveClient, HistorySource, NoHistory};
pub use config::ClientConfig;
pub use connection::Connection;
pub use error::ClientError;
pub use registry::{Subscription, SubscriptionState};
pub use streams::{DerivedStream, ParameterTracker, YamcsSubscriptions};
pub use transport::Transport;
pub use yamcs_telemetry::FrameStatsSnapshot;
