use std::time::Duration;

use reqwest::Url;

use crate::error::ClientError;

const WEBSOCKET_PATH: &str = "/api/websocket";

/// Connection settings for one YAMCS server.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP base URL of the server. The websocket URL is derived from it.
    pub url: String,
    pub instance: String,
    pub processor: String,
    /// How long a request waits for its reply.
    pub reply_timeout: Duration,
    /// Capacity of the socket and command queues. Subscription queues are
    /// unbounded.
    pub channel_capacity: usize,
    /// `source` filter for the prior-events history fetch.
    pub event_source: Option<String>,
    /// `limit` for the prior-events history fetch.
    pub event_limit: u32,
    /// Keep at most this many events in the accumulated list. `None` keeps all.
    pub event_window: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090".into(),
            instance: "ground_station".into(),
            processor: "realtime".into(),
            reply_timeout: Duration::from_secs(30),
            channel_capacity: 1024,
            event_source: Some("ASTRA".into()),
            event_limit: 500,
            event_window: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `YAMCS_URL`, `YAMCS_INSTANCE` and `YAMCS_PROCESSOR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("YAMCS_URL") {
            config.url = url;
        }
        if let Some(instance) = lookup("YAMCS_INSTANCE") {
            config.instance = instance;
        }
        if let Some(processor) = lookup("YAMCS_PROCESSOR") {
            config.processor = processor;
        }
        config
    }

    /// `http://host:port/...` → `ws://host:port/api/websocket`, `https` → `wss`.
    pub fn websocket_url(&self) -> Result<String, ClientError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ClientError::Config(format!("invalid url {:?}: {e}", self.url)))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Config(format!(
                    "unsupported url scheme {other:?}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("cannot use scheme {scheme}")))?;
        url.set_path(WEBSOCKET_PATH);
        url.set_query(None);
        Ok(url.to_string())
    }

    /// Base URL for REST calls, without a trailing slash.
    pub fn http_base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
