use std::time::Duration;

/// Errors surfaced to callers of the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The server answered with an exception reply.
    #[error("{request} rejected by server ({code} {kind}): {message}")]
    Server {
        request: &'static str,
        code: i64,
        kind: String,
        message: String,
    },

    #[error("reply to {request} carried no call id")]
    MissingCall { request: &'static str },

    #[error("{0} does not open a subscription")]
    NotASubscription(&'static str),

    #[error("no reply to {request} within {after:?}")]
    Timeout {
        request: &'static str,
        after: Duration,
    },

    #[error("connection closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

impl ClientError {
    /// Short stable label, for logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connect { .. } => "connect",
            Self::Server { .. } => "server",
            Self::MissingCall { .. } => "missing_call",
            Self::NotASubscription(_) => "not_a_subscription",
            Self::Timeout { .. } => "timeout",
            Self::Closed => "closed",
            Self::Encode(_) => "encode",
            Self::Http(_) => "http",
            Self::HttpStatus { .. } => "http_status",
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Closed | Self::Http(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
