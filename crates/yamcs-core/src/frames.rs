//! Wire frames exchanged over the websocket.
//!
//! Client → server: `{id, type, options}` built from [`ClientRequest`].
//! Server → client: a reply, a server-state dump, or an event for one call.
//! Anything else decodes to [`ServerFrame::Unknown`] instead of an error.

use serde::{Deserialize, Serialize};

use crate::errors::FrameError;
use crate::ids::{CallId, RequestId};
use crate::model::{
    CommandHistoryEntry, Event, LinkInfo, LinksPayload, NamedObjectId, ParameterData,
    ServerState, TimeInfo,
};

/// The kinds of long-lived subscription the server offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Time,
    Links,
    Commands,
    Parameters,
    Events,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Links => "links",
            Self::Commands => "commands",
            Self::Parameters => "parameters",
            Self::Events => "events",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "time" => Some(Self::Time),
            "links" => Some(Self::Links),
            "commands" => Some(Self::Commands),
            "parameters" => Some(Self::Parameters),
            "events" => Some(Self::Events),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Client → server ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOptions {
    pub instance: String,
    pub processor: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksOptions {
    pub instance: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandsOptions {
    pub instance: String,
    pub processor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_past_commands: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersOptions {
    pub instance: String,
    pub processor: String,
    pub id: Vec<NamedObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_from_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_on_expiration: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsOptions {
    pub instance: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOptions {
    pub call: CallId,
}

/// Every request the client knows how to send. Each variant carries exactly
/// the options its server-side handler reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum ClientRequest {
    Time(TimeOptions),
    Links(LinksOptions),
    Commands(CommandsOptions),
    Parameters(ParametersOptions),
    Events(EventsOptions),
    Cancel(CancelOptions),
    Status,
    State,
}

impl ClientRequest {
    pub fn time(instance: impl Into<String>, processor: impl Into<String>) -> Self {
        Self::Time(TimeOptions {
            instance: instance.into(),
            processor: processor.into(),
        })
    }

    pub fn links(instance: impl Into<String>) -> Self {
        Self::Links(LinksOptions {
            instance: instance.into(),
        })
    }

    pub fn commands(instance: impl Into<String>, processor: impl Into<String>) -> Self {
        Self::Commands(CommandsOptions {
            instance: instance.into(),
            processor: processor.into(),
            ignore_past_commands: None,
        })
    }

    pub fn parameter(
        instance: impl Into<String>,
        processor: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Parameters(ParametersOptions {
            instance: instance.into(),
            processor: processor.into(),
            id: vec![NamedObjectId::new(name)],
            send_from_cache: None,
            update_on_expiration: None,
        })
    }

    pub fn events(instance: impl Into<String>) -> Self {
        Self::Events(EventsOptions {
            instance: instance.into(),
        })
    }

    pub fn cancel(call: CallId) -> Self {
        Self::Cancel(CancelOptions { call })
    }

    /// Wire name of the request (`type` field).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Time(_) => "time",
            Self::Links(_) => "links",
            Self::Commands(_) => "commands",
            Self::Parameters(_) => "parameters",
            Self::Events(_) => "events",
            Self::Cancel(_) => "cancel",
            Self::Status => "status",
            Self::State => "state",
        }
    }

    /// The subscription this request opens, if it opens one.
    pub fn subscription_kind(&self) -> Option<SubscriptionKind> {
        match self {
            Self::Time(_) => Some(SubscriptionKind::Time),
            Self::Links(_) => Some(SubscriptionKind::Links),
            Self::Commands(_) => Some(SubscriptionKind::Commands),
            Self::Parameters(_) => Some(SubscriptionKind::Parameters),
            Self::Events(_) => Some(SubscriptionKind::Events),
            Self::Cancel(_) | Self::Status | Self::State => None,
        }
    }
}

/// A request stamped with its correlation id, as written to the socket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub id: RequestId,
    #[serde(flatten)]
    pub request: ClientRequest,
}

impl OutboundFrame {
    pub fn new(id: RequestId, request: ClientRequest) -> Self {
        Self { id, request }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Server → client ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyException {
    pub code: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub msg: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Present only in replies to subscribe-type requests.
    pub call: Option<CallId>,
    pub reply_to: Option<RequestId>,
    pub exception: Option<ReplyException>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    Time(TimeInfo),
    Links(Vec<LinkInfo>),
    Commands(CommandHistoryEntry),
    Parameters(ParameterData),
    Events(Event),
}

impl EventPayload {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Self::Time(_) => SubscriptionKind::Time,
            Self::Links(_) => SubscriptionKind::Links,
            Self::Commands(_) => SubscriptionKind::Commands,
            Self::Parameters(_) => SubscriptionKind::Parameters,
            Self::Events(_) => SubscriptionKind::Events,
        }
    }

    fn decode(kind: SubscriptionKind, data: serde_json::Value) -> Result<Self, FrameError> {
        let malformed = |e: serde_json::Error| FrameError::malformed(kind.as_str(), e);
        Ok(match kind {
            SubscriptionKind::Time => Self::Time(serde_json::from_value(data).map_err(malformed)?),
            SubscriptionKind::Links => {
                let payload: LinksPayload = serde_json::from_value(data).map_err(malformed)?;
                Self::Links(payload.links)
            }
            SubscriptionKind::Commands => {
                Self::Commands(serde_json::from_value(data).map_err(malformed)?)
            }
            SubscriptionKind::Parameters => {
                Self::Parameters(serde_json::from_value(data).map_err(malformed)?)
            }
            SubscriptionKind::Events => Self::Events(serde_json::from_value(data).map_err(malformed)?),
        })
    }
}

/// An update belonging to one subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct EventFrame {
    pub call: CallId,
    pub seq: u64,
    pub payload: EventPayload,
}

impl EventFrame {
    pub fn kind(&self) -> SubscriptionKind {
        self.payload.kind()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerFrame {
    Reply(ReplyFrame),
    State(ServerState),
    Event(EventFrame),
    Unknown(FrameError),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: Option<String>,
    call: Option<CallId>,
    seq: Option<u64>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReplyData {
    reply_to: Option<RequestId>,
    exception: Option<ReplyException>,
}

impl ServerFrame {
    /// Decode one text message. Never fails: unrecognised input becomes
    /// [`ServerFrame::Unknown`].
    pub fn decode(text: &str) -> Self {
        Self::try_decode(text).unwrap_or_else(Self::Unknown)
    }

    pub fn try_decode(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
        let raw: RawFrame =
            serde_json::from_value(value).map_err(|e| FrameError::malformed("frame", e))?;
        let frame_type = raw.frame_type.ok_or(FrameError::MissingType)?;

        match frame_type.as_str() {
            "reply" => {
                let data: RawReplyData = if raw.data.is_null() {
                    RawReplyData::default()
                } else {
                    serde_json::from_value(raw.data).map_err(|e| FrameError::malformed("reply", e))?
                };
                Ok(Self::Reply(ReplyFrame {
                    call: raw.call,
                    reply_to: data.reply_to,
                    exception: data.exception,
                }))
            }
            "state" => {
                let state = serde_json::from_value(raw.data)
                    .map_err(|e| FrameError::malformed("state", e))?;
                Ok(Self::State(state))
            }
            other => {
                let kind = SubscriptionKind::from_wire(other)
                    .ok_or_else(|| FrameError::UnknownType(other.to_string()))?;
                let call = raw
                    .call
                    .ok_or_else(|| FrameError::malformed(other, "missing call"))?;
                let seq = raw
                    .seq
                    .ok_or_else(|| FrameError::malformed(other, "missing seq"))?;
                let payload = EventPayload::decode(kind, raw.data)?;
                Ok(Self::Event(EventFrame { call, seq, payload }))
            }
        }
    }

    /// Short label for logging/counters.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::State(_) => "state",
            Self::Event(e) => e.kind().as_str(),
            Self::Unknown(_) => "unknown",
        }
    }
}
