//! Domain payloads carried inside server frames.
//!
//! Field names follow the server's protobuf-JSON encoding (camelCase, 64-bit
//! integers possibly rendered as strings).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CallId;

/// A qualified name, e.g. `/flight/altitude`.
pub type QualifiedName = String;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedObjectId {
    pub name: QualifiedName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl NamedObjectId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}

/// A typed engineering or raw value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Value {
    Float {
        #[serde(rename = "floatValue", alias = "value")]
        value: f32,
    },
    Double {
        #[serde(rename = "doubleValue", alias = "value")]
        value: f64,
    },
    Sint32 {
        #[serde(rename = "sint32Value", alias = "value")]
        value: i32,
    },
    Uint32 {
        #[serde(rename = "uint32Value", alias = "value")]
        value: u32,
    },
    Sint64 {
        #[serde(rename = "sint64Value", alias = "value", with = "lenient_int")]
        value: i64,
    },
    Uint64 {
        #[serde(rename = "uint64Value", alias = "value", with = "lenient_int")]
        value: u64,
    },
    Binary {
        #[serde(rename = "binaryValue", alias = "value", with = "base64_bytes")]
        value: Vec<u8>,
    },
    #[serde(rename = "STRING")]
    Text {
        #[serde(rename = "stringValue", alias = "value")]
        value: String,
    },
    Timestamp {
        #[serde(rename = "stringValue", alias = "value")]
        value: DateTime<Utc>,
    },
    Boolean {
        #[serde(rename = "booleanValue", alias = "value")]
        value: bool,
    },
    Enumerated {
        #[serde(rename = "stringValue", alias = "value")]
        value: String,
    },
    Aggregate {
        #[serde(
            rename = "aggregateValue",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        value: Option<serde_json::Value>,
    },
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float { value } => Some(f64::from(*value)),
            Self::Double { value } => Some(*value),
            Self::Sint32 { value } => Some(f64::from(*value)),
            Self::Uint32 { value } => Some(f64::from(*value)),
            Self::Sint64 { value } => Some(*value as f64),
            Self::Uint64 { value } => Some(*value as f64),
            _ => None,
        }
    }
}

// ── Time ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub value: DateTime<Utc>,
}

// ── Links ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStyle {
    PushButton,
    CheckBox,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub id: String,
    pub label: String,
    pub style: ActionStyle,
    pub enabled: bool,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    pub instance: String,
    pub name: String,
    #[serde(rename = "type")]
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub status: String,
    #[serde(with = "lenient_int")]
    pub data_in_count: u64,
    #[serde(with = "lenient_int")]
    pub data_out_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<QualifiedName>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksPayload {
    #[serde(default)]
    pub links: Vec<LinkInfo>,
}

// ── Parameters ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub numeric_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<Value>,
    pub eng_value: Value,
    pub generation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_time: Option<DateTime<Utc>>,
}

/// Body of a `parameters` event.
///
/// The first frame of a subscription carries `mapping` (numeric id to
/// qualified name); later frames carry `values` referring to those ids.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<BTreeMap<u32, NamedObjectId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ParameterValue>>,
}

impl ParameterData {
    pub fn mapping(mapping: BTreeMap<u32, NamedObjectId>) -> Self {
        Self {
            mapping: Some(mapping),
            values: None,
        }
    }

    pub fn values(values: Vec<ParameterValue>) -> Self {
        Self {
            mapping: None,
            values: Some(values),
        }
    }

    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }
}

// ── Command history ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandId {
    pub generation_time: DateTime<Utc>,
    pub origin: String,
    pub sequence_number: i64,
    pub command_name: QualifiedName,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandAttribute {
    pub name: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAssignment {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub user_input: bool,
}

/// One command-history entry, complete or partial.
///
/// Live updates for the same `id` arrive repeatedly and only carry the
/// attributes known so far; see [`crate::merge`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHistoryEntry {
    pub id: String,
    pub command_name: QualifiedName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<BTreeMap<String, String>>,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<CommandId>,
    #[serde(default)]
    pub attr: Vec<CommandAttribute>,
    pub generation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<CommandAssignment>>,
}

impl CommandHistoryEntry {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attr.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

// ── Events ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    Info,
    Watch,
    Warning,
    Distress,
    Critical,
    Severe,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub source: String,
    pub generation_time: DateTime<Utc>,
    pub reception_time: DateTime<Utc>,
    #[serde(with = "lenient_int")]
    pub seq_number: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub message: String,
    pub severity: EventSeverity,
}

// ── Server state ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallInfo {
    pub call: CallId,
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

/// The server's view of the calls open on this connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    #[serde(default)]
    pub calls: Vec<CallInfo>,
}

// ── serde helpers ────────────────────────────────────────────────────────────

/// Integers that may arrive as JSON numbers or as decimal strings.
mod lenient_int {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr<T> {
        Number(T),
        Text(String),
    }

    pub fn serialize<T: Serialize, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match Repr::<T>::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}
