/// Why an inbound frame could not be decoded into a known shape.
///
/// Decoding never fails outright: a frame carrying one of these ends up as
/// [`ServerFrame::Unknown`](crate::frames::ServerFrame::Unknown) so the
/// dispatcher can count it and move on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("frame has no type")]
    MissingType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("malformed {frame_type} frame: {reason}")]
    Malformed { frame_type: String, reason: String },
}

impl FrameError {
    pub fn malformed(frame_type: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            frame_type: frame_type.into(),
            reason: err.to_string(),
        }
    }

    /// Short classification string for logging/counters.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::Malformed { .. } => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_strings() {
        assert_eq!(FrameError::MissingType.error_kind(), "missing_type");
        assert_eq!(FrameError::UnknownType("x".into()).error_kind(), "unknown_type");
        assert_eq!(FrameError::malformed("time", "bad date").error_kind(), "malformed");
    }

    #[test]
    fn malformed_message_names_frame_type() {
        let err = FrameError::malformed("links", "missing field `links`");
        assert_eq!(err.to_string(), "malformed links frame: missing field `links`");
    }
}
