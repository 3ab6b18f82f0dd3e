pub mod errors;
pub mod frames;
pub mod ids;
pub mod merge;
pub mod model;

pub use errors::FrameError;
pub use frames::{
    ClientRequest, EventFrame, EventPayload, OutboundFrame, ReplyException, ReplyFrame, ServerFrame,
    SubscriptionKind,
};
pub use ids::{CallId, RequestId};
pub use merge::{merge_command_entries, sort_newest_first};
