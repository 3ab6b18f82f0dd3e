use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($name:ident, $label:expr) => {
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

// Correlates exactly one request frame with its reply.
numeric_id!(RequestId, "req");
// Durable subscription identifier assigned by the server.
numeric_id!(CallId, "call");

impl RequestId {
    /// Returns this id and advances `self` to the next one.
    pub fn bump(&mut self) -> Self {
        let current = *self;
        self.0 += 1;
        current
    }
}
