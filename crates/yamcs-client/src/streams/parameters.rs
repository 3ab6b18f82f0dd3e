use std::collections::BTreeMap;

use yamcs_core::model::{NamedObjectId, ParameterData, ParameterValue};

/// Where a single-parameter subscription is in its life.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerState {
    /// No mapping seen yet; values cannot be resolved.
    AwaitingMapping,
    /// Numeric id → name, as captured from the mapping frames.
    Streaming(BTreeMap<u32, NamedObjectId>),
}

/// Turns the raw `parameters` frames of one subscription into the values
/// of the parameter it was opened for.
///
/// Values are matched by name only; the namespace is ignored.
#[derive(Clone, Debug)]
pub struct ParameterTracker {
    name: String,
    state: TrackerState,
}

impl ParameterTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TrackerState::AwaitingMapping,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Feed one frame. Returns the value to emit, if the frame carries one
    /// for the tracked parameter. When several match, the last one wins.
    pub fn apply(&mut self, data: ParameterData) -> Option<ParameterValue> {
        if let Some(mapping) = data.mapping {
            match &mut self.state {
                TrackerState::AwaitingMapping => {
                    tracing::debug!(parameter = %self.name, ids = mapping.len(), "Parameter mapping received");
                    self.state = TrackerState::Streaming(mapping);
                }
                // Later mapping frames announce more ids.
                TrackerState::Streaming(known) => known.extend(mapping),
            }
        }

        let values = data.values?;
        let TrackerState::Streaming(mapping) = &self.state else {
            tracing::warn!(
                parameter = %self.name,
                dropped = values.len(),
                "Parameter values before mapping; dropping"
            );
            return None;
        };

        values
            .into_iter()
            .filter(|v| {
                mapping
                    .get(&v.numeric_id)
                    .is_some_and(|id| id.name == self.name)
            })
            .last()
    }
}
