use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ContentRepositoryEvent;

/// A committed event as delivered by the event store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Global, strictly increasing position in the event log.
    pub sequence_number: u64,
    /// Version of the event within its own stream.
    pub version: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: ContentRepositoryEvent,
}

impl EventEnvelope {
    pub fn new(sequence_number: u64, version: u64, event: ContentRepositoryEvent) -> Self {
        Self {
            sequence_number,
            version,
            recorded_at: Utc::now(),
            event,
        }
    }
}
