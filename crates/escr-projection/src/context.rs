use chrono::{DateTime, Utc};
use rusqlite::Connection;

use escr_graph::{ProjectionContentGraph, TableNames};

use crate::error::{InconsistencyReason, ProjectionError};

/// Everything a handler needs while applying one event: the open
/// transaction, the table names, and facts about the event itself.
pub(crate) struct EventContext<'a> {
    pub conn: &'a Connection,
    pub tables: &'a TableNames,
    pub recorded_at: DateTime<Utc>,
    pub event_type: &'static str,
}

impl<'a> EventContext<'a> {
    pub fn graph(&self) -> ProjectionContentGraph<'a> {
        ProjectionContentGraph::new(self.conn, self.tables)
    }

    pub fn inconsistent(
        &self,
        reason: InconsistencyReason,
        detail: impl Into<String>,
    ) -> ProjectionError {
        ProjectionError::EventCouldNotBeApplied {
            event: self.event_type,
            reason,
            detail: detail.into(),
        }
    }
}
