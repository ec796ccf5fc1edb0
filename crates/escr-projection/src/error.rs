use std::fmt;

use escr_graph::GraphError;

/// Which expectation about the stored graph an event contradicted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InconsistencyReason {
    SourceNodeMissing,
    SourceParentNodeMissing,
    TargetParentNodeMissing,
    TargetSucceedingSiblingMissing,
    TargetSucceedingSiblingParentMissing,
    IngoingSourceHierarchyRelationMissing,
    /// A node must have exactly one ingoing relation per subgraph.
    UnexpectedIngoingRelationCount(usize),
    ContentStreamMissing,
}

impl fmt::Display for InconsistencyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNodeMissing => f.write_str("source node missing"),
            Self::SourceParentNodeMissing => f.write_str("parent of source node missing"),
            Self::TargetParentNodeMissing => f.write_str("target parent node missing"),
            Self::TargetSucceedingSiblingMissing => f.write_str("target succeeding sibling missing"),
            Self::TargetSucceedingSiblingParentMissing => {
                f.write_str("parent of target succeeding sibling missing")
            }
            Self::IngoingSourceHierarchyRelationMissing => {
                f.write_str("ingoing hierarchy relation of source node missing")
            }
            Self::UnexpectedIngoingRelationCount(count) => {
                write!(f, "expected exactly one ingoing hierarchy relation, found {count}")
            }
            Self::ContentStreamMissing => f.write_str("content stream missing"),
        }
    }
}

/// Errors raised while projecting events.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The event contradicts the projected graph. Replay must stop.
    #[error("{event} could not be applied: {reason} ({detail})")]
    EventCouldNotBeApplied {
        event: &'static str,
        reason: InconsistencyReason,
        detail: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] GraphError),

    #[error("hook error: {0}")]
    Hook(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ProjectionError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(GraphError::Sqlite(e))
    }
}

impl ProjectionError {
    /// The inconsistency reason, if this is a consistency violation.
    pub fn inconsistency(&self) -> Option<&InconsistencyReason> {
        match self {
            Self::EventCouldNotBeApplied { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the projection crate.
pub type ProjectionResult<T> = std::result::Result<T, ProjectionError>;
