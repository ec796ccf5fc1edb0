use escr_types::TypeError;

/// Errors produced by the graph storage layer.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A write statement failed; `operation` names what was being written.
    #[error("{operation} failed: {source}")]
    Statement {
        operation: &'static str,
        source: rusqlite::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored rows contradict an invariant the caller relies on.
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience alias used throughout the graph crate.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Attach the name of the failing write to a rusqlite error.
pub(crate) trait StatementContext<T> {
    fn during(self, operation: &'static str) -> GraphResult<T>;
}

impl<T> StatementContext<T> for rusqlite::Result<T> {
    fn during(self, operation: &'static str) -> GraphResult<T> {
        self.map_err(|source| GraphError::Statement { operation, source })
    }
}
