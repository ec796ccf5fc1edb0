use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} \"{value}\": {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unknown {kind} \"{value}\"")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
