use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest identifier accepted for aggregates, content streams, and workspaces.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

fn validate_slug(kind: &'static str, value: &str) -> Result<(), TypeError> {
    let invalid = |reason| TypeError::InvalidIdentifier {
        kind,
        value: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(invalid("must be at most 64 characters"));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("may only contain [a-z0-9-]"));
    }
    Ok(())
}

fn validate_name(kind: &'static str, value: &str) -> Result<(), TypeError> {
    if value.trim().is_empty() {
        return Err(TypeError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason: "must not be blank",
        });
    }
    Ok(())
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $validate:path) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Construct after validating the raw value.
            pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                $validate($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

string_identifier!(
    /// Identifier of a content stream, the unit a workspace's changes live in.
    ContentStreamId,
    "content stream id",
    validate_slug
);

string_identifier!(
    /// Stable identity of a node across all of its dimension variants.
    NodeAggregateId,
    "node aggregate id",
    validate_slug
);

string_identifier!(
    /// Stable name of a workspace.
    WorkspaceName,
    "workspace name",
    validate_slug
);

string_identifier!(NodeTypeName, "node type name", validate_name);
string_identifier!(NodeName, "node name", validate_name);
string_identifier!(ReferenceName, "reference name", validate_name);

impl ContentStreamId {
    /// Mint a fresh, time-ordered content stream id (UUID v7).
    pub fn create() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl NodeAggregateId {
    /// Mint a fresh, time-ordered node aggregate id (UUID v7).
    pub fn create() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl WorkspaceName {
    /// The conventional name of the root (live) workspace.
    pub fn live() -> Self {
        Self("live".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_accepts_slugs() {
        let id = NodeAggregateId::new("sir-david-nodenborough").unwrap();
        assert_eq!(id.as_str(), "sir-david-nodenborough");
        assert_eq!(id.to_string(), "sir-david-nodenborough");
    }

    #[test]
    fn aggregate_id_rejects_invalid_input() {
        assert!(NodeAggregateId::new("").is_err());
        assert!(NodeAggregateId::new("Upper").is_err());
        assert!(NodeAggregateId::new("a".repeat(65)).is_err());
        assert!(NodeAggregateId::new("with space").is_err());
    }

    #[test]
    fn created_ids_are_valid_and_unique() {
        let a = ContentStreamId::create();
        let b = ContentStreamId::create();
        assert_ne!(a, b);
        assert!(ContentStreamId::new(a.as_str()).is_ok());
        assert!(NodeAggregateId::new(NodeAggregateId::create().as_str()).is_ok());
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let id = ContentStreamId::new("cs-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cs-1\"");
        let back: ContentStreamId = serde_json::from_str("\"cs-1\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ContentStreamId>("\"CS 1\"").is_err());
    }

    #[test]
    fn names_only_reject_blank() {
        assert!(NodeTypeName::new("Neos.Neos:Document").is_ok());
        assert!(NodeName::new("  ").is_err());
        assert!(ReferenceName::new("related").is_ok());
    }

    #[test]
    fn debug_shows_kind() {
        let id = WorkspaceName::live();
        assert_eq!(format!("{id:?}"), "WorkspaceName(live)");
    }
}
