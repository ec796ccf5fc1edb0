use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(TypeError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Lifecycle state of a content stream.
    ContentStreamStatus, "content stream status" {
        Created => "CREATED",
        InUseByWorkspace => "IN_USE_BY_WORKSPACE",
        Rebasing => "REBASING",
        RebaseError => "REBASE_ERROR",
        NoLongerInUse => "NO_LONGER_IN_USE",
        Forked => "FORKED",
        Closed => "CLOSED",
    }
);

string_enum!(
    /// Publish/rebase state of a workspace relative to its base.
    WorkspaceStatus, "workspace status" {
        UpToDate => "UP_TO_DATE",
        Outdated => "OUTDATED",
        OutdatedConflict => "OUTDATED_CONFLICT",
    }
);

string_enum!(
    NodeAggregateClassification, "node aggregate classification" {
        Regular => "regular",
        Root => "root",
        Tethered => "tethered",
    }
);

impl Default for NodeAggregateClassification {
    fn default() -> Self {
        Self::Regular
    }
}
