use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A label attached to a node and all of its descendants, e.g. `disabled`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubtreeTag(String);

impl SubtreeTag {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= 36
            && value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"_.-".contains(&b));
        if !valid {
            return Err(TypeError::InvalidIdentifier {
                kind: "subtree tag",
                value,
                reason: "must match [a-z0-9_.-]{1,36}",
            });
        }
        Ok(Self(value))
    }

    /// The reserved tag that hides a subtree and drives the restriction index.
    pub fn disabled() -> Self {
        Self("disabled".to_string())
    }

    pub fn is_disabled(&self) -> bool {
        self.0 == "disabled"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubtreeTag {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubtreeTag> for String {
    fn from(tag: SubtreeTag) -> Self {
        tag.0
    }
}

impl fmt::Display for SubtreeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SubtreeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubtreeTag({})", self.0)
    }
}

/// A plain set of subtree tags.
pub type SubtreeTags = BTreeSet<SubtreeTag>;

/// Tags carried by a hierarchy relation.
///
/// Explicit tags were set on this very node (stored as `true`); inherited tags
/// come from an ancestor (stored as `null`). A tag is never both.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Option<bool>>",
    into = "BTreeMap<String, Option<bool>>"
)]
pub struct NodeTags {
    explicit: SubtreeTags,
    inherited: SubtreeTags,
}

impl NodeTags {
    pub fn create(explicit: SubtreeTags, inherited: SubtreeTags) -> Self {
        let inherited = inherited.difference(&explicit).cloned().collect();
        Self { explicit, inherited }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &SubtreeTag) -> bool {
        self.explicit.contains(tag) || self.inherited.contains(tag)
    }

    pub fn is_explicit(&self, tag: &SubtreeTag) -> bool {
        self.explicit.contains(tag)
    }

    pub fn is_inherited(&self, tag: &SubtreeTag) -> bool {
        self.inherited.contains(tag)
    }

    pub fn explicit(&self) -> &SubtreeTags {
        &self.explicit
    }

    pub fn inherited(&self) -> &SubtreeTags {
        &self.inherited
    }

    pub fn with_explicit(&self, tag: SubtreeTag) -> Self {
        let mut tags = self.clone();
        tags.inherited.remove(&tag);
        tags.explicit.insert(tag);
        tags
    }

    pub fn with_inherited(&self, tag: SubtreeTag) -> Self {
        let mut tags = self.clone();
        if !tags.explicit.contains(&tag) {
            tags.inherited.insert(tag);
        }
        tags
    }

    pub fn without(&self, tag: &SubtreeTag) -> Self {
        let mut tags = self.clone();
        tags.explicit.remove(tag);
        tags.inherited.remove(tag);
        tags
    }

    /// Keep only the tags set on this node.
    pub fn without_inherited(&self) -> Self {
        Self {
            explicit: self.explicit.clone(),
            inherited: SubtreeTags::new(),
        }
    }

    /// All tags, demoted to inherited. This is what a child receives.
    pub fn only_inherited(&self) -> Self {
        Self {
            explicit: SubtreeTags::new(),
            inherited: self.all(),
        }
    }

    /// Explicit tags of `self` plus every tag of `parent` as inherited.
    pub fn beneath(&self, parent: &NodeTags) -> Self {
        Self::create(self.explicit.clone(), parent.all())
    }

    pub fn all(&self) -> SubtreeTags {
        self.explicit.union(&self.inherited).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.inherited.is_empty()
    }

    pub fn to_json(&self) -> String {
        let map: BTreeMap<String, Option<bool>> = self.clone().into();
        serde_json::to_string(&map).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

impl TryFrom<BTreeMap<String, Option<bool>>> for NodeTags {
    type Error = TypeError;

    fn try_from(map: BTreeMap<String, Option<bool>>) -> Result<Self, Self::Error> {
        let mut tags = NodeTags::default();
        for (name, flag) in map {
            let tag = SubtreeTag::new(name)?;
            match flag {
                Some(true) => {
                    tags.explicit.insert(tag);
                }
                None => {
                    tags.inherited.insert(tag);
                }
                Some(false) => {
                    return Err(TypeError::Serialization(format!(
                        "subtree tag \"{tag}\" must be true or null"
                    )))
                }
            }
        }
        Ok(tags)
    }
}

impl From<NodeTags> for BTreeMap<String, Option<bool>> {
    fn from(tags: NodeTags) -> Self {
        let mut map = BTreeMap::new();
        for tag in tags.inherited {
            map.insert(tag.0, None);
        }
        for tag in tags.explicit {
            map.insert(tag.0, Some(true));
        }
        map
    }
}

impl fmt::Debug for NodeTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeTags({})", self.to_json())
    }
}
