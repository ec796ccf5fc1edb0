use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Surrogate key of a node record. Hierarchy and reference relations point at
/// anchors, never at aggregate ids, so one record can be shared by many edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationAnchorPoint(i64);

impl RelationAnchorPoint {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The virtual parent of every root node.
    pub fn for_root_edge() -> Self {
        Self(0)
    }

    pub fn is_root_edge(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl ToSql for RelationAnchorPoint {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for RelationAnchorPoint {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

impl fmt::Display for RelationAnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RelationAnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationAnchorPoint({})", self.0)
    }
}
