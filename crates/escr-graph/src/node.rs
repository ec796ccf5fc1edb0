use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use escr_types::{
    NodeAggregateClassification, NodeAggregateId, NodeName, NodeTypeName,
    OriginDimensionSpacePoint, PropertyValues,
};

use crate::anchor::RelationAnchorPoint;
use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

/// Columns selected for a node record, aliased as `n`.
pub(crate) const NODE_COLUMNS: &str = "n.relationanchorpoint, n.nodeaggregateid, \
     n.origindimensionspacepoint, n.nodetypename, n.classification, n.name, \
     n.properties, n.created, n.lastmodified";

/// One materialized node. Hierarchy edges reference it by anchor point, so a
/// single record can be visible in many dimension space points and content
/// streams at once.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub relation_anchor_point: RelationAnchorPoint,
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub node_type_name: NodeTypeName,
    pub classification: NodeAggregateClassification,
    pub node_name: Option<NodeName>,
    pub properties: PropertyValues,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

/// The attributes of a record that does not have an anchor point yet.
#[derive(Clone, Debug)]
pub struct NewNodeRecord {
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub node_type_name: NodeTypeName,
    pub classification: NodeAggregateClassification,
    pub node_name: Option<NodeName>,
    pub properties: PropertyValues,
    pub created_at: DateTime<Utc>,
}

impl NodeRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            relation_anchor_point: row.get(0)?,
            node_aggregate_id: row::parsed(row, 1)?,
            origin_dimension_space_point: row::point(row, 2)?,
            node_type_name: row::parsed(row, 3)?,
            classification: row::parsed(row, 4)?,
            node_name: row::parsed_opt(row, 5)?,
            properties: row::json(row, 6)?,
            created_at: row::timestamp(row, 7)?,
            last_modified_at: row::timestamp_opt(row, 8)?,
        })
    }

    /// Insert a new record and return it with its freshly assigned anchor point.
    pub fn create(conn: &Connection, tables: &TableNames, new: NewNodeRecord) -> GraphResult<Self> {
        let properties = row::to_json(&new.properties)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (nodeaggregateid, origindimensionspacepoint,
                    origindimensionspacepointhash, nodetypename, classification, name,
                    properties, created, lastmodified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                tables.node()
            ),
            params![
                new.node_aggregate_id.as_str(),
                new.origin_dimension_space_point.to_json(),
                new.origin_dimension_space_point.hash(),
                new.node_type_name.as_str(),
                new.classification.as_str(),
                new.node_name.as_ref().map(|n| n.as_str()),
                properties,
                new.created_at.to_rfc3339(),
            ],
        )
        .during("node insert")?;

        Ok(Self {
            relation_anchor_point: RelationAnchorPoint::new(conn.last_insert_rowid()),
            node_aggregate_id: new.node_aggregate_id,
            origin_dimension_space_point: new.origin_dimension_space_point,
            node_type_name: new.node_type_name,
            classification: new.classification,
            node_name: new.node_name,
            properties: new.properties,
            created_at: new.created_at,
            last_modified_at: None,
        })
    }

    /// Copy this record to a new anchor point, optionally at another origin.
    pub fn copy(
        &self,
        conn: &Connection,
        tables: &TableNames,
        origin: Option<&OriginDimensionSpacePoint>,
        created_at: DateTime<Utc>,
    ) -> GraphResult<Self> {
        Self::create(
            conn,
            tables,
            NewNodeRecord {
                node_aggregate_id: self.node_aggregate_id.clone(),
                origin_dimension_space_point: origin
                    .cloned()
                    .unwrap_or_else(|| self.origin_dimension_space_point.clone()),
                node_type_name: self.node_type_name.clone(),
                classification: self.classification,
                node_name: self.node_name.clone(),
                properties: self.properties.clone(),
                created_at,
            },
        )
    }

    /// Persist every mutable attribute of this record.
    pub fn update(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        let properties = row::to_json(&self.properties)?;
        conn.execute(
            &format!(
                "UPDATE {} SET origindimensionspacepoint = ?1, origindimensionspacepointhash = ?2,
                    nodetypename = ?3, name = ?4, properties = ?5, lastmodified = ?6
                 WHERE relationanchorpoint = ?7",
                tables.node()
            ),
            params![
                self.origin_dimension_space_point.to_json(),
                self.origin_dimension_space_point.hash(),
                self.node_type_name.as_str(),
                self.node_name.as_ref().map(|n| n.as_str()),
                properties,
                self.last_modified_at.map(|t| t.to_rfc3339()),
                self.relation_anchor_point,
            ],
        )
        .during("node update")?;
        Ok(())
    }

    /// Delete the record at `anchor` together with its outgoing references, but
    /// only if no hierarchy relation in any content stream still points at it.
    /// Returns whether the record was deleted.
    pub fn remove_if_unreferenced(
        conn: &Connection,
        tables: &TableNames,
        anchor: RelationAnchorPoint,
    ) -> GraphResult<bool> {
        let still_referenced: bool = conn.query_row(
            &format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE childnodeanchor = ?1)",
                tables.hierarchy_relation()
            ),
            params![anchor],
            |row| row.get(0),
        )?;
        if still_referenced {
            return Ok(false);
        }
        conn.execute(
            &format!("DELETE FROM {} WHERE nodeanchorpoint = ?1", tables.reference_relation()),
            params![anchor],
        )
        .during("reference removal")?;
        conn.execute(
            &format!("DELETE FROM {} WHERE relationanchorpoint = ?1", tables.node()),
            params![anchor],
        )
        .during("node removal")?;
        Ok(true)
    }

    /// Delete every record no hierarchy relation points at any more, with its
    /// references. Returns the number of deleted records.
    pub fn remove_all_unreferenced(conn: &Connection, tables: &TableNames) -> GraphResult<usize> {
        let node = tables.node();
        let hierarchy = tables.hierarchy_relation();
        let reference = tables.reference_relation();
        conn.execute(
            &format!(
                "DELETE FROM {reference} WHERE nodeanchorpoint IN (
                    SELECT n.relationanchorpoint FROM {node} n
                    WHERE NOT EXISTS (
                        SELECT 1 FROM {hierarchy} h WHERE h.childnodeanchor = n.relationanchorpoint
                    )
                 )"
            ),
            [],
        )
        .during("orphaned reference removal")?;
        let removed = conn
            .execute(
                &format!(
                    "DELETE FROM {node} WHERE NOT EXISTS (
                        SELECT 1 FROM {hierarchy} h WHERE h.childnodeanchor = {node}.relationanchorpoint
                     )"
                ),
                [],
            )
            .during("orphaned node removal")?;
        Ok(removed)
    }
}
