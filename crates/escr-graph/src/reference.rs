use rusqlite::{params, Connection, Row};

use escr_types::{NodeAggregateId, PropertyValues, ReferenceName};

use crate::anchor::RelationAnchorPoint;
use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

/// A named, ordered reference from a node record to another aggregate.
///
/// References hang off anchor points, so every node copy carries its own set.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceRelation {
    pub node_anchor_point: RelationAnchorPoint,
    pub name: ReferenceName,
    pub position: i64,
    pub destination_node_aggregate_id: NodeAggregateId,
    pub properties: Option<PropertyValues>,
}

impl ReferenceRelation {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            node_anchor_point: row.get(0)?,
            name: row::parsed(row, 1)?,
            position: row.get(2)?,
            destination_node_aggregate_id: row::parsed(row, 3)?,
            properties: row::json_opt(row, 4)?,
        })
    }

    pub fn add(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        let properties = self.properties.as_ref().map(row::to_json).transpose()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (nodeanchorpoint, name, position, destinationnodeaggregateid, properties)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                tables.reference_relation()
            ),
            params![
                self.node_anchor_point,
                self.name.as_str(),
                self.position,
                self.destination_node_aggregate_id.as_str(),
                properties,
            ],
        )
        .during("reference insert")?;
        Ok(())
    }

    /// Copy all references of `source` onto `target`.
    pub fn copy_all(
        conn: &Connection,
        tables: &TableNames,
        source: RelationAnchorPoint,
        target: RelationAnchorPoint,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "INSERT INTO {r} (nodeanchorpoint, name, position, destinationnodeaggregateid, properties)
                 SELECT ?2, name, position, destinationnodeaggregateid, properties
                 FROM {r} WHERE nodeanchorpoint = ?1",
                r = tables.reference_relation()
            ),
            params![source, target],
        )
        .during("reference copy")
    }

    /// Remove the references of one name from a node record.
    pub fn remove_named(
        conn: &Connection,
        tables: &TableNames,
        anchor: RelationAnchorPoint,
        name: &ReferenceName,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE nodeanchorpoint = ?1 AND name = ?2",
                tables.reference_relation()
            ),
            params![anchor, name.as_str()],
        )
        .during("reference removal")
    }
}
