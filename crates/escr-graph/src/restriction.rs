use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::debug;

use escr_types::{ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId};

use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

/// "`origin` disables `affected`" within one subgraph.
///
/// `affected` is `origin` itself or one of its descendants. The table is a
/// derived index over hierarchy relations carrying the `disabled` tag.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RestrictionRelation {
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point_hash: String,
    pub origin_node_aggregate_id: NodeAggregateId,
    pub affected_node_aggregate_id: NodeAggregateId,
}

impl RestrictionRelation {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            content_stream_id: row::parsed(row, 0)?,
            dimension_space_point_hash: row.get(1)?,
            origin_node_aggregate_id: row::parsed(row, 2)?,
            affected_node_aggregate_id: row::parsed(row, 3)?,
        })
    }

    /// Insert unless an identical row exists.
    pub fn add(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (contentstreamid, dimensionspacepointhash,
                    originnodeaggregateid, affectednodeaggregateid)
                 VALUES (?1, ?2, ?3, ?4)",
                tables.restriction_relation()
            ),
            params![
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash,
                self.origin_node_aggregate_id.as_str(),
                self.affected_node_aggregate_id.as_str(),
            ],
        )
        .during("restriction relation insert")?;
        Ok(())
    }
}

/// Bulk maintenance of the restriction index.
pub struct RestrictionRelations;

impl RestrictionRelations {
    /// Restrict `origin` and all of its descendants by `origin`, in every
    /// given point. Existing rows are left alone, so re-applying is a no-op.
    pub fn add_subtree(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        origin: &NodeAggregateId,
        points: &DimensionSpacePointSet,
    ) -> GraphResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let node = tables.node();
        let hierarchy = tables.hierarchy_relation();
        let restriction = tables.restriction_relation();
        let in_points = row::placeholders(points.len());
        let sql = format!(
            "WITH RECURSIVE tree (relationanchorpoint, nodeaggregateid, dimensionspacepointhash) AS (
                SELECT n.relationanchorpoint, n.nodeaggregateid, h.dimensionspacepointhash
                FROM {node} n
                JOIN {hierarchy} h ON h.childnodeanchor = n.relationanchorpoint
                WHERE n.nodeaggregateid = ? AND h.contentstreamid = ?
                  AND h.dimensionspacepointhash IN ({in_points})
                UNION
                SELECT c.relationanchorpoint, c.nodeaggregateid, h.dimensionspacepointhash
                FROM tree p
                JOIN {hierarchy} h ON h.parentnodeanchor = p.relationanchorpoint
                    AND h.dimensionspacepointhash = p.dimensionspacepointhash
                JOIN {node} c ON c.relationanchorpoint = h.childnodeanchor
                WHERE h.contentstreamid = ?
             )
             INSERT OR IGNORE INTO {restriction} (contentstreamid, dimensionspacepointhash,
                originnodeaggregateid, affectednodeaggregateid)
             SELECT ?, dimensionspacepointhash, ?, nodeaggregateid FROM tree"
        );
        let mut args: Vec<Value> = vec![
            Value::Text(origin.to_string()),
            Value::Text(content_stream_id.to_string()),
        ];
        args.extend(points.hashes().map(|h| Value::Text(h.to_string())));
        args.push(Value::Text(content_stream_id.to_string()));
        args.push(Value::Text(content_stream_id.to_string()));
        args.push(Value::Text(origin.to_string()));

        let inserted = conn
            .execute(&sql, params_from_iter(args))
            .during("restriction subtree insert")?;
        debug!(origin = %origin, inserted, "restriction relations added");
        Ok(inserted)
    }

    /// Remove every row originating at `origin` in the given points.
    pub fn remove_by_origin(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        origin: &NodeAggregateId,
        points: &DimensionSpacePointSet,
    ) -> GraphResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {} WHERE contentstreamid = ? AND originnodeaggregateid = ?
                AND dimensionspacepointhash IN ({})",
            tables.restriction_relation(),
            row::placeholders(points.len())
        );
        let mut args = vec![
            Value::Text(content_stream_id.to_string()),
            Value::Text(origin.to_string()),
        ];
        args.extend(points.hashes().map(|h| Value::Text(h.to_string())));
        let removed = conn
            .execute(&sql, params_from_iter(args))
            .during("restriction removal by origin")?;
        debug!(origin = %origin, removed, "restriction relations removed");
        Ok(removed)
    }

    /// Remove every row in which any of `aggregates` is origin or affected,
    /// within one point.
    pub fn remove_involving(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        dimension_space_point_hash: &str,
        aggregates: &[NodeAggregateId],
    ) -> GraphResult<usize> {
        if aggregates.is_empty() {
            return Ok(0);
        }
        let in_aggregates = row::placeholders(aggregates.len());
        let sql = format!(
            "DELETE FROM {} WHERE contentstreamid = ? AND dimensionspacepointhash = ?
                AND (originnodeaggregateid IN ({in_aggregates})
                     OR affectednodeaggregateid IN ({in_aggregates}))",
            tables.restriction_relation()
        );
        let mut args = vec![
            Value::Text(content_stream_id.to_string()),
            Value::Text(dimension_space_point_hash.to_string()),
        ];
        for _ in 0..2 {
            args.extend(aggregates.iter().map(|a| Value::Text(a.to_string())));
        }
        conn.execute(&sql, params_from_iter(args))
            .during("restriction removal")
    }

    /// Remove the rows restricting `affected` within one point.
    pub fn remove_affected(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        dimension_space_point_hash: &str,
        affected: &NodeAggregateId,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE contentstreamid = ?1 AND dimensionspacepointhash = ?2
                    AND affectednodeaggregateid = ?3",
                tables.restriction_relation()
            ),
            params![content_stream_id.as_str(), dimension_space_point_hash, affected.as_str()],
        )
        .during("restriction removal by affected")
    }

    pub fn copy_content_stream(
        conn: &Connection,
        tables: &TableNames,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {r} (contentstreamid, dimensionspacepointhash,
                    originnodeaggregateid, affectednodeaggregateid)
                 SELECT ?2, dimensionspacepointhash, originnodeaggregateid, affectednodeaggregateid
                 FROM {r} WHERE contentstreamid = ?1",
                r = tables.restriction_relation()
            ),
            params![source.as_str(), target.as_str()],
        )
        .during("content stream restriction copy")
    }

    pub fn remove_content_stream(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE contentstreamid = ?1",
                tables.restriction_relation()
            ),
            params![content_stream_id.as_str()],
        )
        .during("content stream restriction removal")
    }

    pub fn copy_dimension_space_point(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        source: &DimensionSpacePoint,
        target: &DimensionSpacePoint,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {r} (contentstreamid, dimensionspacepointhash,
                    originnodeaggregateid, affectednodeaggregateid)
                 SELECT contentstreamid, ?3, originnodeaggregateid, affectednodeaggregateid
                 FROM {r} WHERE contentstreamid = ?1 AND dimensionspacepointhash = ?2",
                r = tables.restriction_relation()
            ),
            params![content_stream_id.as_str(), source.hash(), target.hash()],
        )
        .during("dimension space point restriction copy")
    }

    pub fn move_dimension_space_point(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        source: &DimensionSpacePoint,
        target: &DimensionSpacePoint,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "UPDATE OR IGNORE {} SET dimensionspacepointhash = ?3
                 WHERE contentstreamid = ?1 AND dimensionspacepointhash = ?2",
                tables.restriction_relation()
            ),
            params![content_stream_id.as_str(), source.hash(), target.hash()],
        )
        .during("dimension space point restriction move")
    }
}
