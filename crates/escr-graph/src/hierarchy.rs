use rusqlite::{params, Connection, Row};
use tracing::debug;

use escr_types::{ContentStreamId, DimensionSpacePoint, NodeTags};

use crate::anchor::RelationAnchorPoint;
use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

/// Columns selected for a hierarchy relation (`h`) joined with its point (`d`).
pub(crate) const HIERARCHY_COLUMNS: &str = "h.parentnodeanchor, h.childnodeanchor, \
     h.contentstreamid, d.dimensionspacepoint, h.position, h.subtreetags";

/// Parent-to-child edge of one subgraph, i.e. one content stream and one
/// dimension space point. Each child has at most one ingoing edge per subgraph.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyRelation {
    pub parent_node_anchor: RelationAnchorPoint,
    pub child_node_anchor: RelationAnchorPoint,
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point: DimensionSpacePoint,
    pub position: i64,
    pub subtree_tags: NodeTags,
}

impl HierarchyRelation {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            parent_node_anchor: row.get(0)?,
            child_node_anchor: row.get(1)?,
            content_stream_id: row::parsed(row, 2)?,
            dimension_space_point: row::point(row, 3)?,
            position: row.get(4)?,
            subtree_tags: row::json(row, 5)?,
        })
    }

    pub fn dimension_space_point_hash(&self) -> &str {
        self.dimension_space_point.hash()
    }

    pub fn add(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        register_dimension_space_point(conn, tables, &self.dimension_space_point)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (parentnodeanchor, childnodeanchor, contentstreamid,
                    dimensionspacepointhash, position, subtreetags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                tables.hierarchy_relation()
            ),
            params![
                self.parent_node_anchor,
                self.child_node_anchor,
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash(),
                self.position,
                self.subtree_tags.to_json(),
            ],
        )
        .during("hierarchy relation insert")?;
        debug!(
            parent = %self.parent_node_anchor,
            child = %self.child_node_anchor,
            dsp = self.dimension_space_point_hash(),
            position = self.position,
            "hierarchy relation added"
        );
        Ok(())
    }

    pub fn remove(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE childnodeanchor = ?1 AND contentstreamid = ?2
                    AND dimensionspacepointhash = ?3",
                tables.hierarchy_relation()
            ),
            self.key_params(),
        )
        .during("hierarchy relation removal")?;
        Ok(())
    }

    pub fn assign_new_position(
        &mut self,
        conn: &Connection,
        tables: &TableNames,
        position: i64,
    ) -> GraphResult<()> {
        conn.execute(
            &format!(
                "UPDATE {} SET position = ?4 WHERE childnodeanchor = ?1 AND contentstreamid = ?2
                    AND dimensionspacepointhash = ?3",
                tables.hierarchy_relation()
            ),
            params![
                self.child_node_anchor,
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash(),
                position
            ],
        )
        .during("hierarchy relation repositioning")?;
        self.position = position;
        Ok(())
    }

    /// Re-parent this edge, optionally repositioning it in the same statement.
    pub fn assign_new_parent_node(
        &mut self,
        conn: &Connection,
        tables: &TableNames,
        parent: RelationAnchorPoint,
        position: Option<i64>,
    ) -> GraphResult<()> {
        let position = position.unwrap_or(self.position);
        conn.execute(
            &format!(
                "UPDATE {} SET parentnodeanchor = ?4, position = ?5 WHERE childnodeanchor = ?1
                    AND contentstreamid = ?2 AND dimensionspacepointhash = ?3",
                tables.hierarchy_relation()
            ),
            params![
                self.child_node_anchor,
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash(),
                parent,
                position
            ],
        )
        .during("hierarchy relation re-parenting")?;
        self.parent_node_anchor = parent;
        self.position = position;
        Ok(())
    }

    /// Point this edge at another node record, keeping parent and position.
    pub fn assign_new_child_node(
        &mut self,
        conn: &Connection,
        tables: &TableNames,
        child: RelationAnchorPoint,
    ) -> GraphResult<()> {
        conn.execute(
            &format!(
                "UPDATE {} SET childnodeanchor = ?4 WHERE childnodeanchor = ?1
                    AND contentstreamid = ?2 AND dimensionspacepointhash = ?3",
                tables.hierarchy_relation()
            ),
            params![
                self.child_node_anchor,
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash(),
                child
            ],
        )
        .during("hierarchy relation child reassignment")?;
        self.child_node_anchor = child;
        Ok(())
    }

    pub fn assign_subtree_tags(
        &mut self,
        conn: &Connection,
        tables: &TableNames,
        tags: NodeTags,
    ) -> GraphResult<()> {
        conn.execute(
            &format!(
                "UPDATE {} SET subtreetags = ?4 WHERE childnodeanchor = ?1
                    AND contentstreamid = ?2 AND dimensionspacepointhash = ?3",
                tables.hierarchy_relation()
            ),
            params![
                self.child_node_anchor,
                self.content_stream_id.as_str(),
                self.dimension_space_point_hash(),
                tags.to_json()
            ],
        )
        .during("subtree tag update")?;
        self.subtree_tags = tags;
        Ok(())
    }

    fn key_params(&self) -> (RelationAnchorPoint, &str, &str) {
        (
            self.child_node_anchor,
            self.content_stream_id.as_str(),
            self.dimension_space_point_hash(),
        )
    }
}

/// Remember the JSON form of a point so relations can be read back with it.
pub fn register_dimension_space_point(
    conn: &Connection,
    tables: &TableNames,
    point: &DimensionSpacePoint,
) -> GraphResult<()> {
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (hash, dimensionspacepoint) VALUES (?1, ?2)",
            tables.dimension_space_points()
        ),
        params![point.hash(), point.to_json()],
    )
    .during("dimension space point registration")?;
    Ok(())
}

/// Bulk operations over all edges of a content stream or subgraph.
pub struct HierarchyRelations;

impl HierarchyRelations {
    /// Copy every edge of `source` into `target` (content stream fork).
    pub fn copy_content_stream(
        conn: &Connection,
        tables: &TableNames,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "INSERT INTO {h} (parentnodeanchor, childnodeanchor, contentstreamid,
                    dimensionspacepointhash, position, subtreetags)
                 SELECT parentnodeanchor, childnodeanchor, ?2, dimensionspacepointhash,
                    position, subtreetags
                 FROM {h} WHERE contentstreamid = ?1",
                h = tables.hierarchy_relation()
            ),
            params![source.as_str(), target.as_str()],
        )
        .during("content stream hierarchy copy")
    }

    pub fn remove_content_stream(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE contentstreamid = ?1",
                tables.hierarchy_relation()
            ),
            params![content_stream_id.as_str()],
        )
        .during("content stream hierarchy removal")
    }

    /// Copy every edge of `source` in one content stream to `target` (shine-through).
    pub fn copy_dimension_space_point(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        source: &DimensionSpacePoint,
        target: &DimensionSpacePoint,
    ) -> GraphResult<usize> {
        register_dimension_space_point(conn, tables, target)?;
        conn.execute(
            &format!(
                "INSERT INTO {h} (parentnodeanchor, childnodeanchor, contentstreamid,
                    dimensionspacepointhash, position, subtreetags)
                 SELECT parentnodeanchor, childnodeanchor, contentstreamid, ?3,
                    position, subtreetags
                 FROM {h} WHERE contentstreamid = ?1 AND dimensionspacepointhash = ?2",
                h = tables.hierarchy_relation()
            ),
            params![content_stream_id.as_str(), source.hash(), target.hash()],
        )
        .during("dimension space point hierarchy copy")
    }

    /// Rehash every edge of `source` in one content stream to `target`.
    pub fn move_dimension_space_point(
        conn: &Connection,
        tables: &TableNames,
        content_stream_id: &ContentStreamId,
        source: &DimensionSpacePoint,
        target: &DimensionSpacePoint,
    ) -> GraphResult<usize> {
        register_dimension_space_point(conn, tables, target)?;
        conn.execute(
            &format!(
                "UPDATE {} SET dimensionspacepointhash = ?3
                 WHERE contentstreamid = ?1 AND dimensionspacepointhash = ?2",
                tables.hierarchy_relation()
            ),
            params![content_stream_id.as_str(), source.hash(), target.hash()],
        )
        .during("dimension space point hierarchy move")
    }
}
