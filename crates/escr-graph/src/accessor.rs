use std::collections::{BTreeMap, BTreeSet};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use escr_types::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId, NodeTags,
    NodeTypeName, OriginDimensionSpacePoint, WorkspaceName,
};

use crate::anchor::RelationAnchorPoint;
use crate::content_stream::ContentStreamRecord;
use crate::error::GraphResult;
use crate::hierarchy::{HierarchyRelation, HIERARCHY_COLUMNS};
use crate::node::{NodeRecord, NODE_COLUMNS};
use crate::reference::ReferenceRelation;
use crate::restriction::RestrictionRelation;
use crate::row;
use crate::tables::TableNames;
use crate::workspace::WorkspaceRecord;

/// Which side of a hierarchy relation an aggregate filter applies to.
#[derive(Clone, Copy)]
enum Side {
    Child,
    Parent,
}

impl Side {
    fn column(self) -> &'static str {
        match self {
            Side::Child => "h.childnodeanchor",
            Side::Parent => "h.parentnodeanchor",
        }
    }
}

/// Read-side access to the content graph used by the event handlers.
///
/// Every lookup is scoped to one content stream and, where relevant, filtered
/// by dimension space points. It borrows the caller's connection, so inside a
/// transaction it observes the writes made earlier in that transaction.
pub struct ProjectionContentGraph<'a> {
    conn: &'a Connection,
    tables: &'a TableNames,
}

impl<'a> ProjectionContentGraph<'a> {
    pub fn new(conn: &'a Connection, tables: &'a TableNames) -> Self {
        Self { conn, tables }
    }

    pub fn connection(&self) -> &'a Connection {
        self.conn
    }

    pub fn tables(&self) -> &'a TableNames {
        self.tables
    }

    fn select_relations(&self) -> String {
        format!(
            "SELECT {HIERARCHY_COLUMNS} FROM {} h JOIN {} d ON d.hash = h.dimensionspacepointhash",
            self.tables.hierarchy_relation(),
            self.tables.dimension_space_points()
        )
    }

    fn query_nodes(&self, sql: &str, args: Vec<Value>) -> GraphResult<Vec<NodeRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args), NodeRecord::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn query_relations(&self, sql: &str, args: Vec<Value>) -> GraphResult<Vec<HierarchyRelation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args), HierarchyRelation::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn node_join_relation(&self, on: &str) -> String {
        format!(
            "SELECT {NODE_COLUMNS} FROM {} n JOIN {} h ON {on}",
            self.tables.node(),
            self.tables.hierarchy_relation()
        )
    }

    // ---- Node records ----

    /// The node of `aggregate` visible in the given covered point.
    pub fn find_node_in_aggregate(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<Option<NodeRecord>> {
        let sql = format!(
            "{} WHERE n.nodeaggregateid = ? AND h.contentstreamid = ?
                AND h.dimensionspacepointhash = ?",
            self.node_join_relation("h.childnodeanchor = n.relationanchorpoint")
        );
        let args = vec![text(aggregate), text(content_stream_id), text(covered.hash())];
        Ok(self.query_nodes(&sql, args)?.into_iter().next())
    }

    /// The node of `aggregate` originating in `origin`, if it is part of the
    /// content stream.
    pub fn find_node_by_origin(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &OriginDimensionSpacePoint,
    ) -> GraphResult<Option<NodeRecord>> {
        let sql = format!(
            "{} WHERE n.nodeaggregateid = ? AND n.origindimensionspacepointhash = ?
                AND h.contentstreamid = ? LIMIT 1",
            self.node_join_relation("h.childnodeanchor = n.relationanchorpoint")
        );
        let args = vec![text(aggregate), text(origin.hash()), text(content_stream_id)];
        Ok(self.query_nodes(&sql, args)?.into_iter().next())
    }

    /// The parent of `child` as seen from the covered point.
    pub fn find_parent_node(
        &self,
        content_stream_id: &ContentStreamId,
        child: &NodeAggregateId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<Option<NodeRecord>> {
        let sql = format!(
            "{} JOIN {} c ON c.relationanchorpoint = h.childnodeanchor
             WHERE c.nodeaggregateid = ? AND h.contentstreamid = ?
                AND h.dimensionspacepointhash = ?",
            self.node_join_relation("h.parentnodeanchor = n.relationanchorpoint"),
            self.tables.node()
        );
        let args = vec![text(child), text(content_stream_id), text(covered.hash())];
        Ok(self.query_nodes(&sql, args)?.into_iter().next())
    }

    /// The parent of the node `child` originating in `origin`, as seen from
    /// that origin.
    pub fn find_parent_node_of_origin(
        &self,
        content_stream_id: &ContentStreamId,
        child: &NodeAggregateId,
        origin: &OriginDimensionSpacePoint,
    ) -> GraphResult<Option<NodeRecord>> {
        let sql = format!(
            "{} JOIN {} c ON c.relationanchorpoint = h.childnodeanchor
             WHERE c.nodeaggregateid = ? AND c.origindimensionspacepointhash = ?
                AND h.contentstreamid = ? AND h.dimensionspacepointhash = ?",
            self.node_join_relation("h.parentnodeanchor = n.relationanchorpoint"),
            self.tables.node()
        );
        let args = vec![
            text(child),
            text(origin.hash()),
            text(content_stream_id),
            text(origin.hash()),
        ];
        Ok(self.query_nodes(&sql, args)?.into_iter().next())
    }

    pub fn get_node_by_anchor_point(
        &self,
        anchor: RelationAnchorPoint,
    ) -> GraphResult<Option<NodeRecord>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} n WHERE n.relationanchorpoint = ?",
            self.tables.node()
        );
        Ok(self
            .query_nodes(&sql, vec![Value::Integer(anchor.value())])?
            .into_iter()
            .next())
    }

    /// Every distinct record of `aggregate` visible somewhere in the content stream.
    pub fn find_nodes_of_aggregate(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> GraphResult<Vec<NodeRecord>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} n WHERE n.nodeaggregateid = ? AND EXISTS (
                SELECT 1 FROM {} h WHERE h.childnodeanchor = n.relationanchorpoint
                    AND h.contentstreamid = ?)
             ORDER BY n.relationanchorpoint",
            self.tables.node(),
            self.tables.hierarchy_relation()
        );
        self.query_nodes(&sql, vec![text(aggregate), text(content_stream_id)])
    }

    /// Records of any aggregate originating in `origin` and visible in the content stream.
    pub fn find_nodes_with_origin(
        &self,
        content_stream_id: &ContentStreamId,
        origin: &OriginDimensionSpacePoint,
    ) -> GraphResult<Vec<NodeRecord>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} n WHERE n.origindimensionspacepointhash = ? AND EXISTS (
                SELECT 1 FROM {} h WHERE h.childnodeanchor = n.relationanchorpoint
                    AND h.contentstreamid = ?)
             ORDER BY n.relationanchorpoint",
            self.tables.node(),
            self.tables.hierarchy_relation()
        );
        self.query_nodes(&sql, vec![text(origin.hash()), text(content_stream_id)])
    }

    pub fn find_node_type_name(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> GraphResult<Option<NodeTypeName>> {
        Ok(self
            .find_nodes_of_aggregate(content_stream_id, aggregate)?
            .into_iter()
            .next()
            .map(|n| n.node_type_name))
    }

    /// Content streams in which any hierarchy relation points at `anchor`.
    pub fn get_all_content_stream_ids_anchor_point_is_contained_in(
        &self,
        anchor: RelationAnchorPoint,
    ) -> GraphResult<Vec<ContentStreamId>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT contentstreamid FROM {} WHERE childnodeanchor = ?1
             ORDER BY contentstreamid",
            self.tables.hierarchy_relation()
        ))?;
        let rows = stmt.query_map(params![anchor], |row| row::parsed(row, 0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn count_node_records(&self) -> GraphResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.tables.node()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ---- Hierarchy relations ----

    /// The single ingoing relation of `child` in one subgraph.
    pub fn find_ingoing_hierarchy_relation(
        &self,
        child: RelationAnchorPoint,
        content_stream_id: &ContentStreamId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<Option<HierarchyRelation>> {
        let sql = format!(
            "{} WHERE h.childnodeanchor = ? AND h.contentstreamid = ?
                AND h.dimensionspacepointhash = ?",
            self.select_relations()
        );
        let args = vec![
            Value::Integer(child.value()),
            text(content_stream_id),
            text(covered.hash()),
        ];
        Ok(self.query_relations(&sql, args)?.into_iter().next())
    }

    /// Ingoing relations of one node record, keyed by point hash.
    pub fn find_ingoing_hierarchy_relations_for_node(
        &self,
        child: RelationAnchorPoint,
        content_stream_id: &ContentStreamId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<BTreeMap<String, HierarchyRelation>> {
        let relations = self.relations_of_anchor(Side::Child, child, content_stream_id, points)?;
        Ok(key_by_point(relations))
    }

    /// Outgoing relations of one node record, ordered by point and position.
    pub fn find_outgoing_hierarchy_relations_for_node(
        &self,
        parent: RelationAnchorPoint,
        content_stream_id: &ContentStreamId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        self.relations_of_anchor(Side::Parent, parent, content_stream_id, points)
    }

    /// Ingoing relations of any record of `aggregate`, keyed by point hash.
    pub fn find_ingoing_hierarchy_relations_for_node_aggregate(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<BTreeMap<String, HierarchyRelation>> {
        let relations =
            self.relations_of_aggregate(Side::Child, aggregate, content_stream_id, points)?;
        Ok(key_by_point(relations))
    }

    /// Outgoing relations of any record of `aggregate`.
    pub fn find_outgoing_hierarchy_relations_for_node_aggregate(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        self.relations_of_aggregate(Side::Parent, aggregate, content_stream_id, points)
    }

    /// Children of `parent` in one subgraph, in sibling order.
    pub fn find_child_relations(
        &self,
        parent: RelationAnchorPoint,
        content_stream_id: &ContentStreamId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        self.relations_of_anchor(
            Side::Parent,
            parent,
            content_stream_id,
            Some(&DimensionSpacePointSet::single(covered.clone())),
        )
    }

    fn relations_of_anchor(
        &self,
        side: Side,
        anchor: RelationAnchorPoint,
        content_stream_id: &ContentStreamId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        let mut sql = format!(
            "{} WHERE {} = ? AND h.contentstreamid = ?",
            self.select_relations(),
            side.column()
        );
        let mut args = vec![Value::Integer(anchor.value()), text(content_stream_id)];
        if !restrict_to_points(&mut sql, &mut args, points) {
            return Ok(Vec::new());
        }
        sql.push_str(" ORDER BY h.dimensionspacepointhash, h.position");
        self.query_relations(&sql, args)
    }

    fn relations_of_aggregate(
        &self,
        side: Side,
        aggregate: &NodeAggregateId,
        content_stream_id: &ContentStreamId,
        points: Option<&DimensionSpacePointSet>,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        let mut sql = format!(
            "{} JOIN {} n ON n.relationanchorpoint = {}
             WHERE n.nodeaggregateid = ? AND h.contentstreamid = ?",
            self.select_relations(),
            self.tables.node(),
            side.column()
        );
        let mut args = vec![text(aggregate), text(content_stream_id)];
        if !restrict_to_points(&mut sql, &mut args, points) {
            return Ok(Vec::new());
        }
        sql.push_str(" ORDER BY h.dimensionspacepointhash, h.position");
        self.query_relations(&sql, args)
    }

    /// Every relation of a content stream, optionally limited to one point.
    pub fn find_hierarchy_relations_in_content_stream(
        &self,
        content_stream_id: &ContentStreamId,
        covered: Option<&DimensionSpacePoint>,
    ) -> GraphResult<Vec<HierarchyRelation>> {
        let mut sql = format!("{} WHERE h.contentstreamid = ?", self.select_relations());
        let mut args = vec![text(content_stream_id)];
        if let Some(point) = covered {
            sql.push_str(" AND h.dimensionspacepointhash = ?");
            args.push(text(point.hash()));
        }
        sql.push_str(" ORDER BY h.dimensionspacepointhash, h.parentnodeanchor, h.position");
        self.query_relations(&sql, args)
    }

    /// Aggregate ids of all descendants of `aggregate` in one subgraph,
    /// excluding the aggregate itself.
    pub fn find_descendant_node_aggregate_ids(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<BTreeSet<NodeAggregateId>> {
        let node = self.tables.node();
        let hierarchy = self.tables.hierarchy_relation();
        let mut stmt = self.conn.prepare(&format!(
            "WITH RECURSIVE tree (anchor) AS (
                SELECT n.relationanchorpoint FROM {node} n
                JOIN {hierarchy} h ON h.childnodeanchor = n.relationanchorpoint
                WHERE n.nodeaggregateid = ?1 AND h.contentstreamid = ?2
                    AND h.dimensionspacepointhash = ?3
                UNION
                SELECT h.childnodeanchor FROM tree t
                JOIN {hierarchy} h ON h.parentnodeanchor = t.anchor
                WHERE h.contentstreamid = ?2 AND h.dimensionspacepointhash = ?3
             )
             SELECT DISTINCT n.nodeaggregateid FROM tree t
             JOIN {node} n ON n.relationanchorpoint = t.anchor
             WHERE n.nodeaggregateid != ?1"
        ))?;
        let rows = stmt.query_map(
            params![aggregate.as_str(), content_stream_id.as_str(), covered.hash()],
            |row| row::parsed(row, 0),
        )?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Aggregate ids of all parents of `aggregate` across every point.
    pub fn find_parent_node_aggregate_ids(
        &self,
        content_stream_id: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> GraphResult<BTreeSet<NodeAggregateId>> {
        let node = self.tables.node();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT p.nodeaggregateid FROM {node} p
             JOIN {h} h ON h.parentnodeanchor = p.relationanchorpoint
             JOIN {node} c ON c.relationanchorpoint = h.childnodeanchor
             WHERE c.nodeaggregateid = ?1 AND h.contentstreamid = ?2",
            h = self.tables.hierarchy_relation()
        ))?;
        let rows = stmt.query_map(params![aggregate.as_str(), content_stream_id.as_str()], |row| {
            row::parsed(row, 0)
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// The tags a new child of `parent` inherits in one subgraph.
    ///
    /// Children of the root edge inherit nothing.
    pub fn subtree_tags_for_hierarchy_relation(
        &self,
        content_stream_id: &ContentStreamId,
        parent: RelationAnchorPoint,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<NodeTags> {
        if parent.is_root_edge() {
            return Ok(NodeTags::empty());
        }
        Ok(self
            .find_ingoing_hierarchy_relation(parent, content_stream_id, covered)?
            .map(|relation| relation.subtree_tags)
            .unwrap_or_default())
    }

    // ---- References ----

    pub fn find_references(&self, anchor: RelationAnchorPoint) -> GraphResult<Vec<ReferenceRelation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT nodeanchorpoint, name, position, destinationnodeaggregateid, properties
             FROM {} WHERE nodeanchorpoint = ?1 ORDER BY name, position",
            self.tables.reference_relation()
        ))?;
        let rows = stmt.query_map(params![anchor], ReferenceRelation::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ---- Restrictions ----

    pub fn find_restriction_relations(
        &self,
        content_stream_id: &ContentStreamId,
        covered: Option<&DimensionSpacePoint>,
    ) -> GraphResult<Vec<RestrictionRelation>> {
        let mut sql = format!(
            "SELECT contentstreamid, dimensionspacepointhash, originnodeaggregateid,
                affectednodeaggregateid
             FROM {} WHERE contentstreamid = ?",
            self.tables.restriction_relation()
        );
        let mut args = vec![text(content_stream_id)];
        if let Some(point) = covered {
            sql.push_str(" AND dimensionspacepointhash = ?");
            args.push(text(point.hash()));
        }
        sql.push_str(
            " ORDER BY dimensionspacepointhash, originnodeaggregateid, affectednodeaggregateid",
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), RestrictionRelation::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn is_restricted(
        &self,
        content_stream_id: &ContentStreamId,
        covered: &DimensionSpacePoint,
        aggregate: &NodeAggregateId,
    ) -> GraphResult<bool> {
        Ok(self.conn.query_row(
            &format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE contentstreamid = ?1
                    AND dimensionspacepointhash = ?2 AND affectednodeaggregateid = ?3)",
                self.tables.restriction_relation()
            ),
            params![content_stream_id.as_str(), covered.hash(), aggregate.as_str()],
            |row| row.get(0),
        )?)
    }

    // ---- Content streams and workspaces ----

    pub fn find_content_stream(
        &self,
        id: &ContentStreamId,
    ) -> GraphResult<Option<ContentStreamRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT id, version, sourcecontentstreamid, sourcecontentstreamversion, status,
                        removed
                     FROM {} WHERE id = ?1",
                    self.tables.content_stream()
                ),
                params![id.as_str()],
                ContentStreamRecord::from_row,
            )
            .optional()?)
    }

    pub fn find_content_streams(&self) -> GraphResult<Vec<ContentStreamRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, version, sourcecontentstreamid, sourcecontentstreamversion, status, removed
             FROM {} ORDER BY id",
            self.tables.content_stream()
        ))?;
        let rows = stmt.query_map([], ContentStreamRecord::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn find_workspace(&self, name: &WorkspaceName) -> GraphResult<Option<WorkspaceRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT name, baseworkspacename, currentcontentstreamid, status
                     FROM {} WHERE name = ?1",
                    self.tables.workspace()
                ),
                params![name.as_str()],
                WorkspaceRecord::from_row,
            )
            .optional()?)
    }

    pub fn find_workspace_by_content_stream(
        &self,
        content_stream_id: &ContentStreamId,
    ) -> GraphResult<Option<WorkspaceRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT name, baseworkspacename, currentcontentstreamid, status
                     FROM {} WHERE currentcontentstreamid = ?1",
                    self.tables.workspace()
                ),
                params![content_stream_id.as_str()],
                WorkspaceRecord::from_row,
            )
            .optional()?)
    }

    pub fn find_workspaces(&self) -> GraphResult<Vec<WorkspaceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, baseworkspacename, currentcontentstreamid, status FROM {} ORDER BY name",
            self.tables.workspace()
        ))?;
        let rows = stmt.query_map([], WorkspaceRecord::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

fn text(value: impl ToString) -> Value {
    Value::Text(value.to_string())
}

/// Append a point filter. Returns `false` if the filter can match nothing.
fn restrict_to_points(
    sql: &mut String,
    args: &mut Vec<Value>,
    points: Option<&DimensionSpacePointSet>,
) -> bool {
    let Some(points) = points else {
        return true;
    };
    if points.is_empty() {
        return false;
    }
    sql.push_str(&format!(
        " AND h.dimensionspacepointhash IN ({})",
        row::placeholders(points.len())
    ));
    args.extend(points.hashes().map(text));
    true
}

fn key_by_point(relations: Vec<HierarchyRelation>) -> BTreeMap<String, HierarchyRelation> {
    relations
        .into_iter()
        .map(|r| (r.dimension_space_point_hash().to_string(), r))
        .collect()
}
