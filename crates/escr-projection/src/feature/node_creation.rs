use tracing::debug;

use escr_events::{
    NodeAggregateWithNodeWasCreated, RootNodeAggregateDimensionsWereUpdated,
    RootNodeAggregateWithNodeWasCreated,
};
use escr_graph::{relation_position, HierarchyRelation, NewNodeRecord, NodeRecord, RelationAnchorPoint};
use escr_types::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeTags, PropertyValues,
};

use crate::context::EventContext;
use crate::error::{InconsistencyReason, ProjectionResult};
use crate::feature::restriction;

pub(crate) fn root_created(
    ctx: &EventContext<'_>,
    e: &RootNodeAggregateWithNodeWasCreated,
) -> ProjectionResult<()> {
    let node = NodeRecord::create(
        ctx.conn,
        ctx.tables,
        NewNodeRecord {
            node_aggregate_id: e.node_aggregate_id.clone(),
            origin_dimension_space_point: DimensionSpacePoint::empty(),
            node_type_name: e.node_type_name.clone(),
            classification: e.node_aggregate_classification,
            node_name: None,
            properties: PropertyValues::new(),
            created_at: ctx.recorded_at,
        },
    )?;
    connect_to_root_edge(
        ctx,
        &e.content_stream_id,
        node.relation_anchor_point,
        &e.covered_dimension_space_points,
    )?;
    debug!(aggregate = %e.node_aggregate_id, anchor = %node.relation_anchor_point, "root node created");
    Ok(())
}

/// Replace the root edges of a root node with edges for the new coverage.
pub(crate) fn root_dimensions_updated(
    ctx: &EventContext<'_>,
    e: &RootNodeAggregateDimensionsWereUpdated,
) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let node = graph
        .find_nodes_of_aggregate(&e.content_stream_id, &e.node_aggregate_id)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ctx.inconsistent(
                InconsistencyReason::SourceNodeMissing,
                format!("root node aggregate {}", e.node_aggregate_id),
            )
        })?;
    let edges = graph.find_ingoing_hierarchy_relations_for_node(
        node.relation_anchor_point,
        &e.content_stream_id,
        None,
    )?;
    for edge in edges.values().filter(|r| r.parent_node_anchor.is_root_edge()) {
        edge.remove(ctx.conn, ctx.tables)?;
    }
    connect_to_root_edge(
        ctx,
        &e.content_stream_id,
        node.relation_anchor_point,
        &e.covered_dimension_space_points,
    )
}

fn connect_to_root_edge(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    child: RelationAnchorPoint,
    points: &DimensionSpacePointSet,
) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let root_edge = RelationAnchorPoint::for_root_edge();
    for point in points {
        let position = relation_position(&graph, Some(root_edge), None, None, content_stream_id, point)?;
        HierarchyRelation {
            parent_node_anchor: root_edge,
            child_node_anchor: child,
            content_stream_id: content_stream_id.clone(),
            dimension_space_point: point.clone(),
            position,
            subtree_tags: NodeTags::empty(),
        }
        .add(ctx.conn, ctx.tables)?;
    }
    Ok(())
}

/// Insert the node record and connect it below its parent in every point of
/// the sibling coverage. New relations inherit all tags of the parent.
pub(crate) fn created(
    ctx: &EventContext<'_>,
    e: &NodeAggregateWithNodeWasCreated,
) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let node = NodeRecord::create(
        ctx.conn,
        ctx.tables,
        NewNodeRecord {
            node_aggregate_id: e.node_aggregate_id.clone(),
            origin_dimension_space_point: e.origin_dimension_space_point.clone(),
            node_type_name: e.node_type_name.clone(),
            classification: e.node_aggregate_classification,
            node_name: e.node_name.clone(),
            properties: e.initial_property_values.clone(),
            created_at: ctx.recorded_at,
        },
    )?;

    for sibling in e.succeeding_siblings_for_coverage.iter() {
        let point = &sibling.dimension_space_point;
        let parent = graph
            .find_node_in_aggregate(&e.content_stream_id, &e.parent_node_aggregate_id, point)?
            .ok_or_else(|| {
                ctx.inconsistent(
                    InconsistencyReason::TargetParentNodeMissing,
                    format!("parent {} in {point}", e.parent_node_aggregate_id),
                )
            })?;
        // An unknown succeeding sibling degrades to appending.
        let succeeding = match &sibling.node_aggregate_id {
            Some(id) => graph.find_node_in_aggregate(&e.content_stream_id, id, point)?,
            None => None,
        };
        let position = relation_position(
            &graph,
            Some(parent.relation_anchor_point),
            None,
            succeeding.map(|s| s.relation_anchor_point),
            &e.content_stream_id,
            point,
        )?;
        let parent_tags = graph.subtree_tags_for_hierarchy_relation(
            &e.content_stream_id,
            parent.relation_anchor_point,
            point,
        )?;
        HierarchyRelation {
            parent_node_anchor: parent.relation_anchor_point,
            child_node_anchor: node.relation_anchor_point,
            content_stream_id: e.content_stream_id.clone(),
            dimension_space_point: point.clone(),
            position,
            subtree_tags: parent_tags.only_inherited(),
        }
        .add(ctx.conn, ctx.tables)?;
        restriction::rebuild_subtree(ctx, &e.content_stream_id, &e.node_aggregate_id, point)?;
    }
    debug!(
        aggregate = %e.node_aggregate_id,
        anchor = %node.relation_anchor_point,
        coverage = e.succeeding_siblings_for_coverage.to_dimension_space_point_set().len(),
        "node aggregate created"
    );
    Ok(())
}
