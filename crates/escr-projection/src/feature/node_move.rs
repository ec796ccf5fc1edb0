use tracing::debug;

use escr_events::{NodeAggregateWasMoved, NodeMoveMapping};
use escr_graph::{relation_position, NodeRecord};
use escr_types::{DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId};

use crate::context::EventContext;
use crate::error::{InconsistencyReason, ProjectionResult};
use crate::feature::{restriction, subtree_tagging};

pub(crate) fn moved(ctx: &EventContext<'_>, e: &NodeAggregateWasMoved) -> ProjectionResult<()> {
    for mapping in &e.move_mappings {
        move_in_point(ctx, e, mapping)?;
    }
    Ok(())
}

/// Re-parent or reorder the node of the aggregate in one covered point.
///
/// Without an explicit parent the node goes under the parent of the new
/// succeeding sibling; without either it is appended under its current parent.
fn move_in_point(
    ctx: &EventContext<'_>,
    e: &NodeAggregateWasMoved,
    mapping: &NodeMoveMapping,
) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let cs = &e.content_stream_id;
    let point = &mapping.dimension_space_point;

    let node = graph
        .find_node_in_aggregate(cs, &e.node_aggregate_id, point)?
        .ok_or_else(|| {
            ctx.inconsistent(
                InconsistencyReason::SourceNodeMissing,
                format!("{} in {point}", e.node_aggregate_id),
            )
        })?;
    let ingoing = graph.find_ingoing_hierarchy_relations_for_node(
        node.relation_anchor_point,
        cs,
        Some(&DimensionSpacePointSet::single(point.clone())),
    )?;
    if ingoing.len() != 1 {
        return Err(ctx.inconsistent(
            InconsistencyReason::UnexpectedIngoingRelationCount(ingoing.len()),
            format!("{} in {point}", e.node_aggregate_id),
        ));
    }
    let Some(mut relation) = ingoing.into_values().next() else {
        return Ok(());
    };

    let sibling = match &mapping.new_succeeding_sibling_node_aggregate_id {
        Some(id) => Some(find_required(
            ctx,
            graph.find_node_in_aggregate(cs, id, point)?,
            InconsistencyReason::TargetSucceedingSiblingMissing,
            id,
            point,
        )?),
        None => None,
    };
    let new_parent = match (
        &mapping.new_parent_node_aggregate_id,
        &mapping.new_succeeding_sibling_node_aggregate_id,
    ) {
        (Some(parent_id), _) => {
            find_required(
                ctx,
                graph.find_node_in_aggregate(cs, parent_id, point)?,
                InconsistencyReason::TargetParentNodeMissing,
                parent_id,
                point,
            )?
            .relation_anchor_point
        }
        (None, Some(sibling_id)) => {
            find_required(
                ctx,
                graph.find_parent_node(cs, sibling_id, point)?,
                InconsistencyReason::TargetSucceedingSiblingParentMissing,
                sibling_id,
                point,
            )?
            .relation_anchor_point
        }
        (None, None) => relation.parent_node_anchor,
    };
    let sibling_anchor = sibling.map(|s| s.relation_anchor_point);

    if new_parent != relation.parent_node_anchor {
        let position = relation_position(&graph, Some(new_parent), None, sibling_anchor, cs, point)?;
        relation.assign_new_parent_node(ctx.conn, ctx.tables, new_parent, Some(position))?;
        let retagged = subtree_tagging::inherit_from_parent(ctx, cs, &mut relation)?;
        restriction::rebuild_subtree(ctx, cs, &e.node_aggregate_id, point)?;
        debug!(
            aggregate = %e.node_aggregate_id,
            dsp = point.hash(),
            parent = %new_parent,
            position,
            retagged,
            "node re-parented"
        );
    } else {
        let position = relation_position(
            &graph,
            Some(new_parent),
            Some(relation.child_node_anchor),
            sibling_anchor,
            cs,
            point,
        )?;
        relation.assign_new_position(ctx.conn, ctx.tables, position)?;
        debug!(aggregate = %e.node_aggregate_id, dsp = point.hash(), position, "node reordered");
    }
    Ok(())
}

fn find_required(
    ctx: &EventContext<'_>,
    node: Option<NodeRecord>,
    reason: InconsistencyReason,
    aggregate: &NodeAggregateId,
    point: &DimensionSpacePoint,
) -> ProjectionResult<NodeRecord> {
    node.ok_or_else(|| ctx.inconsistent(reason, format!("{aggregate} in {point}")))
}
