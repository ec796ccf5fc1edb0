//! Keeping the restriction index in line with the hierarchy after structural
//! changes. Tagging maintains it directly; moves, variants and creations
//! rebuild the rows of the subtree they touched.

use std::collections::BTreeSet;

use tracing::debug;

use escr_graph::{RelationAnchorPoint, RestrictionRelation, RestrictionRelations};
use escr_types::{ContentStreamId, DimensionSpacePoint, NodeAggregateId};

use crate::context::EventContext;
use crate::error::ProjectionResult;

/// Recompute the restriction rows of `aggregate` and its descendants in one point.
pub(crate) fn rebuild_subtree(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    aggregate: &NodeAggregateId,
    point: &DimensionSpacePoint,
) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let mut affected =
        graph.find_descendant_node_aggregate_ids(content_stream_id, aggregate, point)?;
    affected.insert(aggregate.clone());

    for affected_id in &affected {
        RestrictionRelations::remove_affected(
            ctx.conn,
            ctx.tables,
            content_stream_id,
            point.hash(),
            affected_id,
        )?;
        for origin in disabling_ancestors(ctx, content_stream_id, affected_id, point)? {
            RestrictionRelation {
                content_stream_id: content_stream_id.clone(),
                dimension_space_point_hash: point.hash().to_string(),
                origin_node_aggregate_id: origin,
                affected_node_aggregate_id: affected_id.clone(),
            }
            .add(ctx.conn, ctx.tables)?;
        }
    }
    debug!(
        aggregate = %aggregate,
        dsp = point.hash(),
        affected = affected.len(),
        "restrictions rebuilt"
    );
    Ok(())
}

/// Aggregates on the path from `aggregate` (inclusive) to the root whose
/// ingoing relation carries the explicit `disabled` tag.
fn disabling_ancestors(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    aggregate: &NodeAggregateId,
    point: &DimensionSpacePoint,
) -> ProjectionResult<Vec<NodeAggregateId>> {
    let graph = ctx.graph();
    let Some(node) = graph.find_node_in_aggregate(content_stream_id, aggregate, point)? else {
        return Ok(Vec::new());
    };

    let mut origins = Vec::new();
    let mut visited: BTreeSet<RelationAnchorPoint> = BTreeSet::new();
    let mut current = node.relation_anchor_point;
    let mut current_id = node.node_aggregate_id;
    while visited.insert(current) {
        let Some(relation) =
            graph.find_ingoing_hierarchy_relation(current, content_stream_id, point)?
        else {
            break;
        };
        if relation
            .subtree_tags
            .explicit()
            .iter()
            .any(|tag| tag.is_disabled())
        {
            origins.push(current_id.clone());
        }
        if relation.parent_node_anchor.is_root_edge() {
            break;
        }
        let Some(parent) = graph.get_node_by_anchor_point(relation.parent_node_anchor)? else {
            break;
        };
        current = parent.relation_anchor_point;
        current_id = parent.node_aggregate_id;
    }
    Ok(origins)
}
