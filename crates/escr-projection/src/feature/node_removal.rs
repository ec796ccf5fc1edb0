use tracing::debug;

use escr_events::NodeAggregateWasRemoved;
use escr_graph::{HierarchyRelation, NodeRecord, RestrictionRelations};

use crate::context::EventContext;
use crate::error::ProjectionResult;

/// Counters for one removal.
#[derive(Debug, Default)]
struct Removed {
    relations: usize,
    nodes: usize,
}

/// Detach the aggregate from the affected points together with everything
/// below it. Records are deleted once no relation in any content stream
/// points at them.
pub(crate) fn removed(ctx: &EventContext<'_>, e: &NodeAggregateWasRemoved) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let cs = &e.content_stream_id;

    // Restrictions first: the descendant walk needs the relations still in place.
    for point in &e.affected_covered_dimension_space_points {
        let mut involved: Vec<_> = graph
            .find_descendant_node_aggregate_ids(cs, &e.node_aggregate_id, point)?
            .into_iter()
            .collect();
        involved.push(e.node_aggregate_id.clone());
        RestrictionRelations::remove_involving(ctx.conn, ctx.tables, cs, point.hash(), &involved)?;
    }

    let mut removed = Removed::default();
    let ingoing = graph.find_ingoing_hierarchy_relations_for_node_aggregate(
        cs,
        &e.node_aggregate_id,
        Some(&e.affected_covered_dimension_space_points),
    )?;
    for relation in ingoing.values() {
        remove_relation_recursively(ctx, relation, &mut removed)?;
    }
    debug!(
        aggregate = %e.node_aggregate_id,
        points = e.affected_covered_dimension_space_points.len(),
        relations = removed.relations,
        nodes = removed.nodes,
        "node aggregate removed"
    );
    Ok(())
}

fn remove_relation_recursively(
    ctx: &EventContext<'_>,
    relation: &HierarchyRelation,
    removed: &mut Removed,
) -> ProjectionResult<()> {
    relation.remove(ctx.conn, ctx.tables)?;
    removed.relations += 1;

    let children = ctx.graph().find_child_relations(
        relation.child_node_anchor,
        &relation.content_stream_id,
        &relation.dimension_space_point,
    )?;
    for child in &children {
        remove_relation_recursively(ctx, child, removed)?;
    }

    if NodeRecord::remove_if_unreferenced(ctx.conn, ctx.tables, relation.child_node_anchor)? {
        removed.nodes += 1;
    }
    Ok(())
}
