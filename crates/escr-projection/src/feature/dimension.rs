use tracing::debug;

use escr_events::DimensionSpacePointAdjustment;
use escr_graph::{HierarchyRelations, RestrictionRelations};

use crate::context::EventContext;
use crate::error::ProjectionResult;
use crate::feature::node_modification::copy_on_write;

/// Rename a point: records originating there move their origin, relations
/// and restrictions are rehashed.
pub(crate) fn point_moved(
    ctx: &EventContext<'_>,
    e: &DimensionSpacePointAdjustment,
) -> ProjectionResult<()> {
    let cs = &e.content_stream_id;
    let nodes = ctx.graph().find_nodes_with_origin(cs, &e.source)?;
    let moved_origins = nodes.len();
    for node in nodes {
        let mut node = copy_on_write(ctx, cs, node)?;
        node.origin_dimension_space_point = e.target.clone();
        node.update(ctx.conn, ctx.tables)?;
    }
    let relations =
        HierarchyRelations::move_dimension_space_point(ctx.conn, ctx.tables, cs, &e.source, &e.target)?;
    RestrictionRelations::move_dimension_space_point(ctx.conn, ctx.tables, cs, &e.source, &e.target)?;
    debug!(
        content_stream = %cs,
        source = %e.source,
        target = %e.target,
        moved_origins,
        relations,
        "dimension space point moved"
    );
    Ok(())
}

/// Make the target point show everything the source point shows.
pub(crate) fn shine_through_added(
    ctx: &EventContext<'_>,
    e: &DimensionSpacePointAdjustment,
) -> ProjectionResult<()> {
    let cs = &e.content_stream_id;
    let relations =
        HierarchyRelations::copy_dimension_space_point(ctx.conn, ctx.tables, cs, &e.source, &e.target)?;
    RestrictionRelations::copy_dimension_space_point(ctx.conn, ctx.tables, cs, &e.source, &e.target)?;
    debug!(content_stream = %cs, source = %e.source, target = %e.target, relations, "shine-through added");
    Ok(())
}
