use tracing::debug;

use escr_events::{
    NodeAggregateNameWasChanged, NodeAggregateTypeWasChanged, NodePropertiesWereSet,
    NodeReferencesWereSet,
};
use escr_graph::{NodeRecord, ReferenceRelation};
use escr_types::{ContentStreamId, NodeAggregateId, OriginDimensionSpacePoint};

use crate::context::EventContext;
use crate::error::{InconsistencyReason, ProjectionResult};

/// Give `content_stream_id` its own copy of `node` if the record is shared
/// with other content streams, and return the record that may be written.
///
/// The copy takes over the stream's ingoing and outgoing relations and gets
/// the references of the original. Other streams keep the original.
pub(crate) fn copy_on_write(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    node: NodeRecord,
) -> ProjectionResult<NodeRecord> {
    let graph = ctx.graph();
    let streams =
        graph.get_all_content_stream_ids_anchor_point_is_contained_in(node.relation_anchor_point)?;
    if streams.len() <= 1 {
        return Ok(node);
    }

    let mut copy = node.copy(ctx.conn, ctx.tables, None, node.created_at)?;
    copy.last_modified_at = node.last_modified_at;
    copy.update(ctx.conn, ctx.tables)?;

    for mut ingoing in graph
        .find_ingoing_hierarchy_relations_for_node(node.relation_anchor_point, content_stream_id, None)?
        .into_values()
    {
        ingoing.assign_new_child_node(ctx.conn, ctx.tables, copy.relation_anchor_point)?;
    }
    for mut outgoing in graph.find_outgoing_hierarchy_relations_for_node(
        node.relation_anchor_point,
        content_stream_id,
        None,
    )? {
        outgoing.assign_new_parent_node(ctx.conn, ctx.tables, copy.relation_anchor_point, None)?;
    }
    let references = ReferenceRelation::copy_all(
        ctx.conn,
        ctx.tables,
        node.relation_anchor_point,
        copy.relation_anchor_point,
    )?;
    debug!(
        content_stream = %content_stream_id,
        original = %node.relation_anchor_point,
        copy = %copy.relation_anchor_point,
        shared_with = streams.len() - 1,
        references,
        "node record copied on write"
    );
    Ok(copy)
}

fn writable_node(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    aggregate: &NodeAggregateId,
    origin: &OriginDimensionSpacePoint,
) -> ProjectionResult<NodeRecord> {
    let node = ctx
        .graph()
        .find_node_by_origin(content_stream_id, aggregate, origin)?
        .ok_or_else(|| {
            ctx.inconsistent(
                InconsistencyReason::SourceNodeMissing,
                format!("{aggregate} originating in {origin}"),
            )
        })?;
    copy_on_write(ctx, content_stream_id, node)
}

pub(crate) fn properties_set(ctx: &EventContext<'_>, e: &NodePropertiesWereSet) -> ProjectionResult<()> {
    let mut node = writable_node(
        ctx,
        &e.content_stream_id,
        &e.node_aggregate_id,
        &e.origin_dimension_space_point,
    )?;
    for (name, value) in &e.property_values {
        node.properties.insert(name.clone(), value.clone());
    }
    for name in &e.properties_to_unset {
        node.properties.remove(name);
    }
    node.last_modified_at = Some(ctx.recorded_at);
    node.update(ctx.conn, ctx.tables)?;
    debug!(
        aggregate = %e.node_aggregate_id,
        set = e.property_values.len(),
        unset = e.properties_to_unset.len(),
        "node properties set"
    );
    Ok(())
}

/// Replace all references of one name, per affected origin. Order follows
/// the event.
pub(crate) fn references_set(ctx: &EventContext<'_>, e: &NodeReferencesWereSet) -> ProjectionResult<()> {
    for origin in &e.affected_source_origin_dimension_space_points {
        let mut node =
            writable_node(ctx, &e.content_stream_id, &e.source_node_aggregate_id, origin)?;
        ReferenceRelation::remove_named(
            ctx.conn,
            ctx.tables,
            node.relation_anchor_point,
            &e.reference_name,
        )?;
        for (position, reference) in e.references.iter().enumerate() {
            ReferenceRelation {
                node_anchor_point: node.relation_anchor_point,
                name: e.reference_name.clone(),
                position: position as i64,
                destination_node_aggregate_id: reference.target_node_aggregate_id.clone(),
                properties: reference.properties.clone(),
            }
            .add(ctx.conn, ctx.tables)?;
        }
        node.last_modified_at = Some(ctx.recorded_at);
        node.update(ctx.conn, ctx.tables)?;
    }
    Ok(())
}

pub(crate) fn name_changed(
    ctx: &EventContext<'_>,
    e: &NodeAggregateNameWasChanged,
) -> ProjectionResult<()> {
    update_every_node(ctx, &e.content_stream_id, &e.node_aggregate_id, |node| {
        node.node_name = Some(e.new_node_name.clone());
    })
}

pub(crate) fn type_changed(
    ctx: &EventContext<'_>,
    e: &NodeAggregateTypeWasChanged,
) -> ProjectionResult<()> {
    update_every_node(ctx, &e.content_stream_id, &e.node_aggregate_id, |node| {
        node.node_type_name = e.new_node_type_name.clone();
    })
}

fn update_every_node(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    aggregate: &NodeAggregateId,
    change: impl Fn(&mut NodeRecord),
) -> ProjectionResult<()> {
    let nodes = ctx.graph().find_nodes_of_aggregate(content_stream_id, aggregate)?;
    if nodes.is_empty() {
        return Err(ctx.inconsistent(
            InconsistencyReason::SourceNodeMissing,
            format!("node aggregate {aggregate}"),
        ));
    }
    for node in nodes {
        let mut node = copy_on_write(ctx, content_stream_id, node)?;
        change(&mut node);
        node.last_modified_at = Some(ctx.recorded_at);
        node.update(ctx.conn, ctx.tables)?;
    }
    Ok(())
}
