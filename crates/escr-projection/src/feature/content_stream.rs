use tracing::debug;

use escr_events::{
    ContentStreamWasClosed, ContentStreamWasCreated, ContentStreamWasForked,
    ContentStreamWasRemoved, ContentStreamWasReopened,
};
use escr_graph::{
    ContentStreamRecord, ContentStreams, HierarchyRelations, NodeRecord, RestrictionRelations,
};
use escr_types::ContentStreamStatus;

use crate::context::EventContext;
use crate::error::{InconsistencyReason, ProjectionResult};

pub(crate) fn created(ctx: &EventContext<'_>, e: &ContentStreamWasCreated) -> ProjectionResult<()> {
    ContentStreamRecord {
        id: e.content_stream_id.clone(),
        version: 0,
        source_content_stream_id: None,
        source_content_stream_version: None,
        status: ContentStreamStatus::Created,
        removed: false,
    }
    .add(ctx.conn, ctx.tables)?;
    Ok(())
}

/// The fork shares every node record of its source; only the relations are copied.
pub(crate) fn forked(ctx: &EventContext<'_>, e: &ContentStreamWasForked) -> ProjectionResult<()> {
    if ctx.graph().find_content_stream(&e.source_content_stream_id)?.is_none() {
        return Err(ctx.inconsistent(
            InconsistencyReason::ContentStreamMissing,
            format!("source content stream {}", e.source_content_stream_id),
        ));
    }
    ContentStreamRecord {
        id: e.new_content_stream_id.clone(),
        version: 0,
        source_content_stream_id: Some(e.source_content_stream_id.clone()),
        source_content_stream_version: Some(e.version_of_source_content_stream),
        status: ContentStreamStatus::Forked,
        removed: false,
    }
    .add(ctx.conn, ctx.tables)?;

    let relations = HierarchyRelations::copy_content_stream(
        ctx.conn,
        ctx.tables,
        &e.source_content_stream_id,
        &e.new_content_stream_id,
    )?;
    let restrictions = RestrictionRelations::copy_content_stream(
        ctx.conn,
        ctx.tables,
        &e.source_content_stream_id,
        &e.new_content_stream_id,
    )?;
    debug!(
        source = %e.source_content_stream_id,
        target = %e.new_content_stream_id,
        relations,
        restrictions,
        "content stream forked"
    );
    Ok(())
}

pub(crate) fn closed(ctx: &EventContext<'_>, e: &ContentStreamWasClosed) -> ProjectionResult<()> {
    ContentStreams::update_status(
        ctx.conn,
        ctx.tables,
        &e.content_stream_id,
        ContentStreamStatus::Closed,
    )?;
    Ok(())
}

pub(crate) fn reopened(ctx: &EventContext<'_>, e: &ContentStreamWasReopened) -> ProjectionResult<()> {
    ContentStreams::update_status(ctx.conn, ctx.tables, &e.content_stream_id, e.previous_state)?;
    Ok(())
}

/// Drop the stream's relations and garbage-collect records nothing points at
/// any more. The row itself stays, flagged as removed.
pub(crate) fn removed(ctx: &EventContext<'_>, e: &ContentStreamWasRemoved) -> ProjectionResult<()> {
    let relations =
        HierarchyRelations::remove_content_stream(ctx.conn, ctx.tables, &e.content_stream_id)?;
    let nodes = NodeRecord::remove_all_unreferenced(ctx.conn, ctx.tables)?;
    RestrictionRelations::remove_content_stream(ctx.conn, ctx.tables, &e.content_stream_id)?;
    ContentStreams::mark_removed(ctx.conn, ctx.tables, &e.content_stream_id)?;
    debug!(content_stream = %e.content_stream_id, relations, nodes, "content stream removed");
    Ok(())
}
