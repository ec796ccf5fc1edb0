use tracing::debug;

use escr_events::{
    RootWorkspaceWasCreated, WorkspaceBaseWorkspaceWasChanged, WorkspaceContentStreamWasReplaced,
    WorkspaceRebaseFailed, WorkspaceWasCreated, WorkspaceWasPublished, WorkspaceWasRemoved,
};
use escr_graph::{ContentStreams, WorkspaceRecord, Workspaces};
use escr_types::{ContentStreamId, ContentStreamStatus, WorkspaceStatus};

use crate::context::EventContext;
use crate::error::ProjectionResult;

pub(crate) fn root_created(ctx: &EventContext<'_>, e: &RootWorkspaceWasCreated) -> ProjectionResult<()> {
    WorkspaceRecord {
        name: e.workspace_name.clone(),
        base_workspace_name: None,
        current_content_stream_id: e.new_content_stream_id.clone(),
        status: WorkspaceStatus::UpToDate,
    }
    .add(ctx.conn, ctx.tables)?;
    mark_in_use(ctx, &e.new_content_stream_id)
}

pub(crate) fn created(ctx: &EventContext<'_>, e: &WorkspaceWasCreated) -> ProjectionResult<()> {
    WorkspaceRecord {
        name: e.workspace_name.clone(),
        base_workspace_name: Some(e.base_workspace_name.clone()),
        current_content_stream_id: e.new_content_stream_id.clone(),
        status: WorkspaceStatus::UpToDate,
    }
    .add(ctx.conn, ctx.tables)?;
    mark_in_use(ctx, &e.new_content_stream_id)
}

pub(crate) fn base_changed(
    ctx: &EventContext<'_>,
    e: &WorkspaceBaseWorkspaceWasChanged,
) -> ProjectionResult<()> {
    Workspaces::update_base_workspace(ctx.conn, ctx.tables, &e.workspace_name, &e.base_workspace_name)?;
    Workspaces::update_content_stream(ctx.conn, ctx.tables, &e.workspace_name, &e.new_content_stream_id)?;
    mark_in_use(ctx, &e.new_content_stream_id)
}

/// `partial` discards keep the workspace's own status.
pub(crate) fn discarded(
    ctx: &EventContext<'_>,
    e: &WorkspaceContentStreamWasReplaced,
    partial: bool,
) -> ProjectionResult<()> {
    Workspaces::update_content_stream(ctx.conn, ctx.tables, &e.workspace_name, &e.new_content_stream_id)?;
    if !partial {
        Workspaces::update_status(ctx.conn, ctx.tables, &e.workspace_name, WorkspaceStatus::Outdated)?;
    }
    let dependents = Workspaces::mark_dependents_outdated(ctx.conn, ctx.tables, &e.workspace_name)?;
    debug!(workspace = %e.workspace_name, dependents, partial, "workspace discarded");
    replace_content_stream(ctx, &e.new_content_stream_id, &e.previous_content_stream_id)
}

/// Publishing outdates everything based on the target. The source itself is
/// up to date afterwards, its own dependents are not.
pub(crate) fn published(ctx: &EventContext<'_>, e: &WorkspaceWasPublished) -> ProjectionResult<()> {
    Workspaces::update_content_stream(
        ctx.conn,
        ctx.tables,
        &e.source_workspace_name,
        &e.new_source_content_stream_id,
    )?;
    Workspaces::mark_dependents_outdated(ctx.conn, ctx.tables, &e.target_workspace_name)?;
    Workspaces::update_status(
        ctx.conn,
        ctx.tables,
        &e.source_workspace_name,
        WorkspaceStatus::UpToDate,
    )?;
    Workspaces::mark_dependents_outdated(ctx.conn, ctx.tables, &e.source_workspace_name)?;
    debug!(
        source = %e.source_workspace_name,
        target = %e.target_workspace_name,
        "workspace published"
    );
    replace_content_stream(
        ctx,
        &e.new_source_content_stream_id,
        &e.previous_source_content_stream_id,
    )
}

pub(crate) fn rebased(
    ctx: &EventContext<'_>,
    e: &WorkspaceContentStreamWasReplaced,
) -> ProjectionResult<()> {
    Workspaces::update_content_stream(ctx.conn, ctx.tables, &e.workspace_name, &e.new_content_stream_id)?;
    Workspaces::mark_dependents_outdated(ctx.conn, ctx.tables, &e.workspace_name)?;
    Workspaces::update_status(ctx.conn, ctx.tables, &e.workspace_name, WorkspaceStatus::UpToDate)?;
    replace_content_stream(ctx, &e.new_content_stream_id, &e.previous_content_stream_id)
}

pub(crate) fn rebase_failed(ctx: &EventContext<'_>, e: &WorkspaceRebaseFailed) -> ProjectionResult<()> {
    Workspaces::update_status(
        ctx.conn,
        ctx.tables,
        &e.workspace_name,
        WorkspaceStatus::OutdatedConflict,
    )?;
    ContentStreams::update_status(
        ctx.conn,
        ctx.tables,
        &e.candidate_content_stream_id,
        ContentStreamStatus::RebaseError,
    )?;
    Ok(())
}

pub(crate) fn removed(ctx: &EventContext<'_>, e: &WorkspaceWasRemoved) -> ProjectionResult<()> {
    Workspaces::remove(ctx.conn, ctx.tables, &e.workspace_name)?;
    Ok(())
}

fn mark_in_use(ctx: &EventContext<'_>, content_stream_id: &ContentStreamId) -> ProjectionResult<()> {
    ContentStreams::update_status(
        ctx.conn,
        ctx.tables,
        content_stream_id,
        ContentStreamStatus::InUseByWorkspace,
    )?;
    Ok(())
}

fn replace_content_stream(
    ctx: &EventContext<'_>,
    new: &ContentStreamId,
    previous: &ContentStreamId,
) -> ProjectionResult<()> {
    mark_in_use(ctx, new)?;
    ContentStreams::update_status(ctx.conn, ctx.tables, previous, ContentStreamStatus::NoLongerInUse)?;
    Ok(())
}
