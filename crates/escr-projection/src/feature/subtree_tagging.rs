use std::collections::BTreeSet;

use tracing::debug;

use escr_events::SubtreeTagChange;
use escr_graph::{HierarchyRelation, RelationAnchorPoint, RestrictionRelations};
use escr_types::{ContentStreamId, NodeTags, SubtreeTag};

use crate::context::EventContext;
use crate::error::ProjectionResult;

/// Set `tag` explicitly on the node and as inherited on every descendant
/// that does not carry it yet. Branches already tagged are skipped.
pub(crate) fn tagged(ctx: &EventContext<'_>, e: &SubtreeTagChange) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let relations = graph.find_ingoing_hierarchy_relations_for_node_aggregate(
        &e.content_stream_id,
        &e.node_aggregate_id,
        Some(&e.affected_dimension_space_points),
    )?;
    let mut updated = 0usize;
    for mut relation in relations.into_values() {
        let tags = relation.subtree_tags.with_explicit(e.tag.clone());
        relation.assign_subtree_tags(ctx.conn, ctx.tables, tags)?;
        updated += 1;
        updated += walk_descendants(ctx, &e.content_stream_id, &relation, |child| {
            if child.subtree_tags.contains(&e.tag) {
                return None;
            }
            Some(child.subtree_tags.with_inherited(e.tag.clone()))
        })?;
    }

    if e.tag.is_disabled() {
        RestrictionRelations::add_subtree(
            ctx.conn,
            ctx.tables,
            &e.content_stream_id,
            &e.node_aggregate_id,
            &e.affected_dimension_space_points,
        )?;
    }
    debug!(aggregate = %e.node_aggregate_id, tag = %e.tag, updated, "subtree tagged");
    Ok(())
}

/// Remove `tag` from the node. If the parent still carries it, the node keeps
/// it as inherited; otherwise the inherited copies below are removed too,
/// stopping at descendants that set the tag themselves.
pub(crate) fn untagged(ctx: &EventContext<'_>, e: &SubtreeTagChange) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let relations = graph.find_ingoing_hierarchy_relations_for_node_aggregate(
        &e.content_stream_id,
        &e.node_aggregate_id,
        Some(&e.affected_dimension_space_points),
    )?;
    let mut updated = 0usize;
    for mut relation in relations.into_values() {
        if !relation.subtree_tags.is_explicit(&e.tag) {
            continue;
        }
        let parent_tags = graph.subtree_tags_for_hierarchy_relation(
            &e.content_stream_id,
            relation.parent_node_anchor,
            &relation.dimension_space_point,
        )?;
        let still_inherited = parent_tags.contains(&e.tag);
        let tags = relation.subtree_tags.without(&e.tag);
        let tags = if still_inherited {
            tags.with_inherited(e.tag.clone())
        } else {
            tags
        };
        relation.assign_subtree_tags(ctx.conn, ctx.tables, tags)?;
        updated += 1;
        if !still_inherited {
            updated += remove_inherited(ctx, &e.content_stream_id, &relation, &e.tag)?;
        }
    }

    if e.tag.is_disabled() {
        RestrictionRelations::remove_by_origin(
            ctx.conn,
            ctx.tables,
            &e.content_stream_id,
            &e.node_aggregate_id,
            &e.affected_dimension_space_points,
        )?;
    }
    debug!(aggregate = %e.node_aggregate_id, tag = %e.tag, updated, "subtree untagged");
    Ok(())
}

fn remove_inherited(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    relation: &HierarchyRelation,
    tag: &SubtreeTag,
) -> ProjectionResult<usize> {
    walk_descendants(ctx, content_stream_id, relation, |child| {
        if !child.subtree_tags.is_inherited(tag) {
            return None;
        }
        Some(child.subtree_tags.without(tag))
    })
}

/// Re-derive the tags of a re-parented relation and everything below it:
/// explicit tags stay, inherited tags come from the new parent.
pub(crate) fn inherit_from_parent(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    relation: &mut HierarchyRelation,
) -> ProjectionResult<usize> {
    let parent_tags = ctx.graph().subtree_tags_for_hierarchy_relation(
        content_stream_id,
        relation.parent_node_anchor,
        &relation.dimension_space_point,
    )?;
    let tags = relation.subtree_tags.beneath(&parent_tags);
    relation.assign_subtree_tags(ctx.conn, ctx.tables, tags)?;

    let mut updated = 1;
    let mut stack = vec![relation.clone()];
    let mut visited: BTreeSet<RelationAnchorPoint> = BTreeSet::new();
    while let Some(parent) = stack.pop() {
        if !visited.insert(parent.child_node_anchor) {
            continue;
        }
        for mut child in ctx.graph().find_child_relations(
            parent.child_node_anchor,
            content_stream_id,
            &parent.dimension_space_point,
        )? {
            let tags = child.subtree_tags.beneath(&parent.subtree_tags);
            if tags != child.subtree_tags {
                child.assign_subtree_tags(ctx.conn, ctx.tables, tags)?;
                updated += 1;
            }
            stack.push(child);
        }
    }
    Ok(updated)
}

/// Depth-first walk below `relation` in its own subgraph. `update` returns
/// the new tags of a child, or `None` to leave it and its subtree alone.
fn walk_descendants(
    ctx: &EventContext<'_>,
    content_stream_id: &ContentStreamId,
    relation: &HierarchyRelation,
    update: impl Fn(&HierarchyRelation) -> Option<NodeTags>,
) -> ProjectionResult<usize> {
    let graph = ctx.graph();
    let mut updated = 0;
    let mut stack = vec![relation.child_node_anchor];
    let mut visited: BTreeSet<RelationAnchorPoint> = BTreeSet::new();
    while let Some(parent) = stack.pop() {
        if !visited.insert(parent) {
            continue;
        }
        for mut child in
            graph.find_child_relations(parent, content_stream_id, &relation.dimension_space_point)?
        {
            let Some(tags) = update(&child) else {
                continue;
            };
            child.assign_subtree_tags(ctx.conn, ctx.tables, tags)?;
            updated += 1;
            stack.push(child.child_node_anchor);
        }
    }
    Ok(updated)
}
