//! Specialization, generalization and peer variants.
//!
//! All three copy the source record to a new origin and hand it the
//! coverage named by the event's siblings. Points that already show the
//! aggregate are rewired to the copy in place; the rest get fresh relations
//! below the parent the aggregate has at the source origin.

use tracing::debug;

use escr_events::{
    NodeGeneralizationVariantWasCreated, NodePeerVariantWasCreated,
    NodeSpecializationVariantWasCreated,
};
use escr_graph::{relation_position, HierarchyRelation, ReferenceRelation, RelationAnchorPoint};
use escr_types::{
    ContentStreamId, DimensionSpacePoint, InterdimensionalSiblings, NodeAggregateId, NodeTags,
    OriginDimensionSpacePoint,
};

use crate::context::EventContext;
use crate::error::{InconsistencyReason, ProjectionResult};
use crate::feature::restriction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VariantKind {
    Specialization,
    Generalization,
    Peer,
}

impl VariantKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Specialization => "specialization",
            Self::Generalization => "generalization",
            Self::Peer => "peer",
        }
    }
}

struct Variant<'e> {
    kind: VariantKind,
    content_stream_id: &'e ContentStreamId,
    node_aggregate_id: &'e NodeAggregateId,
    source_origin: &'e OriginDimensionSpacePoint,
    target_origin: &'e OriginDimensionSpacePoint,
    siblings: &'e InterdimensionalSiblings,
}

/// Where relations for uncovered points are attached, and which tags they
/// start from. Specializations inherit their parent's tags only; the other
/// kinds keep the explicit tags of the source's own relation.
struct Template {
    parent: NodeAggregateId,
    tags: Option<NodeTags>,
}

pub(crate) fn specialization_created(
    ctx: &EventContext<'_>,
    e: &NodeSpecializationVariantWasCreated,
) -> ProjectionResult<()> {
    create_variant(
        ctx,
        Variant {
            kind: VariantKind::Specialization,
            content_stream_id: &e.content_stream_id,
            node_aggregate_id: &e.node_aggregate_id,
            source_origin: &e.source_origin,
            target_origin: &e.specialization_origin,
            siblings: &e.specialization_siblings,
        },
    )
}

pub(crate) fn generalization_created(
    ctx: &EventContext<'_>,
    e: &NodeGeneralizationVariantWasCreated,
) -> ProjectionResult<()> {
    create_variant(
        ctx,
        Variant {
            kind: VariantKind::Generalization,
            content_stream_id: &e.content_stream_id,
            node_aggregate_id: &e.node_aggregate_id,
            source_origin: &e.source_origin,
            target_origin: &e.generalization_origin,
            siblings: &e.variant_succeeding_siblings,
        },
    )
}

pub(crate) fn peer_created(
    ctx: &EventContext<'_>,
    e: &NodePeerVariantWasCreated,
) -> ProjectionResult<()> {
    create_variant(
        ctx,
        Variant {
            kind: VariantKind::Peer,
            content_stream_id: &e.content_stream_id,
            node_aggregate_id: &e.node_aggregate_id,
            source_origin: &e.source_origin,
            target_origin: &e.peer_origin,
            siblings: &e.peer_succeeding_siblings,
        },
    )
}

fn create_variant(ctx: &EventContext<'_>, v: Variant<'_>) -> ProjectionResult<()> {
    let graph = ctx.graph();
    let cs = v.content_stream_id;
    let source = graph
        .find_node_by_origin(cs, v.node_aggregate_id, v.source_origin)?
        .ok_or_else(|| {
            ctx.inconsistent(
                InconsistencyReason::SourceNodeMissing,
                format!("{} originating in {}", v.node_aggregate_id, v.source_origin),
            )
        })?;

    let coverage = v.siblings.to_dimension_space_point_set();
    let ingoing = graph.find_ingoing_hierarchy_relations_for_node_aggregate(
        cs,
        v.node_aggregate_id,
        Some(&coverage),
    )?;
    let unassigned: Vec<&DimensionSpacePoint> = coverage
        .iter()
        .filter(|point| !ingoing.contains_key(point.hash()))
        .collect();
    // Resolved before any write so it still sees the source in place.
    let template = if unassigned.is_empty() {
        None
    } else {
        Some(resolve_template(ctx, &v, source.relation_anchor_point)?)
    };

    let copy = source.copy(ctx.conn, ctx.tables, Some(v.target_origin), ctx.recorded_at)?;

    let rewired = ingoing.len();
    for mut relation in ingoing.into_values() {
        relation.assign_new_child_node(ctx.conn, ctx.tables, copy.relation_anchor_point)?;
    }
    for mut relation in graph.find_outgoing_hierarchy_relations_for_node_aggregate(
        cs,
        v.node_aggregate_id,
        Some(&coverage),
    )? {
        if relation.parent_node_anchor != copy.relation_anchor_point {
            relation.assign_new_parent_node(ctx.conn, ctx.tables, copy.relation_anchor_point, None)?;
        }
    }

    if let Some(template) = &template {
        for point in unassigned.iter().copied() {
            let parent = graph
                .find_node_in_aggregate(cs, &template.parent, point)?
                .ok_or_else(|| {
                    ctx.inconsistent(
                        InconsistencyReason::TargetParentNodeMissing,
                        format!("parent {} in {point}", template.parent),
                    )
                })?;
            let sibling = match v.siblings.succeeding_sibling_in(point) {
                Some(id) => Some(graph.find_node_in_aggregate(cs, id, point)?.ok_or_else(|| {
                    ctx.inconsistent(
                        InconsistencyReason::TargetSucceedingSiblingMissing,
                        format!("{id} in {point}"),
                    )
                })?),
                None => None,
            };
            let position = relation_position(
                &graph,
                Some(parent.relation_anchor_point),
                None,
                sibling.map(|s| s.relation_anchor_point),
                cs,
                point,
            )?;
            let parent_tags =
                graph.subtree_tags_for_hierarchy_relation(cs, parent.relation_anchor_point, point)?;
            let subtree_tags = match &template.tags {
                Some(tags) => tags.beneath(&parent_tags),
                None => parent_tags.only_inherited(),
            };
            HierarchyRelation {
                parent_node_anchor: parent.relation_anchor_point,
                child_node_anchor: copy.relation_anchor_point,
                content_stream_id: cs.clone(),
                dimension_space_point: point.clone(),
                position,
                subtree_tags,
            }
            .add(ctx.conn, ctx.tables)?;
        }
    }

    let references = ReferenceRelation::copy_all(
        ctx.conn,
        ctx.tables,
        source.relation_anchor_point,
        copy.relation_anchor_point,
    )?;
    for point in &coverage {
        restriction::rebuild_subtree(ctx, cs, v.node_aggregate_id, point)?;
    }
    debug!(
        kind = v.kind.as_str(),
        aggregate = %v.node_aggregate_id,
        source = %v.source_origin,
        target = %v.target_origin,
        anchor = %copy.relation_anchor_point,
        rewired,
        created = unassigned.len(),
        references,
        "node variant created"
    );
    Ok(())
}

fn resolve_template(
    ctx: &EventContext<'_>,
    v: &Variant<'_>,
    source_anchor: RelationAnchorPoint,
) -> ProjectionResult<Template> {
    let graph = ctx.graph();
    let parent_missing = || {
        ctx.inconsistent(
            InconsistencyReason::SourceParentNodeMissing,
            format!("{} originating in {}", v.node_aggregate_id, v.source_origin),
        )
    };
    match v.kind {
        VariantKind::Specialization => {
            let parent = graph
                .find_parent_node_of_origin(v.content_stream_id, v.node_aggregate_id, v.source_origin)?
                .ok_or_else(parent_missing)?;
            Ok(Template {
                parent: parent.node_aggregate_id,
                tags: None,
            })
        }
        VariantKind::Generalization | VariantKind::Peer => {
            let relation = graph
                .find_ingoing_hierarchy_relation(source_anchor, v.content_stream_id, v.source_origin)?
                .ok_or_else(|| {
                    ctx.inconsistent(
                        InconsistencyReason::IngoingSourceHierarchyRelationMissing,
                        format!("{} in {}", v.node_aggregate_id, v.source_origin),
                    )
                })?;
            let parent = graph
                .get_node_by_anchor_point(relation.parent_node_anchor)?
                .ok_or_else(parent_missing)?;
            Ok(Template {
                parent: parent.node_aggregate_id,
                tags: Some(relation.subtree_tags),
            })
        }
    }
}
