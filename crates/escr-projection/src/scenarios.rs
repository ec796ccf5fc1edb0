//! End-to-end behaviour of the projection, driven by event sequences.

use escr_events::*;
use escr_graph::{HierarchyRelation, NodeRecord, ProjectionContentGraph, TableNames};
use escr_types::{
    ContentStreamId, ContentStreamStatus, DimensionSpacePoint, DimensionSpacePointSet,
    InterdimensionalSibling, InterdimensionalSiblings, NodeAggregateClassification,
    NodeAggregateId, NodeTypeName, ReferenceName, SubtreeTag, WorkspaceName, WorkspaceStatus,
};
use proptest::prelude::*;

use crate::cache::{CacheFlushingHook, RecordingCacheFlusher};
use crate::catchup::CatchUp;
use crate::error::{InconsistencyReason, ProjectionResult};
use crate::integrity::{IntegrityViolationDetector, ViolationKind};
use crate::projection::ContentGraphProjection;

// ---------------------------------------------------------------------------
// Event builders
// ---------------------------------------------------------------------------

const LIVE: &str = "cs-live";

fn cs(id: &str) -> ContentStreamId {
    ContentStreamId::new(id).unwrap()
}

fn agg(id: &str) -> NodeAggregateId {
    NodeAggregateId::new(id).unwrap()
}

fn lang(code: &str) -> DimensionSpacePoint {
    DimensionSpacePoint::new([("language", code)])
}

fn points(codes: &[&str]) -> DimensionSpacePointSet {
    codes.iter().map(|code| lang(code)).collect()
}

fn stream_created(id: &str) -> ContentRepositoryEvent {
    ContentRepositoryEvent::ContentStreamWasCreated(ContentStreamWasCreated {
        content_stream_id: cs(id),
    })
}

fn forked(new: &str, source: &str) -> ContentRepositoryEvent {
    ContentRepositoryEvent::ContentStreamWasForked(ContentStreamWasForked {
        new_content_stream_id: cs(new),
        source_content_stream_id: cs(source),
        version_of_source_content_stream: 0,
    })
}

fn root(id: &str, coverage: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::RootNodeAggregateWithNodeWasCreated(
        RootNodeAggregateWithNodeWasCreated {
            content_stream_id: cs(LIVE),
            node_aggregate_id: agg(id),
            node_type_name: NodeTypeName::new("Acme:Sites").unwrap(),
            covered_dimension_space_points: points(coverage),
            node_aggregate_classification: NodeAggregateClassification::Root,
        },
    )
}

/// Helper to create a page appended below `parent` in every covered point.
fn page(id: &str, parent: &str, origin: &str, coverage: &[&str]) -> ContentRepositoryEvent {
    page_before(id, parent, origin, coverage, None)
}

fn page_before(
    id: &str,
    parent: &str,
    origin: &str,
    coverage: &[&str],
    sibling: Option<&str>,
) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg(id),
        node_type_name: NodeTypeName::new("Acme:Page").unwrap(),
        origin_dimension_space_point: lang(origin),
        succeeding_siblings_for_coverage: siblings(coverage, sibling),
        parent_node_aggregate_id: agg(parent),
        node_name: None,
        initial_property_values: Default::default(),
        node_aggregate_classification: NodeAggregateClassification::Regular,
    })
}

fn siblings(coverage: &[&str], sibling: Option<&str>) -> InterdimensionalSiblings {
    InterdimensionalSiblings::new(
        coverage
            .iter()
            .map(|code| InterdimensionalSibling {
                dimension_space_point: lang(code),
                node_aggregate_id: sibling.map(agg),
            })
            .collect(),
    )
}

fn moved(id: &str, point: &str, parent: Option<&str>, sibling: Option<&str>) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodeAggregateWasMoved(NodeAggregateWasMoved {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg(id),
        move_mappings: vec![NodeMoveMapping {
            dimension_space_point: lang(point),
            new_parent_node_aggregate_id: parent.map(agg),
            new_succeeding_sibling_node_aggregate_id: sibling.map(agg),
        }],
    })
}

fn removed(id: &str, affected: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodeAggregateWasRemoved(NodeAggregateWasRemoved {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg(id),
        affected_covered_dimension_space_points: points(affected),
    })
}

fn tag_change(id: &str, affected: &[&str], tag: SubtreeTag) -> SubtreeTagChange {
    SubtreeTagChange {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg(id),
        affected_dimension_space_points: points(affected),
        tag,
    }
}

fn disabled(id: &str, affected: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::SubtreeWasTagged(tag_change(id, affected, SubtreeTag::disabled()))
}

fn enabled(id: &str, affected: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::SubtreeWasUntagged(tag_change(id, affected, SubtreeTag::disabled()))
}

fn references(source: &str, origin: &str, targets: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodeReferencesWereSet(NodeReferencesWereSet {
        content_stream_id: cs(LIVE),
        source_node_aggregate_id: agg(source),
        affected_source_origin_dimension_space_points: vec![lang(origin)],
        reference_name: ReferenceName::new("related").unwrap(),
        references: targets
            .iter()
            .map(|target| NodeReference {
                target_node_aggregate_id: agg(target),
                properties: None,
            })
            .collect(),
    })
}

fn specialized(id: &str, source: &str, target: &str, coverage: &[&str]) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodeSpecializationVariantWasCreated(
        NodeSpecializationVariantWasCreated {
            content_stream_id: cs(LIVE),
            node_aggregate_id: agg(id),
            source_origin: lang(source),
            specialization_origin: lang(target),
            specialization_siblings: siblings(coverage, None),
        },
    )
}

fn properties_set(cs_id: &str, id: &str, origin: &str, title: &str) -> ContentRepositoryEvent {
    ContentRepositoryEvent::NodePropertiesWereSet(NodePropertiesWereSet {
        content_stream_id: cs(cs_id),
        node_aggregate_id: agg(id),
        origin_dimension_space_point: lang(origin),
        property_values: [("title".to_string(), serde_json::json!(title))].into(),
        properties_to_unset: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A projection on an in-memory database that numbers events as it applies them.
struct Harness {
    projection: ContentGraphProjection,
    sequence_number: u64,
}

impl Harness {
    /// Helper to set up a projection with the live content stream in place.
    fn new() -> Self {
        let projection =
            ContentGraphProjection::open_in_memory(TableNames::for_content_repository("test"))
                .unwrap();
        projection.setup().unwrap();
        let mut harness = Self {
            projection,
            sequence_number: 0,
        };
        harness.apply(stream_created(LIVE));
        harness
    }

    fn try_apply(&mut self, event: ContentRepositoryEvent) -> ProjectionResult<bool> {
        self.sequence_number += 1;
        let envelope = EventEnvelope::new(self.sequence_number, self.sequence_number, event);
        self.projection.apply(&envelope)
    }

    fn apply(&mut self, event: ContentRepositoryEvent) {
        assert!(self.try_apply(event).unwrap());
    }

    fn graph(&self) -> ProjectionContentGraph<'_> {
        self.projection.graph()
    }

    fn node_in(&self, stream: &str, id: &str, point: &str) -> NodeRecord {
        self.graph()
            .find_node_in_aggregate(&cs(stream), &agg(id), &lang(point))
            .unwrap()
            .unwrap_or_else(|| panic!("{id} not visible in {stream}/{point}"))
    }

    fn node(&self, id: &str, point: &str) -> NodeRecord {
        self.node_in(LIVE, id, point)
    }

    fn relation(&self, id: &str, point: &str) -> HierarchyRelation {
        let node = self.node(id, point);
        self.graph()
            .find_ingoing_hierarchy_relation(node.relation_anchor_point, &cs(LIVE), &lang(point))
            .unwrap()
            .unwrap()
    }

    /// Aggregate ids of the children of `parent`, in sibling order.
    fn children(&self, parent: &str, point: &str) -> Vec<String> {
        let graph = self.graph();
        let parent = self.node(parent, point);
        graph
            .find_child_relations(parent.relation_anchor_point, &cs(LIVE), &lang(point))
            .unwrap()
            .into_iter()
            .map(|relation| {
                graph
                    .get_node_by_anchor_point(relation.child_node_anchor)
                    .unwrap()
                    .unwrap()
                    .node_aggregate_id
                    .to_string()
            })
            .collect()
    }

    /// (origin, affected) restriction pairs in one point of the live stream.
    fn restrictions(&self, point: &str) -> Vec<(String, String)> {
        self.graph()
            .find_restriction_relations(&cs(LIVE), Some(&lang(point)))
            .unwrap()
            .into_iter()
            .map(|r| {
                (
                    r.origin_node_aggregate_id.to_string(),
                    r.affected_node_aggregate_id.to_string(),
                )
            })
            .collect()
    }

    fn node_count(&self) -> usize {
        self.graph().count_node_records().unwrap()
    }

    fn assert_consistent(&self) {
        let report = IntegrityViolationDetector::run(&self.graph()).unwrap();
        assert!(report.is_valid(), "{:#?}", report.violations);
    }
}

fn pair(origin: &str, affected: &str) -> (String, String) {
    (origin.to_string(), affected.to_string())
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

#[test]
fn moving_before_a_sibling_lands_between_it_and_its_predecessor() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("c1", "r1", "en", &["en"]));
    h.apply(page("p1", "r1", "en", &["en"]));
    h.apply(page("s1", "r1", "en", &["en"]));
    let root_before = h.relation("r1", "en");
    let predecessor = h.relation("p1", "en").position;
    let sibling = h.relation("s1", "en").position;

    h.apply(moved("c1", "en", None, Some("s1")));

    let position = h.relation("c1", "en").position;
    assert!(predecessor < position && position < sibling);
    assert_eq!(h.children("r1", "en"), vec!["p1", "c1", "s1"]);
    assert_eq!(h.relation("r1", "en"), root_before);
    h.assert_consistent();
}

#[test]
fn moving_to_another_parent_keeps_the_sibling_count() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("a", "r1", "en", &["en"]));
    h.apply(page("b", "r1", "en", &["en"]));
    h.apply(page("a1", "a", "en", &["en"]));
    h.apply(page("a2", "a", "en", &["en"]));
    let total = h
        .graph()
        .find_hierarchy_relations_in_content_stream(&cs(LIVE), None)
        .unwrap()
        .len();

    h.apply(moved("a2", "en", Some("b"), None));

    assert_eq!(h.children("a", "en"), vec!["a1"]);
    assert_eq!(h.children("b", "en"), vec!["a2"]);
    let after = h
        .graph()
        .find_hierarchy_relations_in_content_stream(&cs(LIVE), None)
        .unwrap()
        .len();
    assert_eq!(after, total);
    h.assert_consistent();
}

#[test]
fn moving_into_a_disabled_subtree_inherits_its_tags() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("hidden", "r1", "en", &["en"]));
    h.apply(page("visible", "r1", "en", &["en"]));
    h.apply(page("leaf", "visible", "en", &["en"]));
    h.apply(disabled("hidden", &["en"]));

    h.apply(moved("visible", "en", Some("hidden"), None));

    assert!(h.relation("visible", "en").subtree_tags.is_inherited(&SubtreeTag::disabled()));
    assert!(h.relation("leaf", "en").subtree_tags.is_inherited(&SubtreeTag::disabled()));
    assert_eq!(
        h.restrictions("en"),
        vec![
            pair("hidden", "hidden"),
            pair("hidden", "leaf"),
            pair("hidden", "visible")
        ]
    );
    h.assert_consistent();
}

#[test]
fn moving_an_unknown_node_is_an_inconsistency() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    let err = h.try_apply(moved("ghost", "en", None, None)).unwrap_err();
    assert_eq!(err.inconsistency(), Some(&InconsistencyReason::SourceNodeMissing));

    h.apply(page("c1", "r1", "en", &["en"]));
    let err = h.try_apply(moved("c1", "en", Some("nowhere"), None)).unwrap_err();
    assert_eq!(err.inconsistency(), Some(&InconsistencyReason::TargetParentNodeMissing));
    let err = h.try_apply(moved("c1", "en", None, Some("nowhere"))).unwrap_err();
    assert_eq!(
        err.inconsistency(),
        Some(&InconsistencyReason::TargetSucceedingSiblingMissing)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn reordering_keeps_siblings_distinct(
        moves in prop::collection::vec((0usize..5, prop::option::of(0usize..5)), 1..16)
    ) {
        let mut h = Harness::new();
        h.apply(root("r1", &["en"]));
        let ids: Vec<String> = (0..5).map(|i| format!("n{i}")).collect();
        for id in &ids {
            h.apply(page(id, "r1", "en", &["en"]));
        }

        for (node, sibling) in moves {
            let sibling = sibling.filter(|s| *s != node);
            h.apply(moved(&ids[node], "en", None, sibling.map(|s| ids[s].as_str())));

            let children = h.children("r1", "en");
            prop_assert_eq!(children.len(), ids.len());
            let at = |id: &str| children.iter().position(|c| c == id).unwrap();
            match sibling {
                Some(s) => prop_assert_eq!(at(ids[node].as_str()) + 1, at(ids[s].as_str())),
                None => prop_assert_eq!(at(ids[node].as_str()), ids.len() - 1),
            }
        }
        let report = IntegrityViolationDetector::run(&h.graph()).unwrap();
        prop_assert_eq!(report.count(ViolationKind::SiblingsNotDistinctlySorted), 0);
    }
}

// ---------------------------------------------------------------------------
// Creation and removal
// ---------------------------------------------------------------------------

#[test]
fn creation_inherits_the_parent_tags() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("a", "r1", "en", &["en"]));
    h.apply(disabled("a", &["en"]));
    h.apply(page("b", "a", "en", &["en"]));

    let tags = h.relation("b", "en").subtree_tags;
    assert!(tags.is_inherited(&SubtreeTag::disabled()));
    assert!(tags.explicit().is_empty());
    assert!(h.restrictions("en").contains(&pair("a", "b")));
}

#[test]
fn creation_below_a_missing_parent_fails() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    let err = h.try_apply(page("a", "nowhere", "en", &["en"])).unwrap_err();
    assert_eq!(err.inconsistency(), Some(&InconsistencyReason::TargetParentNodeMissing));
    assert_eq!(h.node_count(), 1);
}

#[test]
fn creation_before_a_sibling() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("b", "r1", "en", &["en"]));
    h.apply(page_before("a", "r1", "en", &["en"], Some("b")));
    assert_eq!(h.children("r1", "en"), vec!["a", "b"]);
}

#[test]
fn removal_is_exhaustive() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en", "de"]));
    h.apply(page("n1", "r1", "en", &["en", "de"]));
    h.apply(page("child", "n1", "en", &["en", "de"]));
    h.apply(disabled("n1", &["en", "de"]));
    let before = h.node_count();

    h.apply(removed("n1", &["de"]));
    let graph = h.graph();
    let remaining = graph
        .find_ingoing_hierarchy_relations_for_node_aggregate(&cs(LIVE), &agg("n1"), None)
        .unwrap();
    assert_eq!(remaining.keys().cloned().collect::<Vec<_>>(), vec![lang("en").hash()]);
    assert!(graph
        .find_node_in_aggregate(&cs(LIVE), &agg("child"), &lang("de"))
        .unwrap()
        .is_none());
    assert_eq!(h.node_count(), before);
    assert!(h.restrictions("de").is_empty());
    assert_eq!(h.restrictions("en").len(), 2);
    h.assert_consistent();

    h.apply(removed("n1", &["en"]));
    assert_eq!(h.node_count(), before - 2);
    assert_eq!(h.children("r1", "en"), Vec::<String>::new());
    assert!(h.restrictions("en").is_empty());
    h.assert_consistent();
}

#[test]
fn removal_in_a_fork_keeps_the_shared_record() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("n1", "r1", "en", &["en"]));
    h.apply(forked("cs-user", LIVE));
    let before = h.node_count();

    h.apply(ContentRepositoryEvent::NodeAggregateWasRemoved(NodeAggregateWasRemoved {
        content_stream_id: cs("cs-user"),
        node_aggregate_id: agg("n1"),
        affected_covered_dimension_space_points: points(&["en"]),
    }));

    assert_eq!(h.node_count(), before);
    assert!(h
        .graph()
        .find_node_in_aggregate(&cs("cs-user"), &agg("n1"), &lang("en"))
        .unwrap()
        .is_none());
    h.node("n1", "en");
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

#[test]
fn disabling_a_subtree_writes_restrictions_and_enabling_removes_them() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("c1", "r1", "en", &["en"]));

    h.apply(disabled("r1", &["en"]));
    assert_eq!(h.restrictions("en"), vec![pair("r1", "c1"), pair("r1", "r1")]);
    assert!(h.relation("r1", "en").subtree_tags.is_explicit(&SubtreeTag::disabled()));
    assert!(h.relation("c1", "en").subtree_tags.is_inherited(&SubtreeTag::disabled()));
    h.assert_consistent();

    h.apply(enabled("r1", &["en"]));
    assert!(h.restrictions("en").is_empty());
    assert!(h.relation("c1", "en").subtree_tags.is_empty());
    h.assert_consistent();
}

#[test]
fn disabling_twice_is_a_no_op() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("c1", "r1", "en", &["en"]));
    h.apply(disabled("r1", &["en"]));
    let once = h.restrictions("en");
    let tags_once = h.relation("c1", "en").subtree_tags;

    h.apply(disabled("r1", &["en"]));
    assert_eq!(h.restrictions("en"), once);
    assert_eq!(h.relation("c1", "en").subtree_tags, tags_once);
}

#[test]
fn untagging_keeps_tags_set_further_down() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("a", "r1", "en", &["en"]));
    h.apply(page("b", "a", "en", &["en"]));
    h.apply(page("c", "b", "en", &["en"]));
    h.apply(disabled("b", &["en"]));
    h.apply(disabled("a", &["en"]));

    h.apply(enabled("a", &["en"]));

    assert!(h.relation("b", "en").subtree_tags.is_explicit(&SubtreeTag::disabled()));
    assert!(h.relation("c", "en").subtree_tags.is_inherited(&SubtreeTag::disabled()));
    assert_eq!(h.restrictions("en"), vec![pair("b", "b"), pair("b", "c")]);
    h.assert_consistent();
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[test]
fn specialization_into_an_uncovered_point() {
    let mut h = Harness::new();
    let archived = SubtreeTag::new("archived").unwrap();
    h.apply(root("r1", &["en", "en-GB"]));
    h.apply(ContentRepositoryEvent::SubtreeWasTagged(tag_change(
        "r1",
        &["en-GB"],
        archived.clone(),
    )));
    h.apply(page("n1", "r1", "en", &["en"]));
    h.apply(page("target", "r1", "en", &["en"]));
    h.apply(references("n1", "en", &["target"]));
    let before = h.node_count();
    let source = h.node("n1", "en");

    h.apply(specialized("n1", "en", "en-GB", &["en-GB"]));

    assert_eq!(h.node_count(), before + 1);
    let variant = h.node("n1", "en-GB");
    assert_ne!(variant.relation_anchor_point, source.relation_anchor_point);
    assert_eq!(variant.origin_dimension_space_point, lang("en-GB"));
    let relation = h.relation("n1", "en-GB");
    assert_eq!(relation.parent_node_anchor, h.node("r1", "en-GB").relation_anchor_point);
    assert!(relation.subtree_tags.is_inherited(&archived));
    assert!(relation.subtree_tags.explicit().is_empty());

    let graph = h.graph();
    let copied = graph.find_references(variant.relation_anchor_point).unwrap();
    let original = graph.find_references(source.relation_anchor_point).unwrap();
    assert_eq!(copied.len(), original.len());
    assert_eq!(copied[0].destination_node_aggregate_id, agg("target"));
    assert_eq!(h.node("n1", "en").relation_anchor_point, source.relation_anchor_point);
    h.assert_consistent();
}

#[test]
fn specialization_rewires_a_point_that_shows_the_general_node() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en", "en-GB"]));
    h.apply(page("n1", "r1", "en", &["en", "en-GB"]));
    h.apply(page("child", "n1", "en", &["en", "en-GB"]));
    let source = h.node("n1", "en");

    h.apply(specialized("n1", "en", "en-GB", &["en-GB"]));

    let variant = h.node("n1", "en-GB");
    assert_ne!(variant.relation_anchor_point, source.relation_anchor_point);
    let covering = h
        .graph()
        .find_ingoing_hierarchy_relations_for_node_aggregate(
            &cs(LIVE),
            &agg("n1"),
            Some(&points(&["en-GB"])),
        )
        .unwrap();
    assert_eq!(covering.len(), 1);
    assert_eq!(h.children("n1", "en-GB"), vec!["child"]);
    let child = h.relation("child", "en-GB");
    assert_eq!(child.parent_node_anchor, variant.relation_anchor_point);
    assert_eq!(h.relation("child", "en").parent_node_anchor, source.relation_anchor_point);
    h.assert_consistent();
}

#[test]
fn generalization_and_peer_variants_cover_exactly_their_points() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en", "en-GB", "de", "fr"]));
    h.apply(page("n1", "r1", "en-GB", &["en-GB"]));

    h.apply(ContentRepositoryEvent::NodeGeneralizationVariantWasCreated(
        NodeGeneralizationVariantWasCreated {
            content_stream_id: cs(LIVE),
            node_aggregate_id: agg("n1"),
            source_origin: lang("en-GB"),
            generalization_origin: lang("en"),
            variant_succeeding_siblings: siblings(&["en"], None),
        },
    ));
    h.apply(ContentRepositoryEvent::NodePeerVariantWasCreated(NodePeerVariantWasCreated {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg("n1"),
        source_origin: lang("en"),
        peer_origin: lang("de"),
        peer_succeeding_siblings: siblings(&["de", "fr"], None),
    }));

    let covering = h
        .graph()
        .find_ingoing_hierarchy_relations_for_node_aggregate(&cs(LIVE), &agg("n1"), None)
        .unwrap();
    assert_eq!(covering.len(), 4);
    assert_eq!(h.node("n1", "en").origin_dimension_space_point, lang("en"));
    assert_eq!(h.node("n1", "en-GB").origin_dimension_space_point, lang("en-GB"));
    let peer = h.node("n1", "de");
    assert_eq!(peer.origin_dimension_space_point, lang("de"));
    assert_eq!(h.node("n1", "fr").relation_anchor_point, peer.relation_anchor_point);
    h.assert_consistent();
}

#[test]
fn variant_of_an_unknown_origin_fails() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en", "de"]));
    h.apply(page("n1", "r1", "en", &["en"]));
    let err = h.try_apply(specialized("n1", "de", "en", &["en"])).unwrap_err();
    assert_eq!(err.inconsistency(), Some(&InconsistencyReason::SourceNodeMissing));
}

// ---------------------------------------------------------------------------
// Content streams, copy on write, dimensions
// ---------------------------------------------------------------------------

#[test]
fn writes_in_a_fork_copy_the_shared_record() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("n1", "r1", "en", &["en"]));
    h.apply(page("child", "n1", "en", &["en"]));
    h.apply(references("n1", "en", &["child"]));
    h.apply(forked("cs-user", LIVE));
    let shared = h.node("n1", "en");

    h.apply(properties_set("cs-user", "n1", "en", "Draft"));

    let live = h.node("n1", "en");
    let user = h.node_in("cs-user", "n1", "en");
    assert_eq!(live, shared);
    assert_ne!(user.relation_anchor_point, shared.relation_anchor_point);
    assert_eq!(user.properties["title"], serde_json::json!("Draft"));
    assert!(user.last_modified_at.is_some());
    let child = h.node_in("cs-user", "child", "en");
    let relation = h
        .graph()
        .find_ingoing_hierarchy_relation(child.relation_anchor_point, &cs("cs-user"), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(relation.parent_node_anchor, user.relation_anchor_point);
    assert_eq!(h.graph().find_references(user.relation_anchor_point).unwrap().len(), 1);

    let before = h.node_count();
    h.apply(ContentRepositoryEvent::ContentStreamWasRemoved(ContentStreamWasRemoved {
        content_stream_id: cs("cs-user"),
    }));
    assert_eq!(h.node_count(), before - 1);
    let stream = h.graph().find_content_stream(&cs("cs-user")).unwrap().unwrap();
    assert!(stream.removed);
    h.assert_consistent();
}

#[test]
fn fork_of_a_missing_stream_fails_and_leaves_no_trace() {
    let mut h = Harness::new();
    let err = h.try_apply(forked("cs-user", "cs-nowhere")).unwrap_err();
    assert_eq!(err.inconsistency(), Some(&InconsistencyReason::ContentStreamMissing));
    assert!(h.graph().find_content_stream(&cs("cs-user")).unwrap().is_none());
}

#[test]
fn renaming_and_retyping_touch_every_record() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en", "de"]));
    h.apply(page("n1", "r1", "en", &["en"]));
    h.apply(ContentRepositoryEvent::NodePeerVariantWasCreated(NodePeerVariantWasCreated {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg("n1"),
        source_origin: lang("en"),
        peer_origin: lang("de"),
        peer_succeeding_siblings: siblings(&["de"], None),
    }));

    h.apply(ContentRepositoryEvent::NodeAggregateNameWasChanged(NodeAggregateNameWasChanged {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg("n1"),
        new_node_name: escr_types::NodeName::new("about").unwrap(),
    }));
    h.apply(ContentRepositoryEvent::NodeAggregateTypeWasChanged(NodeAggregateTypeWasChanged {
        content_stream_id: cs(LIVE),
        node_aggregate_id: agg("n1"),
        new_node_type_name: NodeTypeName::new("Acme:Landing").unwrap(),
    }));

    for point in ["en", "de"] {
        let node = h.node("n1", point);
        assert_eq!(node.node_name.as_ref().map(|n| n.as_str()), Some("about"));
        assert_eq!(node.node_type_name.as_str(), "Acme:Landing");
    }
    h.assert_consistent();
}

#[test]
fn root_dimensions_can_be_extended() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(ContentRepositoryEvent::RootNodeAggregateDimensionsWereUpdated(
        RootNodeAggregateDimensionsWereUpdated {
            content_stream_id: cs(LIVE),
            node_aggregate_id: agg("r1"),
            covered_dimension_space_points: points(&["en", "de"]),
        },
    ));
    assert_eq!(h.node("r1", "de").relation_anchor_point, h.node("r1", "en").relation_anchor_point);
    assert!(h.relation("r1", "de").parent_node_anchor.is_root_edge());
}

#[test]
fn shine_through_and_point_moves() {
    let mut h = Harness::new();
    h.apply(root("r1", &["en"]));
    h.apply(page("n1", "r1", "en", &["en"]));
    h.apply(disabled("n1", &["en"]));

    h.apply(ContentRepositoryEvent::DimensionShineThroughWasAdded(
        DimensionSpacePointAdjustment {
            content_stream_id: cs(LIVE),
            source: lang("en"),
            target: lang("en-GB"),
        },
    ));
    assert_eq!(h.node("n1", "en-GB"), h.node("n1", "en"));
    assert_eq!(h.restrictions("en-GB"), h.restrictions("en"));
    h.assert_consistent();

    h.apply(ContentRepositoryEvent::DimensionSpacePointWasMoved(
        DimensionSpacePointAdjustment {
            content_stream_id: cs(LIVE),
            source: lang("en"),
            target: lang("en-US"),
        },
    ));
    let node = h.node("n1", "en-US");
    assert_eq!(node.origin_dimension_space_point, lang("en-US"));
    assert!(h
        .graph()
        .find_node_in_aggregate(&cs(LIVE), &agg("n1"), &lang("en"))
        .unwrap()
        .is_none());
    assert!(h.restrictions("en").is_empty());
    assert_eq!(h.restrictions("en-US"), vec![pair("n1", "n1")]);
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

fn workspace(h: &Harness, name: &str) -> (WorkspaceStatus, String) {
    let record = h
        .graph()
        .find_workspace(&WorkspaceName::new(name).unwrap())
        .unwrap()
        .unwrap();
    (record.status, record.current_content_stream_id.to_string())
}

fn stream_status(h: &Harness, id: &str) -> ContentStreamStatus {
    h.graph().find_content_stream(&cs(id)).unwrap().unwrap().status
}

#[test]
fn publishing_outdates_dependents_and_conflicts_are_kept_apart() {
    let mut h = Harness::new();
    let ws = |name: &str| WorkspaceName::new(name).unwrap();
    h.apply(ContentRepositoryEvent::RootWorkspaceWasCreated(RootWorkspaceWasCreated {
        workspace_name: ws("live"),
        new_content_stream_id: cs(LIVE),
    }));
    for (name, base, stream) in [("user", "live", "cs-user"), ("review", "user", "cs-review")] {
        h.apply(forked(stream, LIVE));
        h.apply(ContentRepositoryEvent::WorkspaceWasCreated(WorkspaceWasCreated {
            workspace_name: ws(name),
            base_workspace_name: ws(base),
            new_content_stream_id: cs(stream),
        }));
    }
    assert_eq!(stream_status(&h, "cs-user"), ContentStreamStatus::InUseByWorkspace);

    h.apply(forked("cs-user-2", LIVE));
    h.apply(ContentRepositoryEvent::WorkspaceWasPublished(WorkspaceWasPublished {
        source_workspace_name: ws("user"),
        target_workspace_name: ws("live"),
        new_source_content_stream_id: cs("cs-user-2"),
        previous_source_content_stream_id: cs("cs-user"),
    }));
    assert_eq!(
        workspace(&h, "user"),
        (WorkspaceStatus::UpToDate, "cs-user-2".to_string())
    );
    assert_eq!(workspace(&h, "review").0, WorkspaceStatus::Outdated);
    assert_eq!(stream_status(&h, "cs-user"), ContentStreamStatus::NoLongerInUse);

    h.apply(forked("cs-review-2", "cs-user-2"));
    h.apply(ContentRepositoryEvent::WorkspaceRebaseFailed(WorkspaceRebaseFailed {
        workspace_name: ws("review"),
        candidate_content_stream_id: cs("cs-review-2"),
    }));
    assert_eq!(workspace(&h, "review").0, WorkspaceStatus::OutdatedConflict);
    assert_eq!(stream_status(&h, "cs-review-2"), ContentStreamStatus::RebaseError);

    h.apply(ContentRepositoryEvent::WorkspaceWasRemoved(WorkspaceWasRemoved {
        workspace_name: ws("review"),
    }));
    assert!(h.graph().find_workspace(&ws("review")).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Cache flushing during catch-up
// ---------------------------------------------------------------------------

fn envelopes(events: Vec<ContentRepositoryEvent>) -> Vec<EventEnvelope> {
    events
        .into_iter()
        .zip(1u64..)
        .map(|(event, seq)| EventEnvelope::new(seq, seq, event))
        .collect()
}

fn empty_projection() -> ContentGraphProjection {
    let projection =
        ContentGraphProjection::open_in_memory(TableNames::for_content_repository("test")).unwrap();
    projection.setup().unwrap();
    projection
}

#[test]
fn catch_up_flushes_old_and_new_location_of_a_moved_node() {
    let events = envelopes(vec![
        stream_created(LIVE),
        root("r1", &["en"]),
        page("a", "r1", "en", &["en"]),
        page("b", "r1", "en", &["en"]),
        page("c", "a", "en", &["en"]),
        moved("c", "en", Some("b"), None),
        removed("b", &["en"]),
    ]);
    let mut projection = empty_projection();
    CatchUp::new(&mut projection).run(&events[..5]).unwrap();

    let flusher = RecordingCacheFlusher::new();
    let report = CatchUp::new(&mut projection)
        .with_hook(CacheFlushingHook::new(flusher.clone()))
        .run(&events)
        .unwrap();
    assert_eq!(report.applied, 2);

    let flushed = flusher.flushed();
    for tag in [
        "Everything",
        "Node_%cs-live%_c",
        "DescendantOf_%cs-live%_a",
        "DescendantOf_%cs-live%_b",
        "DescendantOf_%cs-live%_r1",
        "Node_%cs-live%_b",
        "NodeType_%cs-live%_Acme:Page",
    ] {
        assert!(flushed.iter().any(|t| t == tag), "{tag} missing in {flushed:?}");
    }
    let mut unique = flushed.clone();
    unique.dedup();
    assert_eq!(unique.len(), flushed.len());
}

#[test]
fn discarding_flushes_the_workspace() {
    let ws = |name: &str| WorkspaceName::new(name).unwrap();
    let events = envelopes(vec![
        stream_created(LIVE),
        ContentRepositoryEvent::RootWorkspaceWasCreated(RootWorkspaceWasCreated {
            workspace_name: ws("live"),
            new_content_stream_id: cs(LIVE),
        }),
        forked("cs-user", LIVE),
        ContentRepositoryEvent::WorkspaceWasCreated(WorkspaceWasCreated {
            workspace_name: ws("user"),
            base_workspace_name: ws("live"),
            new_content_stream_id: cs("cs-user"),
        }),
        forked("cs-user-2", LIVE),
        ContentRepositoryEvent::WorkspaceWasDiscarded(WorkspaceContentStreamWasReplaced {
            workspace_name: ws("user"),
            new_content_stream_id: cs("cs-user-2"),
            previous_content_stream_id: cs("cs-user"),
        }),
    ]);
    let mut projection = empty_projection();
    let flusher = RecordingCacheFlusher::new();
    CatchUp::new(&mut projection)
        .with_hook(CacheFlushingHook::new(flusher.clone()))
        .run(&events)
        .unwrap();

    assert_eq!(flusher.flushed(), vec!["Everything", "Workspace_user"]);
    let user = projection.graph().find_workspace(&ws("user")).unwrap().unwrap();
    assert_eq!(user.current_content_stream_id, cs("cs-user-2"));
}

#[test]
fn disabled_cache_hook_flushes_nothing() {
    let events = envelopes(vec![
        stream_created(LIVE),
        root("r1", &["en"]),
        page("a", "r1", "en", &["en"]),
    ]);
    let mut projection = empty_projection();
    let flusher = RecordingCacheFlusher::new();
    let mut hook = CacheFlushingHook::new(flusher.clone());
    hook.set_enabled(false);
    CatchUp::new(&mut projection).with_hook(hook).run(&events).unwrap();
    assert!(flusher.flushed().is_empty());
}
