//! Sibling ordering.
//!
//! Positions are integers with gaps of [`RELATION_DEFAULT_OFFSET`]. Inserting
//! before a sibling halves the gap to its predecessor; once a gap is used up
//! the siblings of that parent are renumbered.

use rusqlite::params;
use tracing::debug;

use escr_types::{ContentStreamId, DimensionSpacePoint};

use crate::accessor::ProjectionContentGraph;
use crate::anchor::RelationAnchorPoint;
use crate::error::{GraphError, GraphResult};

pub const RELATION_DEFAULT_OFFSET: i64 = 128;

/// A proposed position together with the neighbours it must sit between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionCandidate {
    pub position: i64,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl PositionCandidate {
    /// Whether the candidate lies strictly between its neighbours.
    pub fn fits(&self) -> bool {
        self.lower.map_or(true, |lower| self.position > lower)
            && self.upper.map_or(true, |upper| self.position < upper)
    }

    pub fn needs_recalculation(&self) -> bool {
        self.position % 2 != 0 || !self.fits()
    }
}

impl ProjectionContentGraph<'_> {
    /// Propose a position for a relation below `parent` (or below the current
    /// parent of `child`) that sorts right before `succeeding_sibling`, or
    /// after every sibling if there is none.
    pub fn determine_hierarchy_relation_position(
        &self,
        parent: Option<RelationAnchorPoint>,
        child: Option<RelationAnchorPoint>,
        succeeding_sibling: Option<RelationAnchorPoint>,
        content_stream_id: &ContentStreamId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<PositionCandidate> {
        let hierarchy = self.tables().hierarchy_relation();
        if let Some(sibling) = succeeding_sibling {
            let sibling_relation = self
                .find_ingoing_hierarchy_relation(sibling, content_stream_id, covered)?
                .ok_or_else(|| {
                    GraphError::Inconsistent(format!(
                        "succeeding sibling {sibling} is not part of subgraph {content_stream_id} {covered}"
                    ))
                })?;
            let preceding: Option<i64> = self.connection().query_row(
                &format!(
                    "SELECT MAX(position) FROM {hierarchy} WHERE parentnodeanchor = ?1
                        AND contentstreamid = ?2 AND dimensionspacepointhash = ?3
                        AND position < ?4"
                ),
                params![
                    sibling_relation.parent_node_anchor,
                    content_stream_id.as_str(),
                    covered.hash(),
                    sibling_relation.position
                ],
                |row| row.get(0),
            )?;
            let succeeding = sibling_relation.position;
            let position = match preceding {
                Some(preceding) => (preceding + succeeding) / 2,
                None => succeeding - RELATION_DEFAULT_OFFSET,
            };
            return Ok(PositionCandidate {
                position,
                lower: preceding,
                upper: Some(succeeding),
            });
        }

        let parent = self.resolve_parent(parent, child, content_stream_id, covered)?;
        let rightmost: Option<i64> = self.connection().query_row(
            &format!(
                "SELECT MAX(position) FROM {hierarchy} WHERE parentnodeanchor = ?1
                    AND contentstreamid = ?2 AND dimensionspacepointhash = ?3"
            ),
            params![parent, content_stream_id.as_str(), covered.hash()],
            |row| row.get(0),
        )?;
        Ok(PositionCandidate {
            position: rightmost.map_or(0, |p| p + RELATION_DEFAULT_OFFSET),
            lower: rightmost,
            upper: None,
        })
    }

    fn resolve_parent(
        &self,
        parent: Option<RelationAnchorPoint>,
        child: Option<RelationAnchorPoint>,
        content_stream_id: &ContentStreamId,
        covered: &DimensionSpacePoint,
    ) -> GraphResult<RelationAnchorPoint> {
        if let Some(parent) = parent {
            return Ok(parent);
        }
        let child = child.ok_or_else(|| {
            GraphError::Inconsistent(
                "cannot position a relation without parent or child anchor".to_string(),
            )
        })?;
        self.find_ingoing_hierarchy_relation(child, content_stream_id, covered)?
            .map(|relation| relation.parent_node_anchor)
            .ok_or_else(|| {
                GraphError::Inconsistent(format!(
                    "node {child} has no ingoing relation in subgraph {content_stream_id} {covered}"
                ))
            })
    }
}

/// Compute the final position of a relation, renumbering the siblings when
/// the proposed position does not fit.
pub fn relation_position(
    graph: &ProjectionContentGraph<'_>,
    parent: Option<RelationAnchorPoint>,
    child: Option<RelationAnchorPoint>,
    succeeding_sibling: Option<RelationAnchorPoint>,
    content_stream_id: &ContentStreamId,
    covered: &DimensionSpacePoint,
) -> GraphResult<i64> {
    let candidate = graph.determine_hierarchy_relation_position(
        parent,
        child,
        succeeding_sibling,
        content_stream_id,
        covered,
    )?;
    if !candidate.needs_recalculation() {
        return Ok(candidate.position);
    }
    recalculate(graph, parent, child, succeeding_sibling, content_stream_id, covered)
}

fn recalculate(
    graph: &ProjectionContentGraph<'_>,
    parent: Option<RelationAnchorPoint>,
    child: Option<RelationAnchorPoint>,
    succeeding_sibling: Option<RelationAnchorPoint>,
    content_stream_id: &ContentStreamId,
    covered: &DimensionSpacePoint,
) -> GraphResult<i64> {
    let sibling_parent = match succeeding_sibling {
        Some(sibling) => graph
            .find_ingoing_hierarchy_relation(sibling, content_stream_id, covered)?
            .map(|relation| relation.parent_node_anchor),
        None => None,
    };
    let parent = match sibling_parent {
        Some(parent) => parent,
        None => graph.resolve_parent(parent, child, content_stream_id, covered)?,
    };

    let mut offset = 0;
    let mut position = None;
    let siblings = graph.find_child_relations(parent, content_stream_id, covered)?;
    let renumbered = siblings.len();
    for mut relation in siblings {
        offset += RELATION_DEFAULT_OFFSET;
        if Some(relation.child_node_anchor) == succeeding_sibling {
            position = Some(offset);
            offset += RELATION_DEFAULT_OFFSET;
        }
        relation.assign_new_position(graph.connection(), graph.tables(), offset)?;
    }
    debug!(
        parent = %parent,
        dsp = covered.hash(),
        siblings = renumbered,
        "sibling positions recalculated"
    );
    Ok(position.unwrap_or(offset + RELATION_DEFAULT_OFFSET))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::GraphDatabase;
    use crate::hierarchy::HierarchyRelation;
    use crate::node::{NewNodeRecord, NodeRecord};
    use chrono::Utc;
    use escr_types::{NodeAggregateClassification, NodeAggregateId, NodeTags, NodeTypeName};
    use proptest::prelude::*;

    fn cs() -> ContentStreamId {
        ContentStreamId::new("cs").unwrap()
    }

    fn en() -> DimensionSpacePoint {
        DimensionSpacePoint::new([("language", "en")])
    }

    /// Helper to insert a node record and return its anchor.
    fn node(db: &GraphDatabase, id: &str) -> RelationAnchorPoint {
        NodeRecord::create(
            db.connection(),
            db.tables(),
            NewNodeRecord {
                node_aggregate_id: NodeAggregateId::new(id).unwrap(),
                origin_dimension_space_point: en(),
                node_type_name: NodeTypeName::new("Acme:Document").unwrap(),
                classification: NodeAggregateClassification::Regular,
                node_name: None,
                properties: Default::default(),
                created_at: Utc::now(),
            },
        )
        .unwrap()
        .relation_anchor_point
    }

    /// Helper to place a new child under `parent`, before `sibling` if given.
    fn place(
        db: &GraphDatabase,
        parent: RelationAnchorPoint,
        id: &str,
        sibling: Option<RelationAnchorPoint>,
    ) -> RelationAnchorPoint {
        let child = node(db, id);
        let position =
            relation_position(&db.graph(), Some(parent), None, sibling, &cs(), &en()).unwrap();
        HierarchyRelation {
            parent_node_anchor: parent,
            child_node_anchor: child,
            content_stream_id: cs(),
            dimension_space_point: en(),
            position,
            subtree_tags: NodeTags::empty(),
        }
        .add(db.connection(), db.tables())
        .unwrap();
        child
    }

    fn order(db: &GraphDatabase, parent: RelationAnchorPoint) -> Vec<RelationAnchorPoint> {
        db.graph()
            .find_child_relations(parent, &cs(), &en())
            .unwrap()
            .into_iter()
            .map(|r| r.child_node_anchor)
            .collect()
    }

    fn setup() -> (GraphDatabase, RelationAnchorPoint) {
        let db = GraphDatabase::open_in_memory(Default::default()).unwrap();
        db.setup().unwrap();
        let root = node(&db, "root");
        (db, root)
    }

    #[test]
    fn candidate_fits_between_neighbours() {
        let inside = PositionCandidate { position: 64, lower: Some(0), upper: Some(128) };
        assert!(inside.fits());
        assert!(!inside.needs_recalculation());

        let collapsed = PositionCandidate { position: 0, lower: Some(0), upper: Some(1) };
        assert!(!collapsed.fits());

        let odd = PositionCandidate { position: 127, lower: Some(126), upper: Some(128) };
        assert!(odd.fits());
        assert!(odd.needs_recalculation());
    }

    #[test]
    fn first_child_starts_at_zero_and_appends_by_offset() {
        let (db, root) = setup();
        let a = place(&db, root, "a", None);
        let b = place(&db, root, "b", None);
        let relations = db.graph().find_child_relations(root, &cs(), &en()).unwrap();
        assert_eq!(relations[0].position, 0);
        assert_eq!(relations[1].position, RELATION_DEFAULT_OFFSET);
        assert_eq!(order(&db, root), vec![a, b]);
    }

    #[test]
    fn insert_before_first_sibling_goes_below_it() {
        let (db, root) = setup();
        let a = place(&db, root, "a", None);
        let b = place(&db, root, "b", Some(a));
        let relations = db.graph().find_child_relations(root, &cs(), &en()).unwrap();
        assert_eq!(relations[0].position, -RELATION_DEFAULT_OFFSET);
        assert_eq!(order(&db, root), vec![b, a]);
    }

    #[test]
    fn exhausted_gap_triggers_renumbering() {
        let (db, root) = setup();
        let first = place(&db, root, "first", None);
        let last = place(&db, root, "last", None);
        let mut expected = vec![first];
        for i in 0..10 {
            expected.push(place(&db, root, &format!("n{i}"), Some(last)));
        }
        expected.push(last);
        assert_eq!(order(&db, root), expected);

        let positions: Vec<i64> = db
            .graph()
            .find_child_relations(root, &cs(), &en())
            .unwrap()
            .into_iter()
            .map(|r| r.position)
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_insert_sequence_keeps_siblings_strictly_ordered(
            picks in prop::collection::vec(prop::option::of(0usize..64), 1..40)
        ) {
            let (db, root) = setup();
            let mut model: Vec<RelationAnchorPoint> = Vec::new();
            for (i, pick) in picks.into_iter().enumerate() {
                let sibling_index = pick.filter(|_| !model.is_empty()).map(|p| p % model.len());
                let sibling = sibling_index.map(|idx| model[idx]);
                let child = place(&db, root, &format!("n{i}"), sibling);
                match sibling_index {
                    Some(idx) => model.insert(idx, child),
                    None => model.push(child),
                }
            }

            let relations = db.graph().find_child_relations(root, &cs(), &en()).unwrap();
            let positions: Vec<i64> = relations.iter().map(|r| r.position).collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            let actual: Vec<RelationAnchorPoint> =
                relations.into_iter().map(|r| r.child_node_anchor).collect();
            prop_assert_eq!(actual, model);
        }
    }
}
