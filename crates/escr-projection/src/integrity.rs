use std::collections::{BTreeMap, BTreeSet};

use rusqlite::params;
use tracing::{info, warn};

use escr_graph::{HierarchyRelation, ProjectionContentGraph, RelationAnchorPoint};
use escr_types::ContentStreamId;

use crate::error::ProjectionResult;

/// Result of an integrity check over the whole projected graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

/// A specific integrity violation found in the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    HierarchyIntegrity,
    SiblingsNotDistinctlySorted,
    SubtreeTagsNotInherited,
    ReferenceIntegrity,
    DisconnectedFromRoot,
    AmbiguousNodeAggregateInSubgraph,
    MultipleParents,
    InconsistentNodeAggregateType,
    ChildCoverageNotSubsetOfParent,
    OriginNotCovered,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HierarchyIntegrity => "hierarchy-integrity",
            Self::SiblingsNotDistinctlySorted => "siblings-not-distinctly-sorted",
            Self::SubtreeTagsNotInherited => "subtree-tags-not-inherited",
            Self::ReferenceIntegrity => "reference-integrity",
            Self::DisconnectedFromRoot => "disconnected-from-root",
            Self::AmbiguousNodeAggregateInSubgraph => "ambiguous-node-aggregate-in-subgraph",
            Self::MultipleParents => "multiple-parents",
            Self::InconsistentNodeAggregateType => "inconsistent-node-aggregate-type",
            Self::ChildCoverageNotSubsetOfParent => "child-coverage-not-subset-of-parent",
            Self::OriginNotCovered => "origin-not-covered",
        }
    }
}

/// Checks the stored graph against the invariants the handlers maintain.
pub struct IntegrityViolationDetector;

impl IntegrityViolationDetector {
    pub fn run(graph: &ProjectionContentGraph<'_>) -> ProjectionResult<IntegrityReport> {
        let mut violations = Vec::new();
        sql_checks(graph, &mut violations)?;
        for stream in graph.find_content_streams()? {
            let relations = graph.find_hierarchy_relations_in_content_stream(&stream.id, None)?;
            structure_checks(&stream.id, &relations, &mut violations);
        }

        for violation in &violations {
            warn!(kind = violation.kind.as_str(), "{}", violation.description);
        }
        info!(violations = violations.len(), "integrity check finished");
        Ok(IntegrityReport { violations })
    }
}

/// Checks expressible as a single query. Each query yields one description
/// per offending row.
fn sql_checks(
    graph: &ProjectionContentGraph<'_>,
    violations: &mut Vec<Violation>,
) -> ProjectionResult<()> {
    let tables = graph.tables();
    let node = tables.node();
    let hierarchy = tables.hierarchy_relation();
    let reference = tables.reference_relation();

    let checks = [
        (
            ViolationKind::HierarchyIntegrity,
            format!(
                "SELECT 'relation ' || h.parentnodeanchor || ' -> ' || h.childnodeanchor
                    || ' in ' || h.contentstreamid || '/' || h.dimensionspacepointhash
                    || ' references a missing node'
                 FROM {hierarchy} h
                 WHERE NOT EXISTS (SELECT 1 FROM {node} c WHERE c.relationanchorpoint = h.childnodeanchor)
                    OR (h.parentnodeanchor != 0 AND NOT EXISTS (
                        SELECT 1 FROM {node} p WHERE p.relationanchorpoint = h.parentnodeanchor))"
            ),
        ),
        (
            ViolationKind::SiblingsNotDistinctlySorted,
            format!(
                "SELECT COUNT(*) || ' children of ' || parentnodeanchor || ' share position '
                    || position || ' in ' || contentstreamid || '/' || dimensionspacepointhash
                 FROM {hierarchy}
                 GROUP BY contentstreamid, dimensionspacepointhash, parentnodeanchor, position
                 HAVING COUNT(*) > 1"
            ),
        ),
        (
            ViolationKind::ReferenceIntegrity,
            format!(
                "SELECT 'reference ' || r.name || ' of missing node ' || r.nodeanchorpoint
                 FROM {reference} r
                 WHERE NOT EXISTS (SELECT 1 FROM {node} n WHERE n.relationanchorpoint = r.nodeanchorpoint)"
            ),
        ),
        (
            ViolationKind::AmbiguousNodeAggregateInSubgraph,
            format!(
                "SELECT 'aggregate ' || n.nodeaggregateid || ' covers ' || h.contentstreamid || '/'
                    || h.dimensionspacepointhash || ' ' || COUNT(*) || ' times'
                 FROM {hierarchy} h JOIN {node} n ON n.relationanchorpoint = h.childnodeanchor
                 GROUP BY h.contentstreamid, h.dimensionspacepointhash, n.nodeaggregateid
                 HAVING COUNT(*) > 1"
            ),
        ),
        (
            ViolationKind::MultipleParents,
            format!(
                "SELECT 'node ' || childnodeanchor || ' has ' || COUNT(DISTINCT parentnodeanchor)
                    || ' parents in ' || contentstreamid || '/' || dimensionspacepointhash
                 FROM {hierarchy}
                 GROUP BY contentstreamid, dimensionspacepointhash, childnodeanchor
                 HAVING COUNT(*) > 1"
            ),
        ),
        (
            ViolationKind::InconsistentNodeAggregateType,
            format!(
                "SELECT 'aggregate ' || n.nodeaggregateid || ' has '
                    || COUNT(DISTINCT n.nodetypename) || ' types in ' || h.contentstreamid
                 FROM {hierarchy} h JOIN {node} n ON n.relationanchorpoint = h.childnodeanchor
                 GROUP BY h.contentstreamid, n.nodeaggregateid
                 HAVING COUNT(DISTINCT n.nodetypename) > 1"
            ),
        ),
        (
            ViolationKind::ChildCoverageNotSubsetOfParent,
            format!(
                "SELECT 'node ' || h.childnodeanchor || ' is covered in ' || h.contentstreamid || '/'
                    || h.dimensionspacepointhash || ' but its parent ' || h.parentnodeanchor
                    || ' is not'
                 FROM {hierarchy} h
                 WHERE h.parentnodeanchor != 0 AND NOT EXISTS (
                    SELECT 1 FROM {hierarchy} p WHERE p.childnodeanchor = h.parentnodeanchor
                        AND p.contentstreamid = h.contentstreamid
                        AND p.dimensionspacepointhash = h.dimensionspacepointhash)"
            ),
        ),
        (
            ViolationKind::OriginNotCovered,
            format!(
                "SELECT DISTINCT 'node ' || n.relationanchorpoint || ' of ' || n.nodeaggregateid
                    || ' is not covered at its origin ' || n.origindimensionspacepoint
                    || ' in ' || h.contentstreamid
                 FROM {node} n JOIN {hierarchy} h ON h.childnodeanchor = n.relationanchorpoint
                 WHERE n.classification != 'root' AND NOT EXISTS (
                    SELECT 1 FROM {hierarchy} o WHERE o.childnodeanchor = n.relationanchorpoint
                        AND o.contentstreamid = h.contentstreamid
                        AND o.dimensionspacepointhash = n.origindimensionspacepointhash)"
            ),
        ),
    ];

    let conn = graph.connection();
    for (kind, sql) in checks {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![], |row| row.get::<_, String>(0))?;
        for description in rows {
            violations.push(Violation {
                kind,
                description: description?,
            });
        }
    }
    Ok(())
}

/// Checks that walk the hierarchy of one content stream.
fn structure_checks(
    content_stream_id: &ContentStreamId,
    relations: &[HierarchyRelation],
    violations: &mut Vec<Violation>,
) {
    let by_child: BTreeMap<(&str, RelationAnchorPoint), &HierarchyRelation> = relations
        .iter()
        .map(|r| ((r.dimension_space_point_hash(), r.child_node_anchor), r))
        .collect();

    for relation in relations {
        let point = relation.dimension_space_point_hash();
        if relation.parent_node_anchor.is_root_edge() {
            continue;
        }

        if let Some(parent) = by_child.get(&(point, relation.parent_node_anchor)) {
            let missing: Vec<String> = parent
                .subtree_tags
                .all()
                .difference(&relation.subtree_tags.all())
                .map(|tag| tag.to_string())
                .collect();
            if !missing.is_empty() {
                violations.push(Violation {
                    kind: ViolationKind::SubtreeTagsNotInherited,
                    description: format!(
                        "node {} in {content_stream_id}/{point} lacks tags {} of its parent",
                        relation.child_node_anchor,
                        missing.join(", ")
                    ),
                });
            }
        }

        let mut visited = BTreeSet::from([relation.child_node_anchor]);
        let mut current = relation.parent_node_anchor;
        let connected = loop {
            if current.is_root_edge() {
                break true;
            }
            if !visited.insert(current) {
                break false;
            }
            match by_child.get(&(point, current)) {
                Some(parent) => current = parent.parent_node_anchor,
                None => break false,
            }
        };
        if !connected {
            violations.push(Violation {
                kind: ViolationKind::DisconnectedFromRoot,
                description: format!(
                    "node {} in {content_stream_id}/{point} is not reachable from a root node",
                    relation.child_node_anchor
                ),
            });
        }
    }
}
