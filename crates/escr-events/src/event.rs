use serde::{Deserialize, Serialize};

use escr_types::{
    ContentStreamId, ContentStreamStatus, DimensionSpacePoint, DimensionSpacePointSet,
    InterdimensionalSiblings, NodeAggregateClassification, NodeAggregateId, NodeName,
    NodeTypeName, OriginDimensionSpacePoint, PropertyValues, ReferenceName, SubtreeTag,
    WorkspaceName,
};

// ---- Content stream lifecycle ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasCreated {
    pub content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasForked {
    pub new_content_stream_id: ContentStreamId,
    pub source_content_stream_id: ContentStreamId,
    pub version_of_source_content_stream: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasClosed {
    pub content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasReopened {
    pub content_stream_id: ContentStreamId,
    pub previous_state: ContentStreamStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasRemoved {
    pub content_stream_id: ContentStreamId,
}

// ---- Workspace lifecycle ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootWorkspaceWasCreated {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasCreated {
    pub workspace_name: WorkspaceName,
    pub base_workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBaseWorkspaceWasChanged {
    pub workspace_name: WorkspaceName,
    pub base_workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

/// Shared by full and partial publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasPublished {
    pub source_workspace_name: WorkspaceName,
    pub target_workspace_name: WorkspaceName,
    pub new_source_content_stream_id: ContentStreamId,
    pub previous_source_content_stream_id: ContentStreamId,
}

/// Shared by full and partial discard, and by rebase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceContentStreamWasReplaced {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
    pub previous_content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRebaseFailed {
    pub workspace_name: WorkspaceName,
    pub candidate_content_stream_id: ContentStreamId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasRemoved {
    pub workspace_name: WorkspaceName,
}

// ---- Node creation and modification ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNodeAggregateWithNodeWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub covered_dimension_space_points: DimensionSpacePointSet,
    #[serde(default = "root_classification")]
    pub node_aggregate_classification: NodeAggregateClassification,
}

fn root_classification() -> NodeAggregateClassification {
    NodeAggregateClassification::Root
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNodeAggregateDimensionsWereUpdated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub covered_dimension_space_points: DimensionSpacePointSet,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWithNodeWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    /// The covered points, each with its optional succeeding sibling.
    pub succeeding_siblings_for_coverage: InterdimensionalSiblings,
    pub parent_node_aggregate_id: NodeAggregateId,
    #[serde(default)]
    pub node_name: Option<NodeName>,
    #[serde(default)]
    pub initial_property_values: PropertyValues,
    #[serde(default)]
    pub node_aggregate_classification: NodeAggregateClassification,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePropertiesWereSet {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    #[serde(default)]
    pub property_values: PropertyValues,
    #[serde(default)]
    pub properties_to_unset: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReference {
    pub target_node_aggregate_id: NodeAggregateId,
    #[serde(default)]
    pub properties: Option<PropertyValues>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReferencesWereSet {
    pub content_stream_id: ContentStreamId,
    pub source_node_aggregate_id: NodeAggregateId,
    pub affected_source_origin_dimension_space_points: Vec<OriginDimensionSpacePoint>,
    pub reference_name: ReferenceName,
    pub references: Vec<NodeReference>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateNameWasChanged {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub new_node_name: NodeName,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateTypeWasChanged {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub new_node_type_name: NodeTypeName,
}

// ---- Move and removal ----

/// Where the node covering one dimension space point ends up.
///
/// Without a new parent the node stays beneath its current parent (or the
/// succeeding sibling's parent, if one is given). Without a succeeding
/// sibling it is appended as the last child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMoveMapping {
    pub dimension_space_point: DimensionSpacePoint,
    #[serde(default)]
    pub new_parent_node_aggregate_id: Option<NodeAggregateId>,
    #[serde(default)]
    pub new_succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWasMoved {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub move_mappings: Vec<NodeMoveMapping>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWasRemoved {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub affected_covered_dimension_space_points: DimensionSpacePointSet,
}

// ---- Variation ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpecializationVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub specialization_origin: OriginDimensionSpacePoint,
    pub specialization_siblings: InterdimensionalSiblings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGeneralizationVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub generalization_origin: OriginDimensionSpacePoint,
    pub variant_succeeding_siblings: InterdimensionalSiblings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePeerVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub peer_origin: OriginDimensionSpacePoint,
    pub peer_succeeding_siblings: InterdimensionalSiblings,
}

// ---- Subtree tagging ----

/// Shared by tagging and untagging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeTagChange {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub affected_dimension_space_points: DimensionSpacePointSet,
    pub tag: SubtreeTag,
}

// ---- Dimension adjustment ----

/// Shared by dimension moves and shine-through additions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSpacePointAdjustment {
    pub content_stream_id: ContentStreamId,
    pub source: DimensionSpacePoint,
    pub target: DimensionSpacePoint,
}

/// Every event the content graph projection reacts to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentRepositoryEvent {
    ContentStreamWasCreated(ContentStreamWasCreated),
    ContentStreamWasForked(ContentStreamWasForked),
    ContentStreamWasClosed(ContentStreamWasClosed),
    ContentStreamWasReopened(ContentStreamWasReopened),
    ContentStreamWasRemoved(ContentStreamWasRemoved),

    RootWorkspaceWasCreated(RootWorkspaceWasCreated),
    WorkspaceWasCreated(WorkspaceWasCreated),
    WorkspaceBaseWorkspaceWasChanged(WorkspaceBaseWorkspaceWasChanged),
    WorkspaceWasPublished(WorkspaceWasPublished),
    WorkspaceWasPartiallyPublished(WorkspaceWasPublished),
    WorkspaceWasDiscarded(WorkspaceContentStreamWasReplaced),
    WorkspaceWasPartiallyDiscarded(WorkspaceContentStreamWasReplaced),
    WorkspaceWasRebased(WorkspaceContentStreamWasReplaced),
    WorkspaceRebaseFailed(WorkspaceRebaseFailed),
    WorkspaceWasRemoved(WorkspaceWasRemoved),

    RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated),
    RootNodeAggregateDimensionsWereUpdated(RootNodeAggregateDimensionsWereUpdated),
    NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated),
    NodePropertiesWereSet(NodePropertiesWereSet),
    NodeReferencesWereSet(NodeReferencesWereSet),
    NodeAggregateNameWasChanged(NodeAggregateNameWasChanged),
    NodeAggregateTypeWasChanged(NodeAggregateTypeWasChanged),

    NodeAggregateWasMoved(NodeAggregateWasMoved),
    NodeAggregateWasRemoved(NodeAggregateWasRemoved),

    NodeSpecializationVariantWasCreated(NodeSpecializationVariantWasCreated),
    NodeGeneralizationVariantWasCreated(NodeGeneralizationVariantWasCreated),
    NodePeerVariantWasCreated(NodePeerVariantWasCreated),

    SubtreeWasTagged(SubtreeTagChange),
    SubtreeWasUntagged(SubtreeTagChange),

    DimensionSpacePointWasMoved(DimensionSpacePointAdjustment),
    DimensionShineThroughWasAdded(DimensionSpacePointAdjustment),
}

impl ContentRepositoryEvent {
    /// The event type name as it appears in the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentStreamWasCreated(_) => "ContentStreamWasCreated",
            Self::ContentStreamWasForked(_) => "ContentStreamWasForked",
            Self::ContentStreamWasClosed(_) => "ContentStreamWasClosed",
            Self::ContentStreamWasReopened(_) => "ContentStreamWasReopened",
            Self::ContentStreamWasRemoved(_) => "ContentStreamWasRemoved",
            Self::RootWorkspaceWasCreated(_) => "RootWorkspaceWasCreated",
            Self::WorkspaceWasCreated(_) => "WorkspaceWasCreated",
            Self::WorkspaceBaseWorkspaceWasChanged(_) => "WorkspaceBaseWorkspaceWasChanged",
            Self::WorkspaceWasPublished(_) => "WorkspaceWasPublished",
            Self::WorkspaceWasPartiallyPublished(_) => "WorkspaceWasPartiallyPublished",
            Self::WorkspaceWasDiscarded(_) => "WorkspaceWasDiscarded",
            Self::WorkspaceWasPartiallyDiscarded(_) => "WorkspaceWasPartiallyDiscarded",
            Self::WorkspaceWasRebased(_) => "WorkspaceWasRebased",
            Self::WorkspaceRebaseFailed(_) => "WorkspaceRebaseFailed",
            Self::WorkspaceWasRemoved(_) => "WorkspaceWasRemoved",
            Self::RootNodeAggregateWithNodeWasCreated(_) => "RootNodeAggregateWithNodeWasCreated",
            Self::RootNodeAggregateDimensionsWereUpdated(_) => {
                "RootNodeAggregateDimensionsWereUpdated"
            }
            Self::NodeAggregateWithNodeWasCreated(_) => "NodeAggregateWithNodeWasCreated",
            Self::NodePropertiesWereSet(_) => "NodePropertiesWereSet",
            Self::NodeReferencesWereSet(_) => "NodeReferencesWereSet",
            Self::NodeAggregateNameWasChanged(_) => "NodeAggregateNameWasChanged",
            Self::NodeAggregateTypeWasChanged(_) => "NodeAggregateTypeWasChanged",
            Self::NodeAggregateWasMoved(_) => "NodeAggregateWasMoved",
            Self::NodeAggregateWasRemoved(_) => "NodeAggregateWasRemoved",
            Self::NodeSpecializationVariantWasCreated(_) => "NodeSpecializationVariantWasCreated",
            Self::NodeGeneralizationVariantWasCreated(_) => "NodeGeneralizationVariantWasCreated",
            Self::NodePeerVariantWasCreated(_) => "NodePeerVariantWasCreated",
            Self::SubtreeWasTagged(_) => "SubtreeWasTagged",
            Self::SubtreeWasUntagged(_) => "SubtreeWasUntagged",
            Self::DimensionSpacePointWasMoved(_) => "DimensionSpacePointWasMoved",
            Self::DimensionShineThroughWasAdded(_) => "DimensionShineThroughWasAdded",
        }
    }

    /// The content stream whose event stream this event belongs to.
    ///
    /// Workspace events live in workspace streams and return `None`.
    pub fn content_stream_id(&self) -> Option<&ContentStreamId> {
        match self {
            Self::ContentStreamWasCreated(e) => Some(&e.content_stream_id),
            Self::ContentStreamWasForked(e) => Some(&e.new_content_stream_id),
            Self::ContentStreamWasClosed(e) => Some(&e.content_stream_id),
            Self::ContentStreamWasReopened(e) => Some(&e.content_stream_id),
            Self::ContentStreamWasRemoved(e) => Some(&e.content_stream_id),
            Self::RootWorkspaceWasCreated(_)
            | Self::WorkspaceWasCreated(_)
            | Self::WorkspaceBaseWorkspaceWasChanged(_)
            | Self::WorkspaceWasPublished(_)
            | Self::WorkspaceWasPartiallyPublished(_)
            | Self::WorkspaceWasDiscarded(_)
            | Self::WorkspaceWasPartiallyDiscarded(_)
            | Self::WorkspaceWasRebased(_)
            | Self::WorkspaceRebaseFailed(_)
            | Self::WorkspaceWasRemoved(_) => None,
            Self::RootNodeAggregateWithNodeWasCreated(e) => Some(&e.content_stream_id),
            Self::RootNodeAggregateDimensionsWereUpdated(e) => Some(&e.content_stream_id),
            Self::NodeAggregateWithNodeWasCreated(e) => Some(&e.content_stream_id),
            Self::NodePropertiesWereSet(e) => Some(&e.content_stream_id),
            Self::NodeReferencesWereSet(e) => Some(&e.content_stream_id),
            Self::NodeAggregateNameWasChanged(e) => Some(&e.content_stream_id),
            Self::NodeAggregateTypeWasChanged(e) => Some(&e.content_stream_id),
            Self::NodeAggregateWasMoved(e) => Some(&e.content_stream_id),
            Self::NodeAggregateWasRemoved(e) => Some(&e.content_stream_id),
            Self::NodeSpecializationVariantWasCreated(e) => Some(&e.content_stream_id),
            Self::NodeGeneralizationVariantWasCreated(e) => Some(&e.content_stream_id),
            Self::NodePeerVariantWasCreated(e) => Some(&e.content_stream_id),
            Self::SubtreeWasTagged(e) | Self::SubtreeWasUntagged(e) => Some(&e.content_stream_id),
            Self::DimensionSpacePointWasMoved(e) | Self::DimensionShineThroughWasAdded(e) => {
                Some(&e.content_stream_id)
            }
        }
    }

    /// The node aggregate a node-level event is about, if any.
    pub fn node_aggregate_id(&self) -> Option<&NodeAggregateId> {
        match self {
            Self::RootNodeAggregateWithNodeWasCreated(e) => Some(&e.node_aggregate_id),
            Self::RootNodeAggregateDimensionsWereUpdated(e) => Some(&e.node_aggregate_id),
            Self::NodeAggregateWithNodeWasCreated(e) => Some(&e.node_aggregate_id),
            Self::NodePropertiesWereSet(e) => Some(&e.node_aggregate_id),
            Self::NodeReferencesWereSet(e) => Some(&e.source_node_aggregate_id),
            Self::NodeAggregateNameWasChanged(e) => Some(&e.node_aggregate_id),
            Self::NodeAggregateTypeWasChanged(e) => Some(&e.node_aggregate_id),
            Self::NodeAggregateWasMoved(e) => Some(&e.node_aggregate_id),
            Self::NodeAggregateWasRemoved(e) => Some(&e.node_aggregate_id),
            Self::NodeSpecializationVariantWasCreated(e) => Some(&e.node_aggregate_id),
            Self::NodeGeneralizationVariantWasCreated(e) => Some(&e.node_aggregate_id),
            Self::NodePeerVariantWasCreated(e) => Some(&e.node_aggregate_id),
            Self::SubtreeWasTagged(e) | Self::SubtreeWasUntagged(e) => Some(&e.node_aggregate_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs() -> ContentStreamId {
        ContentStreamId::new("cs-1").unwrap()
    }

    #[test]
    fn internally_tagged_json() {
        let event = ContentRepositoryEvent::ContentStreamWasCreated(ContentStreamWasCreated {
            content_stream_id: cs(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"ContentStreamWasCreated","contentStreamId":"cs-1"}"#);
    }

    #[test]
    fn parses_node_creation_with_defaults() {
        let json = r#"{
            "type": "NodeAggregateWithNodeWasCreated",
            "contentStreamId": "cs-1",
            "nodeAggregateId": "c1",
            "nodeTypeName": "Acme:Page",
            "originDimensionSpacePoint": {"language": "en"},
            "succeedingSiblingsForCoverage": [
                {"dimensionSpacePoint": {"language": "en"}, "nodeAggregateId": null}
            ],
            "parentNodeAggregateId": "r1"
        }"#;
        let event: ContentRepositoryEvent = serde_json::from_str(json).unwrap();
        let ContentRepositoryEvent::NodeAggregateWithNodeWasCreated(created) = &event else {
            panic!("unexpected variant");
        };
        assert!(created.node_name.is_none());
        assert!(created.initial_property_values.is_empty());
        assert_eq!(created.node_aggregate_classification, NodeAggregateClassification::Regular);
        assert_eq!(event.event_type(), "NodeAggregateWithNodeWasCreated");
        assert_eq!(event.content_stream_id(), Some(&cs()));
        assert_eq!(event.node_aggregate_id().map(|id| id.as_str()), Some("c1"));
    }

    #[test]
    fn workspace_events_have_no_content_stream() {
        let event = ContentRepositoryEvent::WorkspaceWasRemoved(WorkspaceWasRemoved {
            workspace_name: WorkspaceName::live(),
        });
        assert!(event.content_stream_id().is_none());
        assert!(event.node_aggregate_id().is_none());
    }

    #[test]
    fn root_node_defaults_to_root_classification() {
        let json = r#"{
            "type": "RootNodeAggregateWithNodeWasCreated",
            "contentStreamId": "cs-1",
            "nodeAggregateId": "r1",
            "nodeTypeName": "Neos.Neos:Sites",
            "coveredDimensionSpacePoints": [{"language": "en"}]
        }"#;
        let event: ContentRepositoryEvent = serde_json::from_str(json).unwrap();
        let ContentRepositoryEvent::RootNodeAggregateWithNodeWasCreated(root) = event else {
            panic!("unexpected variant");
        };
        assert_eq!(root.node_aggregate_classification, NodeAggregateClassification::Root);
    }

    #[test]
    fn unknown_event_type_fails() {
        let json = r#"{"type":"SomethingElse","contentStreamId":"cs-1"}"#;
        assert!(serde_json::from_str::<ContentRepositoryEvent>(json).is_err());
    }
}
