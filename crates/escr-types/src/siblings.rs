use serde::{Deserialize, Serialize};

use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet};
use crate::ids::NodeAggregateId;

/// The succeeding sibling of a node in one covered dimension space point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterdimensionalSibling {
    pub dimension_space_point: DimensionSpacePoint,
    /// `None` means "append as last child".
    pub node_aggregate_id: Option<NodeAggregateId>,
}

/// Per-point succeeding siblings. The points listed are exactly the coverage
/// a creation or variation event materializes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterdimensionalSiblings(Vec<InterdimensionalSibling>);

impl InterdimensionalSiblings {
    pub fn new(siblings: Vec<InterdimensionalSibling>) -> Self {
        Self(siblings)
    }

    /// Every point appends to the end of its parent's children.
    pub fn append_in(points: &DimensionSpacePointSet) -> Self {
        Self(
            points
                .iter()
                .map(|point| InterdimensionalSibling {
                    dimension_space_point: point.clone(),
                    node_aggregate_id: None,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterdimensionalSibling> {
        self.0.iter()
    }

    pub fn to_dimension_space_point_set(&self) -> DimensionSpacePointSet {
        self.0
            .iter()
            .map(|s| s.dimension_space_point.clone())
            .collect()
    }

    pub fn succeeding_sibling_in(&self, point: &DimensionSpacePoint) -> Option<&NodeAggregateId> {
        self.0
            .iter()
            .find(|s| s.dimension_space_point.hash() == point.hash())
            .and_then(|s| s.node_aggregate_id.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
