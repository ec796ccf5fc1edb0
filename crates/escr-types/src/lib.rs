//! Foundation types for the content graph projection.
//!
//! Every other crate in the workspace depends on `escr-types`.
//!
//! # Key Types
//!
//! - [`NodeAggregateId`] / [`ContentStreamId`] / [`WorkspaceName`]: validated identifiers
//! - [`DimensionSpacePoint`]: a coordinate in the dimension space, hashed for storage
//! - [`DimensionSpacePointSet`]: hash-keyed point sets used to scope every operation
//! - [`NodeTags`]: explicit and inherited subtree tags of a hierarchy relation
//! - [`InterdimensionalSiblings`]: per-point succeeding siblings for placement

pub mod dimension;
pub mod error;
pub mod ids;
pub mod siblings;
pub mod status;
pub mod tags;

pub use dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
pub use error::TypeError;
pub use ids::{ContentStreamId, NodeAggregateId, NodeName, NodeTypeName, ReferenceName, WorkspaceName};
pub use siblings::{InterdimensionalSibling, InterdimensionalSiblings};
pub use status::{ContentStreamStatus, NodeAggregateClassification, WorkspaceStatus};
pub use tags::{NodeTags, SubtreeTag, SubtreeTags};

/// Serialized node property values, keyed by property name.
pub type PropertyValues = std::collections::BTreeMap<String, serde_json::Value>;
