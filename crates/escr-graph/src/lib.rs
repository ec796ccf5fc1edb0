//! SQLite storage of the content graph.
//!
//! The graph is stored as node records connected by hierarchy relations, one
//! per content stream and dimension space point. Records are shared between
//! subgraphs until a write forces a copy.
//!
//! # Tables
//!
//! - node: one row per [`NodeRecord`], keyed by [`RelationAnchorPoint`]
//! - hierarchy relation: [`HierarchyRelation`] parent/child edges with position and subtree tags
//! - reference relation: named [`ReferenceRelation`]s from a record to an aggregate
//! - restriction relation: [`RestrictionRelation`]s derived from the `disabled` tag
//! - content stream / workspace: lifecycle state
//! - checkpoint: the last applied event, see [`Checkpoints`]
//!
//! # Design Rules
//!
//! 1. Write primitives take a `&Connection` so they run inside the caller's transaction.
//! 2. Reads go through [`ProjectionContentGraph`] and see uncommitted writes of the same transaction.
//! 3. Restriction inserts are idempotent.

pub mod accessor;
pub mod anchor;
pub mod content_stream;
pub mod database;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod position;
pub mod reference;
pub mod restriction;
mod row;
pub mod schema;
pub mod tables;
pub mod workspace;

pub use accessor::ProjectionContentGraph;
pub use anchor::RelationAnchorPoint;
pub use content_stream::{ContentStreamRecord, ContentStreams};
pub use database::{Checkpoints, GraphDatabase};
pub use error::{GraphError, GraphResult};
pub use hierarchy::{register_dimension_space_point, HierarchyRelation, HierarchyRelations};
pub use node::{NewNodeRecord, NodeRecord};
pub use position::{relation_position, PositionCandidate, RELATION_DEFAULT_OFFSET};
pub use reference::ReferenceRelation;
pub use restriction::{RestrictionRelation, RestrictionRelations};
pub use tables::TableNames;
pub use workspace::{WorkspaceRecord, Workspaces};
