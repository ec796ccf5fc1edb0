//! The content graph projection.
//!
//! Applies content repository events to the SQLite graph maintained by
//! `escr-graph`, one transaction per event. Each handler enforces the
//! structural invariants of the graph and fails the event when the stored
//! state contradicts it; a failed event leaves no trace and halts catch-up.
//!
//! # Key Types
//!
//! - [`ContentGraphProjection`]: applies single envelopes and tracks the checkpoint
//! - [`CatchUp`]: replays a sequence of envelopes, notifying [`CatchUpHook`]s
//! - [`CacheFlushingHook`]: turns node changes into cache tags for a [`CacheFlusher`]
//! - [`IntegrityViolationDetector`]: checks a projected graph for broken invariants
//! - [`ProjectionConfig`]: TOML configuration of database, prefix and catch-up
//!
//! # Design Rules
//!
//! 1. An event either commits together with its checkpoint or not at all.
//! 2. Node records are shared between subgraphs and copied before a write
//!    that must not be seen by other content streams.
//! 3. Subtree tags of a relation always include every tag of its parent relation.
//! 4. Restriction relations mirror the `disabled` tag and are written idempotently.

pub mod cache;
pub mod catchup;
pub mod config;
mod context;
pub mod error;
mod feature;
pub mod hooks;
pub mod integrity;
pub mod projection;

#[cfg(test)]
mod scenarios;

pub use cache::{
    CacheFlusher, CacheFlushingHook, FlushNodeAggregateRequest, FlushWorkspaceRequest,
    RecordingCacheFlusher, TracingCacheFlusher,
};
pub use catchup::{CancellationToken, CatchUp, CatchUpReport};
pub use config::ProjectionConfig;
pub use error::{InconsistencyReason, ProjectionError, ProjectionResult};
pub use hooks::{CatchUpHook, NoOpHook};
pub use integrity::{IntegrityReport, IntegrityViolationDetector, Violation, ViolationKind};
pub use projection::{ContentGraphProjection, PROJECTION_NAME};
