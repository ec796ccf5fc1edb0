use tracing::{debug, info, warn};

use escr_events::{ContentRepositoryEvent, EventEnvelope};
use escr_graph::{Checkpoints, ContentStreams, GraphDatabase, ProjectionContentGraph, TableNames};

use crate::config::ProjectionConfig;
use crate::context::EventContext;
use crate::error::ProjectionResult;
use crate::feature::{
    content_stream, dimension, node_creation, node_modification, node_move, node_removal,
    node_variation, subtree_tagging, workspace,
};

/// Name under which the checkpoint of this projection is stored.
pub const PROJECTION_NAME: &str = "contentgraph";

/// The content graph projection: applies events to the graph database, one
/// transaction per event, and tracks the last applied sequence number.
#[derive(Debug)]
pub struct ContentGraphProjection {
    db: GraphDatabase,
}

impl ContentGraphProjection {
    pub fn new(db: GraphDatabase) -> Self {
        Self { db }
    }

    /// Open the database named by `config`. The schema is not created.
    pub fn open(config: &ProjectionConfig) -> ProjectionResult<Self> {
        let db = GraphDatabase::open(&config.database_path, config.table_names())?;
        Ok(Self::new(db))
    }

    pub fn open_in_memory(tables: TableNames) -> ProjectionResult<Self> {
        Ok(Self::new(GraphDatabase::open_in_memory(tables)?))
    }

    pub fn setup(&self) -> ProjectionResult<()> {
        self.db.setup()?;
        info!(prefix = self.db.tables().prefix(), "content graph projection set up");
        Ok(())
    }

    pub fn reset(&mut self) -> ProjectionResult<()> {
        self.db.reset()?;
        Ok(())
    }

    pub fn checkpoint(&self) -> ProjectionResult<u64> {
        Ok(Checkpoints::get(
            self.db.connection(),
            self.db.tables(),
            PROJECTION_NAME,
        )?)
    }

    pub fn graph(&self) -> ProjectionContentGraph<'_> {
        self.db.graph()
    }

    pub fn database(&self) -> &GraphDatabase {
        &self.db
    }

    /// Apply one envelope. Returns `false` if it was at or below the
    /// checkpoint and therefore skipped.
    ///
    /// The event, the content stream version and the checkpoint are written
    /// in one transaction; on error nothing of the event remains.
    pub fn apply(&mut self, envelope: &EventEnvelope) -> ProjectionResult<bool> {
        let checkpoint = self.checkpoint()?;
        if envelope.sequence_number <= checkpoint {
            warn!(
                sequence_number = envelope.sequence_number,
                checkpoint,
                event = envelope.event.event_type(),
                "event already applied, skipping"
            );
            return Ok(false);
        }

        self.db.transactional(|tx, tables| {
            let ctx = EventContext {
                conn: tx,
                tables,
                recorded_at: envelope.recorded_at,
                event_type: envelope.event.event_type(),
            };
            dispatch(&ctx, &envelope.event)?;
            if let Some(content_stream_id) = envelope.event.content_stream_id() {
                ContentStreams::update_version(tx, tables, content_stream_id, envelope.version)?;
            }
            Checkpoints::update(tx, tables, PROJECTION_NAME, envelope.sequence_number)?;
            ProjectionResult::Ok(())
        })?;

        debug!(
            sequence_number = envelope.sequence_number,
            event = envelope.event.event_type(),
            content_stream = ?envelope.event.content_stream_id().map(|id| id.as_str()),
            "event applied"
        );
        Ok(true)
    }
}

fn dispatch(ctx: &EventContext<'_>, event: &ContentRepositoryEvent) -> ProjectionResult<()> {
    use ContentRepositoryEvent as E;

    match event {
        E::ContentStreamWasCreated(e) => content_stream::created(ctx, e),
        E::ContentStreamWasForked(e) => content_stream::forked(ctx, e),
        E::ContentStreamWasClosed(e) => content_stream::closed(ctx, e),
        E::ContentStreamWasReopened(e) => content_stream::reopened(ctx, e),
        E::ContentStreamWasRemoved(e) => content_stream::removed(ctx, e),

        E::RootWorkspaceWasCreated(e) => workspace::root_created(ctx, e),
        E::WorkspaceWasCreated(e) => workspace::created(ctx, e),
        E::WorkspaceBaseWorkspaceWasChanged(e) => workspace::base_changed(ctx, e),
        E::WorkspaceWasPublished(e) | E::WorkspaceWasPartiallyPublished(e) => {
            workspace::published(ctx, e)
        }
        E::WorkspaceWasDiscarded(e) => workspace::discarded(ctx, e, false),
        E::WorkspaceWasPartiallyDiscarded(e) => workspace::discarded(ctx, e, true),
        E::WorkspaceWasRebased(e) => workspace::rebased(ctx, e),
        E::WorkspaceRebaseFailed(e) => workspace::rebase_failed(ctx, e),
        E::WorkspaceWasRemoved(e) => workspace::removed(ctx, e),

        E::RootNodeAggregateWithNodeWasCreated(e) => node_creation::root_created(ctx, e),
        E::RootNodeAggregateDimensionsWereUpdated(e) => {
            node_creation::root_dimensions_updated(ctx, e)
        }
        E::NodeAggregateWithNodeWasCreated(e) => node_creation::created(ctx, e),
        E::NodePropertiesWereSet(e) => node_modification::properties_set(ctx, e),
        E::NodeReferencesWereSet(e) => node_modification::references_set(ctx, e),
        E::NodeAggregateNameWasChanged(e) => node_modification::name_changed(ctx, e),
        E::NodeAggregateTypeWasChanged(e) => node_modification::type_changed(ctx, e),

        E::NodeAggregateWasMoved(e) => node_move::moved(ctx, e),
        E::NodeAggregateWasRemoved(e) => node_removal::removed(ctx, e),

        E::NodeSpecializationVariantWasCreated(e) => node_variation::specialization_created(ctx, e),
        E::NodeGeneralizationVariantWasCreated(e) => node_variation::generalization_created(ctx, e),
        E::NodePeerVariantWasCreated(e) => node_variation::peer_created(ctx, e),

        E::SubtreeWasTagged(e) => subtree_tagging::tagged(ctx, e),
        E::SubtreeWasUntagged(e) => subtree_tagging::untagged(ctx, e),

        E::DimensionSpacePointWasMoved(e) => dimension::point_moved(ctx, e),
        E::DimensionShineThroughWasAdded(e) => dimension::shine_through_added(ctx, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InconsistencyReason, ProjectionError};
    use escr_events::{ContentStreamWasCreated, ContentStreamWasForked};
    use escr_types::ContentStreamId;

    fn projection() -> ContentGraphProjection {
        let projection =
            ContentGraphProjection::open_in_memory(TableNames::for_content_repository("test")).unwrap();
        projection.setup().unwrap();
        projection
    }

    fn cs(id: &str) -> ContentStreamId {
        ContentStreamId::new(id).unwrap()
    }

    fn created(seq: u64, version: u64, id: &str) -> EventEnvelope {
        EventEnvelope::new(
            seq,
            version,
            ContentRepositoryEvent::ContentStreamWasCreated(ContentStreamWasCreated {
                content_stream_id: cs(id),
            }),
        )
    }

    #[test]
    fn apply_advances_checkpoint_and_version() {
        let mut projection = projection();
        assert!(projection.apply(&created(1, 3, "cs-a")).unwrap());
        assert_eq!(projection.checkpoint().unwrap(), 1);
        let stream = projection.graph().find_content_stream(&cs("cs-a")).unwrap().unwrap();
        assert_eq!(stream.version, 3);
    }

    #[test]
    fn already_applied_envelope_is_skipped() {
        let mut projection = projection();
        projection.apply(&created(5, 0, "cs-a")).unwrap();
        assert!(!projection.apply(&created(5, 0, "cs-b")).unwrap());
        assert!(!projection.apply(&created(2, 0, "cs-c")).unwrap());
        assert!(projection.graph().find_content_stream(&cs("cs-b")).unwrap().is_none());
        assert_eq!(projection.checkpoint().unwrap(), 5);
    }

    #[test]
    fn failed_event_rolls_back_and_keeps_checkpoint() {
        let mut projection = projection();
        projection.apply(&created(1, 0, "cs-a")).unwrap();
        let fork = EventEnvelope::new(
            2,
            0,
            ContentRepositoryEvent::ContentStreamWasForked(ContentStreamWasForked {
                new_content_stream_id: cs("cs-b"),
                source_content_stream_id: cs("missing"),
                version_of_source_content_stream: 0,
            }),
        );
        let err = projection.apply(&fork).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::EventCouldNotBeApplied {
                reason: InconsistencyReason::ContentStreamMissing,
                ..
            }
        ));
        assert_eq!(projection.checkpoint().unwrap(), 1);
        assert!(projection.graph().find_content_stream(&cs("cs-b")).unwrap().is_none());
    }

    #[test]
    fn reset_clears_state() {
        let mut projection = projection();
        projection.apply(&created(1, 0, "cs-a")).unwrap();
        projection.reset().unwrap();
        assert_eq!(projection.checkpoint().unwrap(), 0);
        assert!(projection.graph().find_content_streams().unwrap().is_empty());
    }
}
