use escr_events::EventEnvelope;
use escr_graph::ProjectionContentGraph;

use crate::error::ProjectionResult;

/// Observer of a catch-up run.
///
/// Before-event callbacks see the graph as it was before the event, after-event
/// callbacks see it committed. A hook error aborts the run.
pub trait CatchUpHook: Send {
    fn on_before_catch_up(&mut self) -> ProjectionResult<()> {
        Ok(())
    }

    fn on_before_event(
        &mut self,
        _graph: &ProjectionContentGraph<'_>,
        _envelope: &EventEnvelope,
    ) -> ProjectionResult<()> {
        Ok(())
    }

    fn on_after_event(
        &mut self,
        _graph: &ProjectionContentGraph<'_>,
        _envelope: &EventEnvelope,
    ) -> ProjectionResult<()> {
        Ok(())
    }

    fn on_before_batch_completed(&mut self) -> ProjectionResult<()> {
        Ok(())
    }

    fn on_after_catch_up(&mut self) -> ProjectionResult<()> {
        Ok(())
    }
}

pub struct NoOpHook;

impl CatchUpHook for NoOpHook {}
