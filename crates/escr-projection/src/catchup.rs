use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use escr_events::EventEnvelope;

use crate::error::ProjectionResult;
use crate::hooks::CatchUpHook;
use crate::projection::ContentGraphProjection;

/// Shared flag that stops a catch-up between two events.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one catch-up run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    pub applied: u64,
    pub skipped: u64,
    pub cancelled: bool,
    /// Sequence number of the last committed event.
    pub checkpoint: u64,
}

/// Drives a projection over a sequence of envelopes, notifying hooks.
pub struct CatchUp<'a> {
    projection: &'a mut ContentGraphProjection,
    hooks: Vec<Box<dyn CatchUpHook + 'a>>,
    batch_size: usize,
    token: CancellationToken,
}

impl<'a> CatchUp<'a> {
    pub fn new(projection: &'a mut ContentGraphProjection) -> Self {
        Self {
            projection,
            hooks: Vec::new(),
            batch_size: 100,
            token: CancellationToken::new(),
        }
    }

    pub fn with_hook(mut self, hook: impl CatchUpHook + 'a) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Events between two `on_before_batch_completed` calls. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Apply every envelope above the checkpoint, in order.
    ///
    /// Stops early when the token is cancelled. A failing event or hook ends
    /// the run with its error; every event before it stays committed.
    pub fn run<'e>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'e EventEnvelope>,
    ) -> ProjectionResult<CatchUpReport> {
        let mut report = CatchUpReport {
            checkpoint: self.projection.checkpoint()?,
            ..CatchUpReport::default()
        };
        info!(checkpoint = report.checkpoint, hooks = self.hooks.len(), "catch-up started");
        for hook in &mut self.hooks {
            hook.on_before_catch_up()?;
        }

        let mut in_batch = 0usize;
        for envelope in envelopes {
            if self.token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if envelope.sequence_number <= report.checkpoint {
                report.skipped += 1;
                continue;
            }

            {
                let graph = self.projection.graph();
                for hook in &mut self.hooks {
                    hook.on_before_event(&graph, envelope)?;
                }
            }
            if !self.projection.apply(envelope)? {
                report.skipped += 1;
                continue;
            }
            report.applied += 1;
            report.checkpoint = envelope.sequence_number;
            {
                let graph = self.projection.graph();
                for hook in &mut self.hooks {
                    hook.on_after_event(&graph, envelope)?;
                }
            }

            in_batch += 1;
            if in_batch == self.batch_size {
                self.complete_batch()?;
                in_batch = 0;
            }
        }

        self.complete_batch()?;
        for hook in &mut self.hooks {
            hook.on_after_catch_up()?;
        }
        info!(
            applied = report.applied,
            skipped = report.skipped,
            cancelled = report.cancelled,
            checkpoint = report.checkpoint,
            "catch-up finished"
        );
        Ok(report)
    }

    fn complete_batch(&mut self) -> ProjectionResult<()> {
        debug!(hooks = self.hooks.len(), "batch completed");
        for hook in &mut self.hooks {
            hook.on_before_batch_completed()?;
        }
        Ok(())
    }
}
