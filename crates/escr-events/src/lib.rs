//! Domain events for the content graph projection.
//!
//! Events are immutable facts committed by the write side. The projection
//! consumes them in strict sequence order, wrapped in an [`EventEnvelope`].
//! [`EventLog`] reads and writes JSON-lines files of envelopes, which is how
//! the command-line tool feeds a projection.

pub mod envelope;
pub mod error;
pub mod event;
pub mod log;

pub use envelope::EventEnvelope;
pub use error::{EventError, EventResult};
pub use event::*;
pub use log::EventLog;
