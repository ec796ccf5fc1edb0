use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::envelope::EventEnvelope;
use crate::error::{EventError, EventResult};

/// JSON-lines event log: one [`EventEnvelope`] per line.
///
/// Blank lines are ignored. Sequence numbers must strictly increase from
/// line to line.
pub struct EventLog;

impl EventLog {
    /// Read and validate every envelope in the file at `path`.
    pub fn read(path: &Path) -> EventResult<Vec<EventEnvelope>> {
        let file = File::open(path)?;
        let envelopes = Self::parse(BufReader::new(file))?;
        debug!(path = %path.display(), count = envelopes.len(), "event log read");
        Ok(envelopes)
    }

    /// Parse envelopes from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> EventResult<Vec<EventEnvelope>> {
        let mut envelopes: Vec<EventEnvelope> = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: EventEnvelope =
                serde_json::from_str(&line).map_err(|e| EventError::Malformed {
                    line: line_number,
                    message: e.to_string(),
                })?;
            if let Some(previous) = envelopes.last() {
                if envelope.sequence_number <= previous.sequence_number {
                    return Err(EventError::OutOfOrder {
                        line: line_number,
                        previous: previous.sequence_number,
                        found: envelope.sequence_number,
                    });
                }
            }
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    /// Append envelopes to the file at `path`, creating it if necessary.
    pub fn append(path: &Path, envelopes: &[EventEnvelope]) -> EventResult<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for envelope in envelopes {
            let line = serde_json::to_string(envelope)
                .map_err(|e| EventError::Serialization(e.to_string()))?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!(path = %path.display(), count = envelopes.len(), "event log appended");
        Ok(())
    }
}
