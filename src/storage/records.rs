//! Typed JSON-lines access over an [`ArtifactStore`]
//!
//! Each log line is one independently parseable JSON record. Reading is
//! lazy and tolerant: a line that fails to parse is logged and skipped, and
//! the records before and after it are still yielded. Calling [`read_all`]
//! again restarts the sequence from the first line.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{error, warn};

use super::{ArtifactKey, ArtifactStore, LineIter, StorageError};

/// Serialize `record` as one compact JSON line and append it.
pub fn append_record<T: Serialize + ?Sized>(
    store: &dyn ArtifactStore,
    key: &ArtifactKey,
    record: &T,
) -> Result<(), StorageError> {
    let line =
        serde_json::to_string(record).map_err(|e| StorageError::Serialization(e.to_string()))?;

    store.append_line(key, &line).inspect_err(|e| {
        error!(artifact = ?key, error = %e, "Failed to append record");
    })
}

/// Open a lazy record sequence over a log artifact.
pub fn read_all<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    key: &ArtifactKey,
) -> Result<RecordStream<T>, StorageError> {
    Ok(RecordStream {
        key: key.clone(),
        lines: store.read_lines(key)?,
        line_no: 0,
        skipped: 0,
        _record: PhantomData,
    })
}

/// Iterator over the parseable records of one log artifact.
pub struct RecordStream<T> {
    key: ArtifactKey,
    lines: LineIter,
    line_no: usize,
    skipped: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordStream<T> {
    /// Lines skipped so far because they failed to parse.
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<T: DeserializeOwned> Iterator for RecordStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    // Read failures end the stream; what was read so far stands.
                    error!(artifact = ?self.key, error = %e, "Failed to read log");
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        artifact = ?self.key,
                        line = self.line_no,
                        error = %e,
                        "Skipping corrupt log line"
                    );
                }
            }
        }
    }
}
