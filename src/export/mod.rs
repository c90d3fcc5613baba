//! Result retrieval for finished conversions.
//!
//! Reads `Done` tasks out of the store and hands their result bytes to the
//! collaborator, tagged with the derived output filename. Nothing here
//! mutates task state.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::state::{ConversionTask, TaskStatus, TaskStore};

/// A finished conversion's bytes tagged with its output filename.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedFile {
    /// Source name with its extension replaced by the target codec's.
    pub file_name: String,
    /// Encoded payload. Not part of serialized listings.
    #[serde(skip)]
    pub bytes: Bytes,
    /// Payload size in bytes.
    pub size: u64,
}

/// Export a single task's result. Available only when the task is `Done`.
pub fn export_one(task: &ConversionTask) -> Result<ExportedFile> {
    if task.status != TaskStatus::Done {
        return Err(Error::InvalidStatus {
            id: task.id,
            expected: "done",
        });
    }
    let result = task.result.as_ref().ok_or(Error::InvalidStatus {
        id: task.id,
        expected: "done",
    })?;
    Ok(ExportedFile {
        file_name: result.file_name.clone(),
        bytes: result.bytes.clone(),
        size: result.size,
    })
}

/// Export every `Done` task in store order.
///
/// Tasks that are not `Done` are silently skipped; they are an expected
/// part of a mixed batch, not an error.
pub fn export_all(store: &TaskStore) -> Vec<ExportedFile> {
    store
        .snapshot()
        .iter()
        .filter_map(|task| export_one(task).ok())
        .collect()
}
