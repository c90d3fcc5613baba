use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Progress reported when a task enters the decode stage.
pub const PROGRESS_DECODE_STARTED: u8 = 30;
/// Progress reported once decode finishes and encode is pending.
pub const PROGRESS_DECODE_DONE: u8 = 70;

/// Unique identifier for a conversion task.
///
/// Assigned at creation and stable for the task's entire lifetime; removal
/// frees the slot but an id is never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TaskId> for Uuid {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Immutable original payload plus its declared name and byte size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Declared file name, extension included.
    pub name: String,
    /// Raw payload. Not part of observable snapshots.
    #[serde(skip)]
    pub bytes: Bytes,
    /// Payload size in bytes.
    pub size: u64,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self {
            name: name.into(),
            bytes,
            size,
        }
    }
}

/// Output payload of a finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Derived output name: source stem plus the target codec's extension.
    pub file_name: String,
    /// Encoded payload. Not part of observable snapshots.
    #[serde(skip)]
    pub bytes: Bytes,
    /// Encoded size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Converting,
    Done,
    Failed,
}

/// One unit of conversion work and its state.
///
/// Status only ever follows `Pending -> Converting -> {Done, Failed}`, with
/// `Failed -> Converting` allowed for manual retries. `result` is set iff
/// the task is `Done`, `error` iff it is `Failed`, and `progress` reaches
/// 100 only on `Done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionTask {
    pub id: TaskId,
    pub source: SourceFile,
    pub status: TaskStatus,
    /// Percentage in 0..=100, non-decreasing within one converting run.
    pub progress: u8,
    pub result: Option<ConversionOutput>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversionTask {
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            id: TaskId::new(),
            source: SourceFile::new(name, bytes),
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move into `Converting` at decode-started progress.
    ///
    /// Clears any previous failure so a retried task observes the same
    /// lifecycle as a fresh one.
    pub fn start(&mut self) {
        self.status = TaskStatus::Converting;
        self.progress = PROGRESS_DECODE_STARTED;
        self.error = None;
        self.completed_at = None;
    }

    /// Raise progress; lower values are ignored.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Terminal success: store the output and pin progress at 100.
    pub fn complete(&mut self, output: ConversionOutput) {
        self.status = TaskStatus::Done;
        self.progress = 100;
        self.result = Some(output);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal failure: record the reason, leaving progress where the
    /// pipeline stopped.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.to_string());
        self.result = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Done | TaskStatus::Failed)
    }

    /// Derived output filename for this task's source.
    pub fn output_file_name(&self, extension: &str) -> String {
        output_file_name(&self.source.name, extension)
    }

    /// Size reduction shown next to a finished conversion:
    /// `round((1 - result_size / source_size) * 100)`.
    ///
    /// Negative when the output grew. `None` unless the task is `Done`.
    pub fn savings_percent(&self) -> Option<i32> {
        let result = self.result.as_ref()?;
        if self.source.size == 0 {
            return None;
        }
        let ratio = result.size as f64 / self.source.size as f64;
        Some(((1.0 - ratio) * 100.0).round() as i32)
    }
}

/// Strip the source name's trailing extension and append `extension`.
///
/// Only a dot-free, non-empty tail counts as an extension, so
/// `archive.tar.gz` becomes `archive.tar.webp` and `noext` becomes
/// `noext.webp`.
pub fn output_file_name(name: &str, extension: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => {
            format!("{stem}.{extension}")
        }
        _ => format!("{name}.{extension}"),
    }
}

/// Per-status task counts over a store snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub converting: usize,
    pub done: usize,
    pub failed: usize,
}

/// One-shot aggregate notification emitted when a wave settles.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Human-readable summary ("Success! N images converted.").
    pub message: String,
    /// Number of `Done` tasks observed at settle time.
    pub done: usize,
    /// Expiry guard so a stale timer cannot clear a newer notification.
    #[serde(skip)]
    pub(crate) seq: u64,
}
