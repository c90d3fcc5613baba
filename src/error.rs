//! Unified error type for the webpforge pipeline.
//!
//! Every failure here is scoped to a single conversion task. The engine
//! catches errors at its boundary and records them on the task, so a failed
//! conversion never aborts the batch it was dispatched with.

use crate::state::TaskId;

/// Unified error type covering all failure modes in webpforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source bytes could not be interpreted as an image.
    #[error("decode error: {0}")]
    Decode(String),

    /// The target codec could not produce output (including empty output).
    #[error("conversion failed: {0}")]
    Encode(String),

    /// The encode stage did not complete within the allowed time.
    #[error("conversion timed out after {0} seconds")]
    Timeout(u64),

    /// The requested task does not exist in the store.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The requested operation needs the task to be in a different status.
    #[error("task {id} is not {expected}")]
    InvalidStatus {
        /// The task the operation was attempted on.
        id: TaskId,
        /// The status the operation requires (e.g. "done", "failed").
        expected: &'static str,
    },
}

impl Error {
    /// Convenience constructor for [`Error::Decode`].
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode(message.into())
    }

    /// Convenience constructor for [`Error::Encode`].
    pub fn encode(message: impl Into<String>) -> Self {
        Error::Encode(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_display() {
        let err = Error::decode("unsupported image format");
        assert_eq!(err.to_string(), "decode error: unsupported image format");
    }

    #[test]
    fn encode_display() {
        let err = Error::encode("codec produced no output");
        assert_eq!(err.to_string(), "conversion failed: codec produced no output");
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout(15);
        assert_eq!(err.to_string(), "conversion timed out after 15 seconds");
    }

    #[test]
    fn not_found_display() {
        let id = TaskId::new();
        let err = Error::TaskNotFound(id);
        assert_eq!(err.to_string(), format!("task not found: {id}"));
    }

    #[test]
    fn invalid_status_display() {
        let id = TaskId::new();
        let err = Error::InvalidStatus {
            id,
            expected: "done",
        };
        assert_eq!(err.to_string(), format!("task {id} is not done"));
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}
