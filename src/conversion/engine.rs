//! Per-task conversion pipeline.
//!
//! Drives a single task through decode -> encode against the configured
//! codec, mutating the task store as the side effect. Errors are caught
//! here and recorded on the task; they never propagate to the dispatcher
//! or to other tasks.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::ImageCodec;
use crate::error::{Error, Result};
use crate::state::{
    ConversionOutput, ConversionTask, TaskId, TaskStatus, TaskStore, PROGRESS_DECODE_DONE,
};

/// Bounded wait for the encode stage.
///
/// This is a race against a timer, not an abort signal: the underlying
/// encode keeps running on the blocking pool if the bound is exceeded, and
/// only its result is discarded.
pub const ENCODE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ConversionEngine {
    store: Arc<TaskStore>,
    codec: Arc<dyn ImageCodec>,
}

impl ConversionEngine {
    pub fn new(store: Arc<TaskStore>, codec: Arc<dyn ImageCodec>) -> Self {
        Self { store, codec }
    }

    /// Drive one task from `Pending`/`Failed` to a terminal state.
    ///
    /// No-op when the id no longer resolves or the task is already `Done`.
    pub async fn convert(&self, id: TaskId) {
        let Some(task) = self.store.get(id) else {
            tracing::debug!(%id, "conversion requested for unknown task");
            return;
        };
        if task.status == TaskStatus::Done {
            tracing::debug!(%id, "task already done, skipping");
            return;
        }

        // The store entry may have been removed between the snapshot above
        // and this transition; start_task reports that.
        if !self.store.start_task(id) {
            return;
        }

        if let Err(e) = self.run_pipeline(id, &task).await {
            self.store.fail_task(id, &e.to_string());
        }
    }

    async fn run_pipeline(&self, id: TaskId, task: &ConversionTask) -> Result<()> {
        let surface = self.codec.decode(&task.source.bytes).await?;

        self.store.update_progress(id, PROGRESS_DECODE_DONE);

        let encoded = match tokio::time::timeout(ENCODE_TIMEOUT, self.codec.encode(&surface)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout(ENCODE_TIMEOUT.as_secs())),
        };

        let output = ConversionOutput {
            file_name: task.output_file_name(self.codec.extension()),
            size: encoded.len() as u64,
            bytes: encoded,
        };
        self.store.complete_task(id, output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TaskEvent, PROGRESS_DECODE_STARTED};
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::DynamicImage;

    /// Scriptable codec: fail either stage, or stall the encode.
    #[derive(Default)]
    struct MockCodec {
        decode_fail: bool,
        encode_fail: bool,
        encode_delay: Option<Duration>,
    }

    #[async_trait]
    impl ImageCodec for MockCodec {
        async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage> {
            if self.decode_fail {
                return Err(Error::decode("unsupported image format"));
            }
            Ok(DynamicImage::new_rgba8(1, 1))
        }

        async fn encode(&self, _surface: &DynamicImage) -> Result<Bytes> {
            if let Some(delay) = self.encode_delay {
                tokio::time::sleep(delay).await;
            }
            if self.encode_fail {
                return Err(Error::encode("codec refused"));
            }
            Ok(Bytes::from_static(b"fake webp payload"))
        }

        fn extension(&self) -> &'static str {
            "webp"
        }
    }

    fn setup(codec: MockCodec) -> (Arc<TaskStore>, ConversionEngine) {
        let store = TaskStore::new();
        let engine = ConversionEngine::new(store.clone(), Arc::new(codec));
        (store, engine)
    }

    #[tokio::test]
    async fn successful_conversion_reaches_done() {
        let (store, engine) = setup(MockCodec::default());
        let task = store.add("photo.png", Bytes::from_static(b"src"));

        engine.convert(task.id).await;

        let task = store.get(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.progress, 100);
        let result = task.result.unwrap();
        assert_eq!(result.file_name, "photo.webp");
        assert_eq!(result.size, 17);
        assert!(task.error.is_none());
    }

    #[tokio::test]
    async fn progress_passes_through_stage_marks() {
        let (store, engine) = setup(MockCodec::default());
        let task = store.add("photo.png", Bytes::from_static(b"src"));
        let mut rx = store.subscribe();

        engine.convert(task.id).await;

        let mut progress_seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                TaskEvent::TaskStarted { .. } => progress_seen.push(PROGRESS_DECODE_STARTED),
                TaskEvent::TaskProgress { progress, .. } => progress_seen.push(progress),
                TaskEvent::TaskDone { .. } => progress_seen.push(100),
                _ => {}
            }
        }
        assert_eq!(
            progress_seen,
            vec![PROGRESS_DECODE_STARTED, PROGRESS_DECODE_DONE, 100]
        );
    }

    #[tokio::test]
    async fn decode_failure_keeps_decode_progress() {
        let (store, engine) = setup(MockCodec {
            decode_fail: true,
            ..Default::default()
        });
        let task = store.add("corrupt.png", Bytes::from_static(b"garbage"));

        engine.convert(task.id).await;

        let task = store.get(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, PROGRESS_DECODE_STARTED);
        assert_eq!(
            task.error.as_deref(),
            Some("decode error: unsupported image format")
        );
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn encode_failure_fails_task() {
        let (store, engine) = setup(MockCodec {
            encode_fail: true,
            ..Default::default()
        });
        let task = store.add("photo.png", Bytes::from_static(b"src"));

        engine.convert(task.id).await;

        let task = store.get(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, PROGRESS_DECODE_DONE);
        assert_eq!(task.error.as_deref(), Some("conversion failed: codec refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_encode_times_out_at_the_bound() {
        let (store, engine) = setup(MockCodec {
            encode_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let task = store.add("slow.png", Bytes::from_static(b"src"));

        let started = tokio::time::Instant::now();
        engine.convert(task.id).await;
        assert_eq!(started.elapsed(), ENCODE_TIMEOUT);

        let task = store.get(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.error.as_deref(),
            Some("conversion timed out after 15 seconds")
        );
    }

    #[tokio::test]
    async fn done_task_is_not_reconverted() {
        let (store, engine) = setup(MockCodec::default());
        let task = store.add("photo.png", Bytes::from_static(b"src"));

        engine.convert(task.id).await;
        let first = store.get(task.id).unwrap();

        engine.convert(task.id).await;
        let second = store.get(task.id).unwrap();

        assert_eq!(second.status, TaskStatus::Done);
        assert_eq!(second.completed_at, first.completed_at);
    }

    #[tokio::test]
    async fn failed_task_can_be_reconverted() {
        let (store, engine) = setup(MockCodec::default());
        let task = store.add("photo.png", Bytes::from_static(b"src"));
        store.start_task(task.id);
        store.fail_task(task.id, "decode error: earlier attempt");

        engine.convert(task.id).await;

        let task = store.get(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.error.is_none());
    }

    #[tokio::test]
    async fn unknown_id_is_a_noop() {
        let (store, engine) = setup(MockCodec::default());
        engine.convert(TaskId::new()).await;
        assert!(store.is_empty());
    }
}
