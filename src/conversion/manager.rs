//! Batch orchestration and the collaborator-facing command surface.
//!
//! The manager accepts submissions, fans conversion requests out over the
//! eligible tasks (fire-and-forget, no concurrency cap), and turns wave
//! settlement into a one-shot notification with a bounded display time.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;

use super::engine::ConversionEngine;
use super::settle::WaveTracker;
use crate::codec::{ImageCodec, WebpCodec};
use crate::error::{Error, Result};
use crate::export::{self, ExportedFile};
use crate::state::{ConversionTask, Notification, TaskEvent, TaskId, TaskStatus, TaskStore};

/// How long a settle notification stays visible before it auto-expires.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Conversion manager: owns the store, engine, and wave tracker.
pub struct ConversionManager {
    store: Arc<TaskStore>,
    engine: Arc<ConversionEngine>,
    tracker: Arc<WaveTracker>,
}

impl ConversionManager {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        let store = TaskStore::new();
        let engine = Arc::new(ConversionEngine::new(store.clone(), codec));
        Self {
            store,
            engine,
            tracker: Arc::new(WaveTracker::new()),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Accept one raw payload as a new `Pending` task.
    pub fn submit(&self, name: impl Into<String>, bytes: Bytes) -> ConversionTask {
        self.store.add(name, bytes)
    }

    /// Accept a batch of raw payloads, in order.
    pub fn submit_many(
        &self,
        files: impl IntoIterator<Item = (String, Bytes)>,
    ) -> Vec<ConversionTask> {
        files
            .into_iter()
            .map(|(name, bytes)| self.submit(name, bytes))
            .collect()
    }

    /// Dispatch every task that is `Pending` right now.
    ///
    /// The selection is a snapshot taken at call time; tasks added later
    /// need another `start_all`. Returns the number dispatched without
    /// waiting for any conversion to finish.
    pub fn start_all(&self) -> usize {
        let ids: Vec<TaskId> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();
        self.dispatch(ids)
    }

    /// Dispatch a single `Pending` or `Failed` task as a wave of one.
    ///
    /// A `Done` or already-`Converting` task is left alone.
    pub fn start_one(&self, id: TaskId) -> Result<()> {
        let task = self.store.get(id).ok_or(Error::TaskNotFound(id))?;
        match task.status {
            TaskStatus::Pending | TaskStatus::Failed => {
                self.dispatch(vec![id]);
            }
            TaskStatus::Done | TaskStatus::Converting => {
                tracing::debug!(%id, status = ?task.status, "start request ignored");
            }
        }
        Ok(())
    }

    /// Re-dispatch a `Failed` task under its original id.
    pub fn retry(&self, id: TaskId) -> Result<()> {
        let task = self.store.get(id).ok_or(Error::TaskNotFound(id))?;
        if task.status != TaskStatus::Failed {
            return Err(Error::InvalidStatus {
                id,
                expected: "failed",
            });
        }
        self.dispatch(vec![id]);
        Ok(())
    }

    /// Remove a task regardless of status.
    ///
    /// In-flight codec work for it is not cancelled; its late completion
    /// no-ops against the store.
    pub fn remove(&self, id: TaskId) -> bool {
        self.store.remove(id)
    }

    /// Empty the store and dismiss any live notification.
    pub fn clear_all(&self) {
        self.store.clear();
    }

    /// Export a single `Done` task's result bytes.
    pub fn export_one(&self, id: TaskId) -> Result<ExportedFile> {
        let task = self.store.get(id).ok_or(Error::TaskNotFound(id))?;
        export::export_one(&task)
    }

    /// Export every `Done` task in store order.
    pub fn export_all(&self) -> Vec<ExportedFile> {
        export::export_all(&self.store)
    }

    /// Ordered snapshot of all tasks.
    pub fn snapshot(&self) -> Vec<ConversionTask> {
        self.store.snapshot()
    }

    /// The currently displayed settle notification, if any.
    pub fn notification(&self) -> Option<Notification> {
        self.store.notification()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.store.subscribe()
    }

    /// Fan the given ids out as one wave, one spawned conversion each.
    ///
    /// Each spawned conversion reports back to the wave tracker exactly
    /// once, whichever way it ends.
    fn dispatch(&self, ids: Vec<TaskId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let count = ids.len();
        self.tracker.dispatched(count);
        tracing::info!(count, "dispatching conversion wave");

        for id in ids {
            let engine = self.engine.clone();
            let store = self.store.clone();
            let tracker = self.tracker.clone();
            tokio::spawn(async move {
                engine.convert(id).await;
                if tracker.settled() {
                    notify_settled(&store);
                }
            });
        }
        count
    }
}

impl Default for ConversionManager {
    fn default() -> Self {
        Self::new(Arc::new(WebpCodec))
    }
}

/// Emit the one-shot settle notification for a finished wave.
///
/// Fires only when the converting count is zero and at least one task is
/// `Done`; a wave that produced no successes is silent. The notification
/// expires after [`NOTIFICATION_TTL`] unless superseded first.
fn notify_settled(store: &Arc<TaskStore>) {
    let counts = store.counts();
    if counts.converting > 0 || counts.done == 0 {
        return;
    }

    let message = if counts.done == 1 {
        "Success! 1 image converted.".to_string()
    } else {
        format!("Success! {} images converted.", counts.done)
    };
    let seq = store.set_notification(message, counts.done);
    store.broadcast(TaskEvent::BatchSettled { done: counts.done });
    tracing::info!(done = counts.done, failed = counts.failed, "conversion wave settled");

    let store = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(NOTIFICATION_TTL).await;
        store.clear_notification_if(seq);
    });
}
