//! Task store: the single source of truth for conversion state.
//!
//! The store owns the ordered sequence of [`ConversionTask`]s exclusively.
//! Collaborators and the pipeline observe snapshots and propose mutations;
//! every mutation goes through the store's lock as a find-entry-by-id
//! operation, so completions racing on different tasks never lose an
//! update, and a late completion for a removed id is a silent no-op.

mod types;

pub use types::*;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use bytes::Bytes;

/// Store event for observers (UI layers, SSE bridges, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was accepted into the store as `Pending`.
    TaskQueued { id: TaskId, name: String },
    /// A task entered `Converting`.
    TaskStarted { id: TaskId },
    /// A task's progress changed.
    TaskProgress { id: TaskId, progress: u8 },
    /// A task finished successfully.
    TaskDone { id: TaskId, result_size: u64 },
    /// A task reached `Failed`.
    TaskFailed { id: TaskId, error: String },
    /// A task was removed from the store.
    TaskRemoved { id: TaskId },
    /// The store was emptied.
    StoreCleared,
    /// A dispatched wave settled with at least one `Done` task.
    BatchSettled { done: usize },
}

pub struct TaskStore {
    tasks: RwLock<Vec<ConversionTask>>,
    notification: RwLock<Option<Notification>>,
    notification_seq: AtomicU64,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskStore {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            tasks: RwLock::new(Vec::new()),
            notification: RwLock::new(None),
            notification_seq: AtomicU64::new(0),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event to all subscribers.
    pub fn broadcast(&self, event: TaskEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("no subscribers for task event");
        }
    }

    /// Accept one raw payload as a new `Pending` task, appended to the end
    /// of the store. Duplicate names and byte-identical payloads are
    /// accepted as distinct tasks with distinct ids.
    pub fn add(&self, name: impl Into<String>, bytes: Bytes) -> ConversionTask {
        let task = ConversionTask::new(name, bytes);
        tracing::debug!(id = %task.id, name = %task.source.name, size = task.source.size, "task queued");
        self.tasks.write().push(task.clone());
        self.broadcast(TaskEvent::TaskQueued {
            id: task.id,
            name: task.source.name.clone(),
        });
        task
    }

    /// Ordered snapshot of all tasks.
    pub fn snapshot(&self) -> Vec<ConversionTask> {
        self.tasks.read().clone()
    }

    pub fn get(&self, id: TaskId) -> Option<ConversionTask> {
        self.tasks.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Per-status counts over the current snapshot.
    pub fn counts(&self) -> StatusCounts {
        let tasks = self.tasks.read();
        let mut counts = StatusCounts::default();
        for task in tasks.iter() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Converting => counts.converting += 1,
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Apply a mutation to the entry matching `id` under the write lock.
    ///
    /// Returns the updated task, or `None` when the id no longer resolves
    /// to a live entry (removed mid-flight).
    pub fn update<F>(&self, id: TaskId, f: F) -> Option<ConversionTask>
    where
        F: FnOnce(&mut ConversionTask),
    {
        let mut tasks = self.tasks.write();
        let task = tasks.iter_mut().find(|t| t.id == id)?;
        f(task);
        Some(task.clone())
    }

    /// Transition a task to `Converting` at decode-started progress.
    pub fn start_task(&self, id: TaskId) -> bool {
        match self.update(id, ConversionTask::start) {
            Some(_) => {
                tracing::debug!(%id, "task converting");
                self.broadcast(TaskEvent::TaskStarted { id });
                true
            }
            None => false,
        }
    }

    /// Raise a task's progress.
    pub fn update_progress(&self, id: TaskId, progress: u8) -> bool {
        match self.update(id, |t| t.set_progress(progress)) {
            Some(task) => {
                self.broadcast(TaskEvent::TaskProgress {
                    id,
                    progress: task.progress,
                });
                true
            }
            None => false,
        }
    }

    /// Record a successful conversion result on a task.
    pub fn complete_task(&self, id: TaskId, output: ConversionOutput) -> bool {
        let result_size = output.size;
        match self.update(id, |t| t.complete(output)) {
            Some(task) => {
                tracing::info!(%id, name = %task.source.name, result_size, "task done");
                self.broadcast(TaskEvent::TaskDone { id, result_size });
                true
            }
            None => {
                tracing::debug!(%id, "completion for removed task discarded");
                false
            }
        }
    }

    /// Record a failure on a task.
    pub fn fail_task(&self, id: TaskId, error: &str) -> bool {
        match self.update(id, |t| t.fail(error)) {
            Some(task) => {
                tracing::warn!(%id, name = %task.source.name, error, "task failed");
                self.broadcast(TaskEvent::TaskFailed {
                    id,
                    error: error.to_string(),
                });
                true
            }
            None => {
                tracing::debug!(%id, "failure for removed task discarded");
                false
            }
        }
    }

    /// Remove the task with the given id regardless of status, preserving
    /// the relative order of remaining tasks.
    pub fn remove(&self, id: TaskId) -> bool {
        let removed = {
            let mut tasks = self.tasks.write();
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            tasks.len() < before
        };
        if removed {
            tracing::debug!(%id, "task removed");
            self.broadcast(TaskEvent::TaskRemoved { id });
        }
        removed
    }

    /// Empty the store and dismiss any live notification.
    pub fn clear(&self) {
        self.tasks.write().clear();
        *self.notification.write() = None;
        self.broadcast(TaskEvent::StoreCleared);
    }

    /// Publish a settle notification, superseding any previous one.
    ///
    /// Returns the sequence number to hand to [`clear_notification_if`]
    /// when the display time is up.
    ///
    /// [`clear_notification_if`]: TaskStore::clear_notification_if
    pub fn set_notification(&self, message: impl Into<String>, done: usize) -> u64 {
        let seq = self.notification_seq.fetch_add(1, Ordering::SeqCst) + 1;
        *self.notification.write() = Some(Notification {
            message: message.into(),
            done,
            seq,
        });
        seq
    }

    /// Clear the notification only if `seq` still identifies it, so an
    /// expiry timer for a superseded notification does nothing.
    pub fn clear_notification_if(&self, seq: u64) {
        let mut notification = self.notification.write();
        if notification.as_ref().is_some_and(|n| n.seq == seq) {
            *notification = None;
        }
    }

    /// The currently displayed notification, if any.
    pub fn notification(&self) -> Option<Notification> {
        self.notification.read().clone()
    }
}
