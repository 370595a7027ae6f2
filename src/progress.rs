//! Download progress tracking
//!
//! [`ProgressState`] is the one piece of state shared by all download workers.
//! It owns the aggregate counters, which are only ever touched through atomic
//! operations. Each running download holds a [`TaskProgress`] of its own and
//! folds into the aggregate when it finishes.

use crate::ProgressEvent;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback receiving progress events from any worker thread
pub type ProgressCallback<'a> = &'a (dyn Fn(ProgressEvent) + Sync);

/// Point-in-time view of the aggregate counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Downloads that finished successfully
    pub completed: usize,
    /// Episodes that ended with a contained failure
    pub failed: usize,
    /// Episodes that entered the download stage
    pub total: usize,
}

impl ProgressSnapshot {
    /// Episodes that have ended either way
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}

/// Shared aggregate progress of the download stage
///
/// `total` is fixed when the stage starts. Neither counter ever decreases and
/// their sum never exceeds `total`.
pub struct ProgressState<'a> {
    total: usize,
    settled: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    callback: ProgressCallback<'a>,
}

impl<'a> ProgressState<'a> {
    /// Creates the state for `total` episodes, reporting through `callback`
    pub fn new(total: usize, callback: ProgressCallback<'a>) -> Self {
        Self {
            total,
            settled: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            callback,
        }
    }

    /// Number of episodes that entered the download stage
    pub fn total(&self) -> usize {
        self.total
    }

    /// Current values of the aggregate counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            total: self.total,
        }
    }

    /// Registers a starting download and returns its exclusive progress handle
    pub fn start_task(&self, task: usize, label: impl Into<String>) -> TaskProgress<'_, 'a> {
        (self.callback)(ProgressEvent::DownloadStarted {
            task,
            total: self.total,
            label: label.into(),
        });

        TaskProgress {
            state: self,
            task,
            downloaded: 0,
            total_bytes: None,
            percent: Some(0.0),
        }
    }

    /// Records an episode that failed before or during its download
    pub fn record_failure(&self, task: usize) {
        self.settle(&self.failed);
        self.emit_finished(task, false);
    }

    fn record_completion(&self, task: usize) {
        self.settle(&self.completed);
        self.emit_finished(task, true);
    }

    /// Increments `counter` unless every episode has already settled
    fn settle(&self, counter: &AtomicUsize) {
        // A slot is reserved first so the two counters can never overshoot together
        let reserved = self
            .settled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.total).then_some(n + 1)
            })
            .is_ok();

        if reserved {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn emit_finished(&self, task: usize, success: bool) {
        let snapshot = self.snapshot();
        (self.callback)(ProgressEvent::DownloadFinished {
            task,
            success,
            completed: snapshot.completed,
            failed: snapshot.failed,
            total: snapshot.total,
        });
    }

    fn emit(&self, event: ProgressEvent) {
        (self.callback)(event);
    }
}

/// Progress of a single download, owned by the worker running it
pub struct TaskProgress<'s, 'a> {
    state: &'s ProgressState<'a>,
    task: usize,
    downloaded: u64,
    total_bytes: Option<u64>,
    percent: Option<f64>,
}

impl TaskProgress<'_, '_> {
    /// Index of the task within the download stage
    pub fn task(&self) -> usize {
        self.task
    }

    /// Bytes written so far
    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Current percentage, `None` while the total size is unknown
    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    /// Records the byte count after a chunk has been written
    pub fn update(&mut self, downloaded: u64, total_bytes: Option<u64>) {
        self.downloaded = downloaded;
        self.total_bytes = total_bytes;
        self.percent = percentage(downloaded, total_bytes);

        self.state.emit(ProgressEvent::DownloadProgress {
            task: self.task,
            downloaded,
            total_bytes,
            percent: self.percent,
        });
    }

    /// Marks the download complete and advances the aggregate counter
    pub fn finish(mut self) {
        if self.total_bytes.is_some() && self.percent != Some(100.0) {
            self.percent = Some(100.0);
            self.state.emit(ProgressEvent::DownloadProgress {
                task: self.task,
                downloaded: self.downloaded,
                total_bytes: self.total_bytes,
                percent: self.percent,
            });
        }
        self.state.record_completion(self.task);
    }

    /// Marks the download failed; it still counts towards the settled total
    pub fn fail(self) {
        self.state.record_failure(self.task);
    }
}

/// Computes `downloaded / total * 100`, clamped to 100
///
/// Returns `None` when the total size is unknown. A declared size of zero is
/// complete by definition.
pub fn percentage(downloaded: u64, total_bytes: Option<u64>) -> Option<f64> {
    match total_bytes {
        None => None,
        Some(0) => Some(100.0),
        Some(total) => Some((downloaded as f64 / total as f64 * 100.0).min(100.0)),
    }
}
