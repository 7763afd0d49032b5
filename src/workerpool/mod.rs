//! Bounded-concurrency worker pool
//!
//! Runs a batch of independent tasks to completion with at most `C` of them
//! in flight. Every task is spawned onto the tokio runtime, so a task that
//! fails, panics or hangs until its own timeout only affects its own report.
//!
//! # Example
//!
//! ```no_run
//! use mirrorselect::workerpool::{Task, WorkerPool};
//!
//! # async fn example() {
//! let pool = WorkerPool::new(4);
//! let tasks = (0..10)
//!     .map(|i| Task::new(format!("task-{i}"), async move { Ok(i * 2) }))
//!     .collect();
//!
//! for report in pool.run(tasks).await {
//!     println!("{}: {:?}", report.label, report.result);
//! }
//! # }
//! ```

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors reported for a single task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task returned an error
    #[error("task failed: {0}")]
    Failed(String),

    /// The task panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled before it completed
    #[error("task cancelled")]
    Cancelled,
}

type BoxedTask<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'static>>;

/// A unit of work submitted to the pool
pub struct Task<T> {
    label: String,
    future: BoxedTask<T>,
}

impl<T> Task<T> {
    /// Wrap a future as a task
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: Box::pin(future),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Outcome of one task
#[derive(Debug, Clone)]
pub struct TaskReport<T> {
    /// Label given at submission
    pub label: String,
    /// Value or error produced by the task
    pub result: Result<T, TaskError>,
    /// Time from start to completion
    pub elapsed: Duration,
}

impl<T> TaskReport<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Worker pool running task batches with bounded concurrency
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool; a concurrency of 0 is treated as 1
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task exactly once and wait for all of them
    ///
    /// Reports come back in submission order, whatever the completion order
    /// was. An empty batch returns immediately.
    pub async fn run<T>(&self, tasks: Vec<Task<T>>) -> Vec<TaskReport<T>>
    where
        T: Send + 'static,
    {
        if tasks.is_empty() {
            return Vec::new();
        }

        let total = tasks.len();
        tracing::debug!(tasks = total, concurrency = self.concurrency, "Worker pool batch started");

        // buffer_unordered only pulls (and therefore spawns) a new task once
        // a slot is free, which bounds the number of running tasks.
        let mut reports: Vec<(usize, TaskReport<T>)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| async move {
                let Task { label, future } = task;
                let started = Instant::now();
                let result = match tokio::spawn(future).await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
                    Err(_) => Err(TaskError::Cancelled),
                };
                let report = TaskReport {
                    label,
                    result,
                    elapsed: started.elapsed(),
                };
                (index, report)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);

        let failed = reports.iter().filter(|(_, r)| !r.is_ok()).count();
        tracing::debug!(tasks = total, failed, "Worker pool batch finished");

        reports.into_iter().map(|(_, report)| report).collect()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
