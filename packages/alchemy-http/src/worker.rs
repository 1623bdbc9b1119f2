//! Where asynchronous executions run.

use std::thread;

use tracing::warn;

use crate::error::BoxError;

/// A unit of work submitted by an asynchronous execution.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted tasks.
///
/// Shared between all executions of a client, so implementations must accept
/// submissions from several threads at once.
pub trait Worker: Send + Sync {
    /// Schedule `task`. An error means the task was dropped without running.
    fn submit(&self, task: Task) -> Result<(), BoxError>;
}

/// Runs each task on its own OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadWorker {
    name: Option<String>,
}

impl ThreadWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the spawned threads, which shows up in panics and debuggers.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Worker for ThreadWorker {
    fn submit(&self, task: Task) -> Result<(), BoxError> {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }

        builder.spawn(task).map(drop).map_err(|e| {
            warn!(error = %e, "failed to spawn worker thread");
            e.into()
        })
    }
}

/// Runs each task immediately on the submitting thread.
///
/// Mostly useful in tests, where it makes asynchronous executions
/// deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineWorker;

impl Worker for InlineWorker {
    fn submit(&self, task: Task) -> Result<(), BoxError> {
        task();
        Ok(())
    }
}

/// Runs tasks on a tokio runtime's blocking pool.
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct TokioWorker {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "async")]
impl TokioWorker {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is currently running in.
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "async")]
impl Worker for TokioWorker {
    fn submit(&self, task: Task) -> Result<(), BoxError> {
        // Transport calls block, so keep them off the async worker threads.
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}
