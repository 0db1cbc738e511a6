//! Configures and constructs a [`crate::pool::ThreadPool`].
//!
//! Shaped directly after the teacher's `ThreadPoolBuilder`: a plain struct of
//! optional knobs, consumed by `build()`, with handler setters that box (here,
//! `Arc`, since handlers are shared with every worker rather than moved into
//! one) a closure.

use std::sync::Arc;

use crate::error::{ErrorKind, ThreadPoolBuildError};
use crate::pool::ThreadPool;
use crate::worker::{ExitHandler, PanicHandler, StartHandler};
use crate::worker_list::WorkerHandlers;

type NameFn = dyn Fn(usize) -> String + Send + Sync;

/// Builds a [`ThreadPool`] with a chosen worker count and optional
/// lifecycle/naming/stack-size customization.
#[derive(Default)]
pub struct ThreadPoolBuilder {
    num_threads: Option<usize>,
    name_fn: Option<Arc<NameFn>>,
    stack_size: Option<usize>,
    start_handler: Option<Arc<StartHandler>>,
    exit_handler: Option<Arc<ExitHandler>>,
    panic_handler: Option<Arc<PanicHandler>>,
}

impl ThreadPoolBuilder {
    pub fn new() -> Self {
        ThreadPoolBuilder::default()
    }

    /// Sets the number of worker threads. Values are clamped to at least 1
    /// at `build()` time; `0` or unset both mean "use `hardware_concurrency()`".
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    pub fn thread_name(mut self, f: impl Fn(usize) -> String + Send + Sync + 'static) -> Self {
        self.name_fn = Some(Arc::new(f));
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn start_handler(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.start_handler = Some(Arc::new(f));
        self
    }

    pub fn exit_handler(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.exit_handler = Some(Arc::new(f));
        self
    }

    pub fn panic_handler(
        mut self,
        f: impl Fn(Box<dyn std::any::Any + Send>) + Send + Sync + 'static,
    ) -> Self {
        self.panic_handler = Some(Arc::new(f));
        self
    }

    fn resolved_num_threads(&self) -> usize {
        match self.num_threads {
            Some(0) | None => crate::worker::Worker::hardware_concurrency().max(1),
            Some(n) => n,
        }
    }

    pub fn build(self) -> Result<ThreadPool, ThreadPoolBuildError> {
        let n_threads = self.resolved_num_threads();
        let handlers = WorkerHandlers {
            start: self.start_handler,
            exit: self.exit_handler,
            panic: self.panic_handler,
        };

        let pool = ThreadPool::with_workers(n_threads, self.name_fn, self.stack_size, handlers)?;
        if pool.len() == 0 {
            return Err(ThreadPoolBuildError::new(ErrorKind::NoThreadsAvailable));
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hardware_concurrency() {
        let pool = ThreadPoolBuilder::new().build().unwrap();
        assert_eq!(pool.len(), crate::worker::Worker::hardware_concurrency().max(1));
    }

    #[test]
    fn explicit_num_threads_is_honored() {
        let pool = ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn zero_num_threads_falls_back_to_hardware_concurrency() {
        let pool = ThreadPoolBuilder::new().num_threads(0).build().unwrap();
        assert_eq!(pool.len(), crate::worker::Worker::hardware_concurrency().max(1));
    }

    #[test]
    fn thread_name_is_applied() {
        let pool = ThreadPoolBuilder::new()
            .num_threads(2)
            .thread_name(|i| format!("tplmgr-test-{i}"))
            .build()
            .unwrap();
        assert_eq!(pool.len(), 2);
    }
}
