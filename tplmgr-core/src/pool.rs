//! The priority-queued, resizable thread pool itself: a [`WorkerList`] plus
//! pool-wide lifecycle state.
//!
//! Grounded directly on the original `thread_pool` class. Control-plane
//! operations (`suspend`/`resume`/`resize`/`close`) take `&mut self`: the
//! original documents (but cannot enforce) that only one thread drives these
//! transitions at a time, and the borrow checker gives that assumption teeth
//! here instead of leaving it as a comment. `schedule_task` and friends take
//! `&self`, since they only touch worker-owned state that is independently
//! synchronized one layer down.

use std::sync::Arc;

use crate::error::{ErrorKind, ThreadPoolBuildError};
use crate::log::log_event;
use crate::log::Event::*;
use crate::task::{Task, TaskPriority};
use crate::worker::ThreadState;
use crate::worker_list::{WorkerHandlers, WorkerList};

/// Pool-wide lifecycle state. Intentionally a plain enum, not an atomic:
/// the pool's control-plane methods require `&mut self`, so there is never
/// more than one writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalState {
    Closed,
    Waiting,
    Working,
}

/// A snapshot of pool occupancy, as returned by [`ThreadPool::collect_statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub pending_tasks: usize,
    pub waiting_workers: usize,
    pub working_workers: usize,
}

pub struct ThreadPool {
    workers: WorkerList,
    state: InternalState,
}

impl ThreadPool {
    /// Constructs a pool with exactly `n_threads` workers, already running.
    /// `n_threads` is expected to have already been resolved/clamped by the
    /// builder; this constructor does not itself apply a minimum.
    pub(crate) fn with_workers(
        n_threads: usize,
        name_fn: Option<Arc<dyn Fn(usize) -> String + Send + Sync>>,
        stack_size: Option<usize>,
        handlers: WorkerHandlers,
    ) -> Result<Self, ThreadPoolBuildError> {
        let mut workers = WorkerList::new(name_fn, stack_size, handlers);
        workers
            .try_grow(n_threads)
            .map_err(|err| ThreadPoolBuildError::new(ErrorKind::IoError(err)))?;

        Ok(ThreadPool {
            workers,
            state: InternalState::Working,
        })
    }

    fn select_ideal_worker(&self) -> Option<&crate::worker::Worker> {
        match self.state {
            InternalState::Closed => None,
            InternalState::Waiting => self.workers.select_fewest_pending(),
            InternalState::Working => self
                .workers
                .select_any_waiting()
                .or_else(|| self.workers.select_fewest_pending()),
        }
    }

    /// Schedules `task` at normal priority onto whichever worker is the best
    /// fit right now. Returns `false` if the pool is closed, if no worker
    /// exists (unreachable under the `len() >= 1` invariant while open, but
    /// handled defensively), or if the chosen worker's queue allocation
    /// fails.
    pub fn schedule_task(&self, func: crate::task::TaskFn, data: *mut ()) -> bool {
        self.schedule_task_with_priority(func, data, TaskPriority::Normal)
    }

    pub fn schedule_task_with_priority(
        &self,
        func: crate::task::TaskFn,
        data: *mut (),
        priority: TaskPriority,
    ) -> bool {
        if self.state == InternalState::Closed {
            return false;
        }

        let Some(worker) = self.select_ideal_worker() else {
            return false;
        };

        let task = Task::with_priority(func, data, priority);
        let scheduled = worker.schedule_task_with_priority(task);
        if scheduled {
            log_event(|| TaskScheduled {
                worker: worker.id(),
                priority: priority_label(priority),
            });
        }
        scheduled
    }

    /// Suspends every worker. Legal only from `Working`.
    pub fn suspend(&mut self) -> bool {
        if self.state != InternalState::Working {
            return false;
        }

        self.state = InternalState::Waiting;
        self.workers.for_each_mut(|worker| {
            worker.suspend();
        });
        true
    }

    /// Resumes every worker. Legal only from `Waiting`.
    pub fn resume(&mut self) -> bool {
        if self.state != InternalState::Waiting {
            return false;
        }

        self.state = InternalState::Working;
        self.workers.for_each_mut(|worker| {
            worker.resume();
        });
        true
    }

    /// Spawns `count` additional workers. Refuses when closed.
    pub fn increase_threads(&mut self, count: usize) -> bool {
        if self.state == InternalState::Closed {
            return false;
        }
        self.workers.grow(count)
    }

    /// Dismisses `count` workers. Refuses when closed, or if it would leave
    /// the pool with zero workers.
    pub fn decrease_threads(&mut self, count: usize) -> bool {
        if self.state == InternalState::Closed {
            return false;
        }
        if count >= self.workers.len() {
            return false;
        }
        self.workers.reduce(count)
    }

    /// Grows or shrinks to exactly `new_size` workers. Refuses when closed
    /// or `new_size == 0`; a no-op (returns `true`) if already that size.
    pub fn resize(&mut self, new_size: usize) -> bool {
        if self.state == InternalState::Closed || new_size == 0 {
            return false;
        }

        let old_size = self.workers.len();
        let changed = match new_size.cmp(&old_size) {
            std::cmp::Ordering::Equal => true,
            std::cmp::Ordering::Greater => self.increase_threads(new_size - old_size),
            std::cmp::Ordering::Less => self.decrease_threads(old_size - new_size),
        };

        if changed {
            log_event(|| PoolResized {
                old_size,
                new_size: self.workers.len(),
            });
        }
        changed
    }

    /// Closes the pool permanently, releasing every worker. Idempotent.
    pub fn close(&mut self) {
        if self.state == InternalState::Closed {
            return;
        }
        self.state = InternalState::Closed;
        self.workers.release();
        log_event(|| PoolClosed);
    }

    pub fn cancel_all_pending_tasks(&self) {
        if self.state == InternalState::Closed {
            return;
        }
        self.workers.for_each(|worker| worker.cancel_all_pending_tasks());
    }

    pub fn collect_statistics(&self) -> Statistics {
        if self.state == InternalState::Closed {
            return Statistics::default();
        }

        let mut stats = Statistics::default();
        self.workers.for_each(|worker| {
            stats.pending_tasks += worker.pending_tasks();
            if worker.state() == ThreadState::Waiting {
                stats.waiting_workers += 1;
            } else {
                stats.working_workers += 1;
            }
        });
        stats
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state == InternalState::Closed
    }

    pub fn is_waiting(&self) -> bool {
        self.state == InternalState::Waiting
    }

    pub fn is_working(&self) -> bool {
        self.state == InternalState::Working
    }

    pub fn contains_thread(&self, id: usize) -> bool {
        self.workers.select_by_id(id).is_some()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Lowest => "lowest",
        TaskPriority::Low => "low",
        TaskPriority::Normal => "normal",
        TaskPriority::High => "high",
        TaskPriority::Highest => "highest",
        TaskPriority::Idle => "idle",
    }
}
