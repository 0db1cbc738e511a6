//! The unit of work the pool and workers shuttle around.

/// Function pointer signature a scheduled task is invoked through. The data
/// pointer is opaque to the core; whoever schedules the task is responsible
/// for its validity and for any `Send` requirements on what it points to
/// (see [`crate::spawn`]-style helpers built on top of this crate, which pack
/// a boxed closure behind exactly this signature).
pub type TaskFn = unsafe fn(*mut ());

/// Relative scheduling priority. `Idle` is a sentinel, not a point on the
/// `Lowest..=Highest` scale: it always lands at the tail of a worker's queue
/// and is never reordered relative to anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TaskPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    Idle,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

/// A task value. Plain data, freely `Copy`-able; the core never dereferences
/// `data` itself.
#[derive(Clone, Copy)]
pub struct Task {
    pub func: TaskFn,
    pub data: *mut (),
    pub priority: TaskPriority,
}

// The core treats `data` as opaque and never touches it except to hand it
// back to `func` on the worker thread that popped it. Callers that schedule
// tasks across threads (every caller, in a thread pool) are required to
// uphold `Send` themselves; `spawn`/`spawn_with_priority` in the facade crate
// do this by only accepting `F: Send`.
unsafe impl Send for Task {}

impl Task {
    pub fn new(func: TaskFn, data: *mut ()) -> Self {
        Task {
            func,
            data,
            priority: TaskPriority::Normal,
        }
    }

    pub fn with_priority(func: TaskFn, data: *mut (), priority: TaskPriority) -> Self {
        Task {
            func,
            data,
            priority,
        }
    }

    /// # Safety
    /// `data` must be valid for whatever `func` expects to do with it, and
    /// this must be the only invocation of `func` on this `data` pointer.
    pub unsafe fn invoke(self) {
        (self.func)(self.data)
    }
}

/// Strict-greater-priority predicate used for stable priority insertion.
/// `Highest` overtakes `Normal`; equal priorities never overtake each other,
/// which is what preserves FIFO among equal-priority tasks.
pub fn higher_priority(candidate: &Task, existing: &Task) -> bool {
    (candidate.priority as u8) > (existing.priority as u8)
}
