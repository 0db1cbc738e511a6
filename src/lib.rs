//! `tplmgr`: an ergonomic facade over [`tplmgr_core`]'s priority-queued,
//! resizable thread pool.
//!
//! This mirrors how `rayon` sits atop `rayon-core`: the core crate deals in
//! raw function pointers and opaque data pointers so it can stay allocator-
//! and panic-transparent; this crate wraps that in a closure-based API that
//! feels like `std::thread::spawn`.

pub use tplmgr_core::{
    ByteAllocator, CallbackStack, ErrorKind, Event, EventCallback, ExitHandler, PanicHandler,
    Statistics, SystemAllocator, Task, TaskFn, TaskPriority, ThreadPool, ThreadPoolBuildError,
    ThreadPoolBuilder, ThreadState, Worker,
};

/// Submits `closure` to `pool` at normal priority. Returns `false` if the
/// pool is closed or the worker's queue allocation fails; in that case the
/// closure is dropped before this function returns.
pub fn spawn(pool: &ThreadPool, closure: impl FnOnce() + Send + 'static) -> bool {
    spawn_with_priority(pool, TaskPriority::Normal, closure)
}

/// Submits `closure` to `pool` at `priority`. See [`spawn`] for the
/// semantics of a `false` return.
pub fn spawn_with_priority(
    pool: &ThreadPool,
    priority: TaskPriority,
    closure: impl FnOnce() + Send + 'static,
) -> bool {
    let boxed: Box<dyn FnOnce() + Send + 'static> = Box::new(closure);
    let data = Box::into_raw(Box::new(boxed)) as *mut ();

    // SAFETY: `trampoline` expects exactly the pointer produced above, and
    // is only ever invoked once by the pool (tasks are popped and run
    // exactly once).
    if pool.schedule_task_with_priority(trampoline, data, priority) {
        true
    } else {
        // reclaim and drop the boxed closure; the pool never saw it run.
        drop(unsafe { Box::from_raw(data as *mut Box<dyn FnOnce() + Send + 'static>) });
        false
    }
}

unsafe fn trampoline(data: *mut ()) {
    let closure = Box::from_raw(data as *mut Box<dyn FnOnce() + Send + 'static>);
    (*closure)();
}
