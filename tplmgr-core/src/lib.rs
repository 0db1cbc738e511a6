//! Core engine for `tplmgr`: a priority-queued, resizable thread pool whose
//! workers can be individually or collectively suspended and resumed.
//!
//! This crate is the low-level half of the split; [`tplmgr`](https://docs.rs/tplmgr)
//! re-exports an ergonomic `spawn`/`spawn_with_priority` facade built on top
//! of the raw [`Task`] type exposed here.

mod alloc;
mod builder;
mod callback;
mod error;
mod log;
mod pool;
mod queue;
mod shared_queue;
mod task;
mod worker;
mod worker_list;

pub use alloc::{ByteAllocator, SystemAllocator};
pub use builder::ThreadPoolBuilder;
pub use callback::{CallbackStack, Event, EventCallback};
pub use error::{ErrorKind, ThreadPoolBuildError};
pub use pool::{Statistics, ThreadPool};
pub use task::{higher_priority, Task, TaskFn, TaskPriority};
pub use worker::{ExitHandler, PanicHandler, StartHandler, ThreadState, Worker};
