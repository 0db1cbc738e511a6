//! A [`TaskQueue`] behind a reader/writer lock, safe to share between a
//! worker's own thread and whichever thread is scheduling tasks onto it.
//!
//! `parking_lot::RwLock` rather than `std::sync::RwLock`: it is smaller, does
//! not poison on panic (a panicking task must not wedge every other queue
//! accessor), and is the lock the pack's other thread-pool implementations
//! reach for in this exact spot.

use parking_lot::RwLock;

use crate::alloc::{ByteAllocator, SystemAllocator};
use crate::queue::{ReleasedChain, TaskQueue};
use crate::task::Task;

pub struct SharedQueue<A: ByteAllocator = SystemAllocator> {
    inner: RwLock<TaskQueue<A>>,
}

impl Default for SharedQueue<SystemAllocator> {
    fn default() -> Self {
        SharedQueue::new()
    }
}

impl SharedQueue<SystemAllocator> {
    pub fn new() -> Self {
        SharedQueue::with_allocator(SystemAllocator)
    }
}

impl<A: ByteAllocator> SharedQueue<A> {
    pub fn with_allocator(alloc: A) -> Self {
        SharedQueue {
            inner: RwLock::new(TaskQueue::with_allocator(alloc)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn max_size(&self) -> usize {
        self.inner.read().max_size()
    }

    pub fn is_full(&self) -> bool {
        self.inner.read().is_full()
    }

    pub fn front(&self) -> Option<Task> {
        self.inner.read().front()
    }

    pub fn push(&self, task: Task) -> bool {
        self.inner.write().push(task)
    }

    pub fn push_with_priority(&self, task: Task, pred: impl Fn(&Task, &Task) -> bool) -> bool {
        self.inner.write().push_with_priority(task, pred)
    }

    pub fn pop(&self) -> Option<Task> {
        self.inner.write().pop()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Drains `self` into `chain`-form and hands it to `other`, leaving `self`
    /// empty. Used when a worker is being torn down and its pending tasks
    /// must be redistributed rather than dropped (`ThreadPool::decrease_threads`).
    pub fn move_into(&self, other: &SharedQueue<A>) {
        let chain: ReleasedChain = self.inner.write().release();
        let mut other_inner = other.inner.write();
        let mut drained = other_inner.release();
        if drained.is_empty() {
            other_inner.assign(chain);
        } else {
            drained.append(chain);
            other_inner.assign(drained);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskPriority};
    use std::ptr;
    use std::sync::Arc;
    use std::thread;

    unsafe fn noop(_: *mut ()) {}

    fn tagged_task(tag: usize) -> Task {
        Task::with_priority(noop, tag as *mut (), TaskPriority::Normal)
    }

    #[test]
    fn push_and_pop_roundtrip() {
        let q: SharedQueue = SharedQueue::new();
        assert!(q.push(tagged_task(1)));
        assert!(q.push(tagged_task(2)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().unwrap().data as usize, 1);
        assert_eq!(q.pop().unwrap().data as usize, 2);
        assert!(q.pop().is_none());
    }

    #[test]
    fn concurrent_pushes_preserve_count() {
        let q = Arc::new(SharedQueue::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    q.push(tagged_task(t * 50 + i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 400);
        let mut seen = 0;
        while q.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 400);
    }

    #[test]
    fn move_into_transplants_tasks_without_loss() {
        let src: SharedQueue = SharedQueue::new();
        let dst: SharedQueue = SharedQueue::new();
        for i in 0..3 {
            src.push(tagged_task(i));
        }
        dst.push(tagged_task(99));

        src.move_into(&dst);

        assert!(src.is_empty());
        assert_eq!(dst.len(), 4);
        assert_eq!(dst.pop().unwrap().data as usize, 99);
        for i in 0..3 {
            assert_eq!(dst.pop().unwrap().data as usize, i);
        }
    }

    #[test]
    fn move_into_empty_destination() {
        let src: SharedQueue = SharedQueue::new();
        let dst: SharedQueue = SharedQueue::new();
        src.push(tagged_task(7));
        src.move_into(&dst);
        assert_eq!(dst.len(), 1);
        assert_eq!(dst.pop().unwrap().data as usize, 7);
    }

    #[test]
    fn front_does_not_remove() {
        let q: SharedQueue = SharedQueue::new();
        q.push(tagged_task(42));
        assert_eq!(q.front().unwrap().data as usize, 42);
        assert_eq!(q.len(), 1);
        let _ = ptr::null_mut::<()>();
    }
}
