//! An intrusive, doubly-linked, unsynchronized priority queue of [`Task`]s.
//!
//! Nodes are owned by the queue and allocated through an injectable
//! [`ByteAllocator`] rather than `Box`, so that allocation failure is a
//! recoverable `bool` instead of an abort. Traversal uses raw, non-owning
//! `NonNull` pointers for `prev`/`next`; the queue itself holds the sole
//! owning reference to every node (via `first`/`last`), matching the
//! boxed-node-with-raw-traversal strategy called for by the source's
//! re-architecture notes.

use std::alloc::Layout;
use std::mem;
use std::ptr::{self, NonNull};

use crate::alloc::{ByteAllocator, SystemAllocator};
use crate::task::Task;

struct Node {
    value: Task,
    next: Option<NonNull<Node>>,
    prev: Option<NonNull<Node>>,
}

/// The released internal chain of a [`TaskQueue`], used to transplant storage
/// between queues (`release`/`assign`) without reallocating every node.
pub struct ReleasedChain {
    first: Option<NonNull<Node>>,
    last: Option<NonNull<Node>>,
    size: usize,
}

impl ReleasedChain {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Splices `other` onto the tail of `self`, consuming it.
    pub fn append(&mut self, other: ReleasedChain) {
        if other.first.is_none() {
            return;
        }
        match self.last {
            None => {
                self.first = other.first;
                self.last = other.last;
            }
            Some(mut tail) => {
                // SAFETY: both chains were produced by `TaskQueue::release` and own
                // disjoint, still-live nodes until spliced together here.
                unsafe {
                    tail.as_mut().next = other.first;
                    if let Some(mut other_first) = other.first {
                        other_first.as_mut().prev = Some(tail);
                    }
                }
                self.last = other.last;
            }
        }
        self.size += other.size;
    }
}

// SAFETY: a `ReleasedChain` exclusively owns the nodes it points to until
// `TaskQueue::assign` takes them back; moving that ownership across threads
// is sound.
unsafe impl Send for ReleasedChain {}

/// An unsynchronized, doubly-linked priority queue. See the module docs for
/// the ownership model. `TaskQueue` is generic over its allocator purely so
/// tests can inject failure; production code uses the default
/// [`SystemAllocator`].
pub struct TaskQueue<A: ByteAllocator = SystemAllocator> {
    first: Option<NonNull<Node>>,
    last: Option<NonNull<Node>>,
    size: usize,
    alloc: A,
}

impl Default for TaskQueue<SystemAllocator> {
    fn default() -> Self {
        TaskQueue::new()
    }
}

impl TaskQueue<SystemAllocator> {
    pub fn new() -> Self {
        TaskQueue::with_allocator(SystemAllocator)
    }
}

impl<A: ByteAllocator> TaskQueue<A> {
    pub fn with_allocator(alloc: A) -> Self {
        TaskQueue {
            first: None,
            last: None,
            size: 0,
            alloc,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        usize::MAX / mem::size_of::<Node>()
    }

    pub fn is_full(&self) -> bool {
        self.size == self.max_size()
    }

    /// Returns a copy of the head task, or `None` if the queue is empty.
    /// Never allocates, never fails.
    pub fn front(&self) -> Option<Task> {
        // SAFETY: `first`, when `Some`, always points to a live node owned by this queue.
        self.first.map(|node| unsafe { node.as_ref().value })
    }

    fn alloc_node(&self, value: Task) -> Option<NonNull<Node>> {
        let layout = Layout::new::<Node>();
        let raw = self.alloc.allocate(layout)?;
        let ptr = raw.cast::<Node>();
        // SAFETY: `ptr` is freshly allocated, properly aligned storage for `Node`.
        unsafe {
            ptr::write(
                ptr.as_ptr(),
                Node {
                    value,
                    next: None,
                    prev: None,
                },
            );
        }
        Some(ptr)
    }

    /// # Safety (internal)
    /// `node` must have been produced by `alloc_node` on this queue's
    /// allocator and must not still be linked into the chain.
    unsafe fn free_node(&self, node: NonNull<Node>) {
        ptr::drop_in_place(node.as_ptr());
        self.alloc
            .deallocate(node.cast::<u8>(), Layout::new::<Node>());
    }

    /// Appends at the tail. Returns `false` on allocator failure, leaving the
    /// queue unchanged.
    pub fn push(&mut self, task: Task) -> bool {
        let Some(mut node) = self.alloc_node(task) else {
            return false;
        };

        match self.last {
            None => {
                self.first = Some(node);
                self.last = Some(node);
            }
            Some(mut last) => {
                // SAFETY: `last` is a live node owned by this queue.
                unsafe {
                    node.as_mut().prev = Some(last);
                    last.as_mut().next = Some(node);
                }
                self.last = Some(node);
            }
        }

        self.size += 1;
        debug_assert!(self.invariants_hold());
        true
    }

    /// Stable priority insertion: walks back from the tail while `pred(new,
    /// candidate)` holds, then inserts just after the last element that is
    /// not strictly lower priority. See module docs / spec for the full
    /// derivation; this mirrors the source's three-way case split on queue
    /// size for clarity even though the `size >= 2` branch alone would
    /// technically cover all cases.
    pub fn push_with_priority(
        &mut self,
        task: Task,
        pred: impl Fn(&Task, &Task) -> bool,
    ) -> bool {
        let Some(mut node) = self.alloc_node(task) else {
            return false;
        };

        match self.size {
            0 => {
                self.first = Some(node);
                self.last = Some(node);
            }
            1 => {
                // SAFETY: the single existing node is live and owned by this queue.
                let head = self.first.unwrap();
                if pred(&task, unsafe { &head.as_ref().value }) {
                    self.link_before(head, node);
                    self.first = Some(node);
                } else {
                    self.link_after(head, node);
                    self.last = Some(node);
                }
            }
            _ => {
                let mut cursor = self.last.unwrap();
                loop {
                    // SAFETY: `cursor` is always a live node owned by this queue.
                    let cursor_ref = unsafe { cursor.as_ref() };
                    if let Some(prev) = cursor_ref.prev {
                        if pred(&task, &cursor_ref.value) {
                            cursor = prev;
                            continue;
                        }
                    }
                    break;
                }

                let cursor_value = unsafe { cursor.as_ref().value };
                if pred(&task, &cursor_value) {
                    let before = unsafe { cursor.as_ref().prev };
                    match before {
                        Some(_) => self.link_between(before, Some(cursor), node),
                        None => {
                            self.link_before(cursor, node);
                            self.first = Some(node);
                        }
                    }
                } else {
                    let after = unsafe { cursor.as_ref().next };
                    match after {
                        Some(_) => self.link_between(Some(cursor), after, node),
                        None => {
                            self.link_after(cursor, node);
                            self.last = Some(node);
                        }
                    }
                }

                // The branches above handle every combination; make sure the
                // unused-mut warning doesn't fire for `node` on the `_ => {}` path.
                let _ = &mut node;
            }
        }

        self.size += 1;
        debug_assert!(self.invariants_hold());
        true
    }

    /// Links `node` in directly before `at`, which must currently have no `prev`
    /// set by the caller's chosen position (caller updates `self.first` if needed).
    fn link_before(&mut self, mut at: NonNull<Node>, mut node: NonNull<Node>) {
        unsafe {
            let before = at.as_ref().prev;
            node.as_mut().prev = before;
            node.as_mut().next = Some(at);
            at.as_mut().prev = Some(node);
            if let Some(mut before) = before {
                before.as_mut().next = Some(node);
            }
        }
    }

    /// Links `node` in directly after `at` (caller updates `self.last` if needed).
    fn link_after(&mut self, mut at: NonNull<Node>, mut node: NonNull<Node>) {
        unsafe {
            let after = at.as_ref().next;
            node.as_mut().next = after;
            node.as_mut().prev = Some(at);
            at.as_mut().next = Some(node);
            if let Some(mut after) = after {
                after.as_mut().prev = Some(node);
            }
        }
    }

    /// Splices `node` strictly between `before` and `after`, both of which
    /// must already be adjacent to one another (or one may be `None` to mean
    /// "queue end", but this helper is only used when both are `Some`).
    fn link_between(
        &mut self,
        before: Option<NonNull<Node>>,
        after: Option<NonNull<Node>>,
        mut node: NonNull<Node>,
    ) {
        unsafe {
            node.as_mut().prev = before;
            node.as_mut().next = after;
            if let Some(mut before) = before {
                before.as_mut().next = Some(node);
            }
            if let Some(mut after) = after {
                after.as_mut().prev = Some(node);
            }
        }
    }

    /// Removes and returns the head task, or `None` if empty.
    pub fn pop(&mut self) -> Option<Task> {
        let first = self.first?;
        // SAFETY: `first` is a live node owned by this queue.
        let (value, next) = unsafe {
            let node = first.as_ref();
            (node.value, node.next)
        };

        match next {
            Some(mut next) => {
                // SAFETY: `next` is a live node owned by this queue.
                unsafe { next.as_mut().prev = None };
                self.first = Some(next);
            }
            None => {
                self.first = None;
                self.last = None;
            }
        }

        unsafe { self.free_node(first) };
        self.size -= 1;
        debug_assert!(self.invariants_hold());
        Some(value)
    }

    /// Destroys and frees every node, resetting the queue to empty.
    pub fn clear(&mut self) {
        let mut cursor = self.first;
        while let Some(node) = cursor {
            // SAFETY: every node reachable from `first` is live and owned by this queue.
            let next = unsafe { node.as_ref().next };
            unsafe { self.free_node(node) };
            cursor = next;
        }
        self.first = None;
        self.last = None;
        self.size = 0;
    }

    /// Transfers ownership of the whole chain out, leaving this queue empty.
    pub fn release(&mut self) -> ReleasedChain {
        let chain = ReleasedChain {
            first: self.first,
            last: self.last,
            size: self.size,
        };
        self.first = None;
        self.last = None;
        self.size = 0;
        chain
    }

    /// Replaces the current chain (after clearing it) with `chain`.
    pub fn assign(&mut self, chain: ReleasedChain) {
        self.clear();
        self.first = chain.first;
        self.last = chain.last;
        self.size = chain.size;
    }

    #[cfg(debug_assertions)]
    fn invariants_hold(&self) -> bool {
        if self.size == 0 {
            return self.first.is_none() && self.last.is_none();
        }
        let Some(first) = self.first else { return false };
        let Some(last) = self.last else { return false };
        // SAFETY: nodes on the chain are all live and owned by this queue.
        unsafe {
            if first.as_ref().prev.is_some() {
                return false;
            }
            if last.as_ref().next.is_some() {
                return false;
            }
        }

        let mut count = 0usize;
        let mut cursor = Some(first);
        let mut prev: Option<NonNull<Node>> = None;
        while let Some(node) = cursor {
            let node_ref = unsafe { node.as_ref() };
            if node_ref.prev != prev {
                return false;
            }
            prev = Some(node);
            cursor = node_ref.next;
            count += 1;
        }
        count == self.size
    }
}

impl<A: ByteAllocator> Drop for TaskQueue<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

// SAFETY: `TaskQueue` has no shared mutable state beyond the nodes it
// exclusively owns; it is the caller's responsibility (enforced one layer up
// by `SharedQueue`'s locking) to never access it from two threads at once
// without synchronization. It is `Send` because ownership of the whole chain
// can move to another thread; it is intentionally not `Sync`.
unsafe impl<A: ByteAllocator + Send> Send for TaskQueue<A> {}
