//! An append-ordered, iterable stack of event callbacks registered on a
//! worker.
//!
//! Grounded directly on the original `_Stack` container: a singly-linked
//! chain with `bottom`/`top` pointers, new entries pushed at the top in
//! O(1), and iteration running bottom-to-top (registration order). Each
//! entry remembers the `Event` it was registered for, and a firing of
//! `notify_all` skips every entry registered for a different event (the
//! original's `if (_Callback._Event == _Event)` guard). Popping the top
//! still costs an O(n) walk to find the penultimate node, exactly as in the
//! original; nothing in this crate pops a `CallbackStack` during normal
//! operation; removal exists for symmetry and tests.

use std::alloc::Layout;
use std::fmt;
use std::ptr::{self, NonNull};

use crate::alloc::{ByteAllocator, SystemAllocator};

/// The lifecycle event a registered callback is notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Suspend,
    Resume,
    Terminate,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Event::Suspend => "suspend",
            Event::Resume => "resume",
            Event::Terminate => "terminate",
        };
        f.write_str(s)
    }
}

/// Callback signature invoked for every registered event. `data` is opaque,
/// exactly like [`crate::task::Task`]'s `data` pointer.
pub type EventCallback = unsafe fn(Event, *mut ());

#[derive(Clone, Copy)]
struct Entry {
    event: Event,
    callback: EventCallback,
    data: *mut (),
}

struct Node {
    value: Entry,
    next: Option<NonNull<Node>>,
}

pub struct CallbackStack<A: ByteAllocator = SystemAllocator> {
    bottom: Option<NonNull<Node>>,
    top: Option<NonNull<Node>>,
    size: usize,
    alloc: A,
}

impl Default for CallbackStack<SystemAllocator> {
    fn default() -> Self {
        CallbackStack::new()
    }
}

impl CallbackStack<SystemAllocator> {
    pub fn new() -> Self {
        CallbackStack::with_allocator(SystemAllocator)
    }
}

impl<A: ByteAllocator> CallbackStack<A> {
    pub fn with_allocator(alloc: A) -> Self {
        CallbackStack {
            bottom: None,
            top: None,
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

    /// Registers `callback` for `event`. Returns `false` on allocation
    /// failure, leaving the stack unchanged.
    pub fn push(&mut self, event: Event, callback: EventCallback, data: *mut ()) -> bool {
        let layout = Layout::new::<Node>();
        let Some(raw) = self.alloc.allocate(layout) else {
            return false;
        };
        let node = raw.cast::<Node>();
        // SAFETY: `node` is freshly allocated, properly aligned storage for `Node`.
        unsafe {
            ptr::write(
                node.as_ptr(),
                Node {
                    value: Entry {
                        event,
                        callback,
                        data,
                    },
                    next: None,
                },
            );
        }

        match self.top {
            None => {
                self.bottom = Some(node);
                self.top = Some(node);
            }
            Some(mut top) => {
                // SAFETY: `top` is a live node owned by this stack.
                unsafe { top.as_mut().next = Some(node) };
                self.top = Some(node);
            }
        }

        self.size += 1;
        true
    }

    /// Removes the most recently registered callback, if any.
    pub fn pop(&mut self) {
        match self.size {
            0 => {}
            1 => {
                // SAFETY: the single node is live and owned by this stack.
                let node = self.bottom.take().unwrap();
                self.top = None;
                unsafe { self.free_node(node) };
                self.size = 0;
            }
            _ => {
                let mut cursor = self.bottom.unwrap();
                for _ in 0..self.size - 2 {
                    // SAFETY: every node up to the penultimate is live and owned by this stack.
                    cursor = unsafe { cursor.as_ref().next.unwrap() };
                }
                // SAFETY: `cursor` is the penultimate node; its `next` is the current top.
                let top = unsafe { cursor.as_ref().next.unwrap() };
                unsafe { cursor.as_mut().next = None };
                self.top = Some(cursor);
                unsafe { self.free_node(top) };
                self.size -= 1;
            }
        }
    }

    /// Invokes every callback registered for `event`, in registration order,
    /// skipping entries registered for a different event.
    ///
    /// # Safety
    /// Every callback registered via `push` must be valid to call with
    /// `event` and its associated `data` pointer at the time this runs.
    pub unsafe fn notify_all(&self, event: Event) {
        let mut cursor = self.bottom;
        while let Some(node) = cursor {
            let entry = node.as_ref().value;
            if entry.event == event {
                (entry.callback)(event, entry.data);
            }
            cursor = node.as_ref().next;
        }
    }

    pub(crate) fn clear(&mut self) {
        let mut cursor = self.bottom;
        while let Some(node) = cursor {
            // SAFETY: every node reachable from `bottom` is live and owned by this stack.
            let next = unsafe { node.as_ref().next };
            unsafe { self.free_node(node) };
            cursor = next;
        }
        self.bottom = None;
        self.top = None;
        self.size = 0;
    }

    /// # Safety (internal)
    /// `node` must have been produced by this stack's allocator and already
    /// unlinked from the chain.
    unsafe fn free_node(&self, node: NonNull<Node>) {
        ptr::drop_in_place(node.as_ptr());
        self.alloc
            .deallocate(node.cast::<u8>(), Layout::new::<Node>());
    }
}

impl<A: ByteAllocator> Drop for CallbackStack<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

// SAFETY: exclusive ownership of the chain can move across threads; a
// `CallbackStack` holds no shared mutable state of its own (synchronization,
// if any is needed, lives one layer up alongside the worker state it guards).
unsafe impl<A: ByteAllocator + Send> Send for CallbackStack<A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static LOG: RefCell<Vec<(Event, usize)>> = RefCell::new(Vec::new());
    }

    unsafe fn record(event: Event, data: *mut ()) {
        LOG.with(|log| log.borrow_mut().push((event, data as usize)));
    }

    fn drain_log() -> Vec<(Event, usize)> {
        LOG.with(|log| log.borrow_mut().drain(..).collect())
    }

    #[test]
    fn notifies_in_registration_order() {
        let mut stack: CallbackStack = CallbackStack::new();
        assert!(stack.push(Event::Suspend, record, 1 as *mut ()));
        assert!(stack.push(Event::Suspend, record, 2 as *mut ()));
        assert!(stack.push(Event::Suspend, record, 3 as *mut ()));

        unsafe { stack.notify_all(Event::Suspend) };

        assert_eq!(
            drain_log(),
            vec![
                (Event::Suspend, 1),
                (Event::Suspend, 2),
                (Event::Suspend, 3),
            ]
        );
    }

    #[test]
    fn notify_all_skips_entries_registered_for_a_different_event() {
        let mut stack: CallbackStack = CallbackStack::new();
        assert!(stack.push(Event::Terminate, record, 1 as *mut ()));

        unsafe { stack.notify_all(Event::Suspend) };
        unsafe { stack.notify_all(Event::Resume) };
        assert!(drain_log().is_empty());

        unsafe { stack.notify_all(Event::Terminate) };
        assert_eq!(drain_log(), vec![(Event::Terminate, 1)]);
    }

    #[test]
    fn pop_removes_most_recently_pushed() {
        let mut stack: CallbackStack = CallbackStack::new();
        stack.push(Event::Resume, record, 1 as *mut ());
        stack.push(Event::Resume, record, 2 as *mut ());
        stack.push(Event::Resume, record, 3 as *mut ());

        stack.pop();
        assert_eq!(stack.len(), 2);

        unsafe { stack.notify_all(Event::Resume) };
        assert_eq!(
            drain_log(),
            vec![(Event::Resume, 1), (Event::Resume, 2)]
        );
    }

    #[test]
    fn pop_on_empty_is_a_no_op() {
        let mut stack: CallbackStack = CallbackStack::new();
        stack.pop();
        assert!(stack.is_empty());
    }

    #[test]
    fn clear_on_drop_frees_everything() {
        let mut stack: CallbackStack = CallbackStack::new();
        for i in 0..20 {
            assert!(stack.push(Event::Terminate, record, i as *mut ()));
        }
        drop(stack);
        // no direct assertion beyond "doesn't crash / leak sanitizer would catch it";
        // presence of this test documents the expectation.
    }
}
