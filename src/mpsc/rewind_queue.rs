//! Single-consumer specialization of the pooled MPMC queue.
//!
//! With exactly one thread dequeuing, the consumer side needs no guard at
//! all: nobody else ever moves the head, so the refcount dance and the head
//! CAS collapse into plain loads and stores. The single-consumer discipline
//! also buys `rewind`, a consumer-side push-back.

use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::Ordering;

use crate::freelist::Node;
use crate::mpmc::PoolQueue;
use crate::{MpscQueue, DEFAULT_POOL_CAPACITY};

/// MPMC core driven under a multi-producer single-consumer contract.
///
/// Producers use the inherited enqueue paths unchanged. `pop` and `rewind`
/// must only ever be called from one thread at a time; violating that is
/// undefined behavior and is not detected.
pub struct RewindQueue<T: Send + 'static> {
    inner: PoolQueue<T>,
}

impl<T: Send + 'static> RewindQueue<T> {
    /// Empty queue with [`DEFAULT_POOL_CAPACITY`] spare nodes.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: PoolQueue::with_capacity(capacity),
        }
    }

    /// Enqueues `item`, allocating on pool miss. Any producer thread.
    pub fn push(&self, item: T) {
        self.inner.push(item)
    }

    /// Enqueues `item` only if a spare node is available. Any producer
    /// thread.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.inner.try_push(item)
    }

    /// Dequeues the oldest item. Consumer thread only.
    ///
    /// Producers reach nodes exclusively through the tail, so once the head
    /// moves past the old dummy no other thread can hold it and it goes
    /// straight back to the pool.
    pub fn pop(&self) -> Option<T> {
        unsafe {
            let h = self.inner.head.load(Ordering::Relaxed);
            let nh = (*h).next.load(Ordering::Acquire);
            if nh.is_null() {
                return None;
            }
            let item = ptr::read(ptr::addr_of!((*nh).item)).assume_init();
            self.inner.head.store(nh, Ordering::Relaxed);
            self.inner.pool.push(h);
            Some(item)
        }
    }

    /// Pushes `item` back to the front, so the next `pop` returns it.
    /// Consumer thread only.
    ///
    /// The value is written into the current dummy, turning it into a live
    /// node, and a fresh node is linked ahead of it as the new dummy. Safe
    /// against concurrent producers, which never read or move the head.
    pub fn rewind(&self, item: T) {
        let n = match self.inner.pool.pop() {
            Some(n) => n,
            None => Node::boxed(),
        };
        unsafe {
            let h = self.inner.head.load(Ordering::Relaxed);
            ptr::addr_of_mut!((*h).item).write(MaybeUninit::new(item));
            (*n).next.store(h, Ordering::Relaxed);
            self.inner.head.store(n, Ordering::Relaxed);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

impl<T: Send + 'static> Default for RewindQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> MpscQueue<T> for RewindQueue<T> {
    type PushError = T;
    type PopError = ();

    fn push(&self, item: T) -> Result<(), T> {
        self.try_push(item)
    }

    fn pop(&self) -> Result<T, ()> {
        self.pop().ok_or(())
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn is_full(&self) -> bool {
        self.is_full()
    }
}
