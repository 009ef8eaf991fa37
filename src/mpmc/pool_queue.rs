//! Multi-producer multi-consumer queue over the free-list substrate.
//!
//! The shape is Michael-Scott: a singly linked chain between two separately
//! padded `head` and `tail` pointers, with a dummy node always at the head.
//! Producers serialize on an atomic tail exchange; consumers advance the
//! head under the same reference-count guard the free list uses for its own
//! pop, because a consumer's head snapshot may get recycled and reappear.

use std::mem::MaybeUninit;
use std::ptr::{self, null_mut};
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use crate::freelist::{FreeList, Node};
use crate::{MpmcQueue, DEFAULT_POOL_CAPACITY};

/// Unbounded MPMC queue that recycles node storage through a [`FreeList`].
///
/// `push` never fails: it falls back to a fresh allocation when the pool is
/// exhausted. `try_push` is the back-pressure variant that refuses to grow.
/// All operations are non-blocking; the only busy-wait is the bounded
/// ghost-spin on a head node that another consumer is about to relink.
pub struct PoolQueue<T: Send + 'static> {
    pub(crate) pool: FreeList<T>,
    pub(crate) head: CachePadded<AtomicPtr<Node<T>>>,
    pub(crate) tail: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: a payload slot is only ever touched by the single producer that
// owns the node pre-link, or the single consumer that won the head CAS.
unsafe impl<T: Send + 'static> Send for PoolQueue<T> {}
unsafe impl<T: Send + 'static> Sync for PoolQueue<T> {}

impl<T: Send + 'static> PoolQueue<T> {
    /// Empty queue with [`DEFAULT_POOL_CAPACITY`] spare nodes.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Empty queue with `capacity` spare nodes pre-faulted into the pool,
    /// plus the dummy. `capacity` bounds `try_push`, not `push`.
    pub fn with_capacity(capacity: usize) -> Self {
        let dummy = Node::boxed();
        let queue = Self {
            pool: FreeList::new(),
            head: CachePadded::new(AtomicPtr::new(dummy)),
            tail: CachePadded::new(AtomicPtr::new(dummy)),
        };
        for _ in 0..capacity {
            // A fresh node carries count 1, so push publishes it directly.
            unsafe { queue.pool.push(Node::boxed()) };
        }
        queue
    }

    /// Writes the payload into `n` and links it behind the current tail.
    ///
    /// The tail exchange hands each producer a unique predecessor, so the
    /// `next` store that completes the link is unshared. Between the
    /// exchange and that store the chain is transiently cut; consumers read
    /// the null link as "empty" rather than chasing the tail.
    ///
    /// # Safety
    ///
    /// `n` must be exclusively owned with a dead payload slot.
    unsafe fn link(&self, n: *mut Node<T>, item: T) {
        ptr::addr_of_mut!((*n).item).write(MaybeUninit::new(item));
        (*n).next.store(null_mut(), Ordering::Relaxed);
        let prev = self.tail.swap(n, Ordering::AcqRel);
        (*prev).next.store(n, Ordering::Release);
    }

    /// Enqueues `item`. Takes a spare node from the pool when one is
    /// available and allocates otherwise, so this never fails.
    pub fn push(&self, item: T) {
        let n = match self.pool.pop() {
            Some(n) => n,
            None => Node::boxed(),
        };
        unsafe { self.link(n, item) };
    }

    /// Enqueues `item` only if a spare node is available, handing the item
    /// back otherwise. This is the hook callers use for back-pressure.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        match self.pool.pop() {
            Some(n) => {
                unsafe { self.link(n, item) };
                Ok(())
            }
            None => Err(item),
        }
    }

    /// Dequeues the oldest item, or `None` when the queue is observed
    /// empty. A concurrent producer that has swung the tail but not yet
    /// completed its link also reads as empty; callers retry.
    pub fn pop(&self) -> Option<T> {
        loop {
            let h = self.head.load(Ordering::Relaxed);
            unsafe {
                let t = (*h).refcnt.load(Ordering::Relaxed);
                if t == 0 {
                    // Ghost head: a winning consumer is relinking it.
                    std::hint::spin_loop();
                    continue;
                }
                if (*h)
                    .refcnt
                    .compare_exchange_weak(t, t + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_err()
                {
                    continue;
                }
                // The extra reference pins h's link while we read past it.
                let nh = (*h).next.load(Ordering::Acquire);
                if nh.is_null() {
                    self.pool.release_ref(h);
                    return None;
                }
                // Copy the successor's payload out tentatively; it becomes
                // ours only if the head CAS below goes through. A losing
                // copy is dropped as raw bits, never as a T.
                let item = ptr::read(ptr::addr_of!((*nh).item));
                if self
                    .head
                    .compare_exchange_weak(h, nh, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    // h is detached and nh is the new dummy. Give up the
                    // guard reference, then hand the node to the pool.
                    self.pool.release_ref(h);
                    self.pool.push(h);
                    return Some(item.assume_init());
                }
                self.pool.release_ref(h);
            }
        }
    }

    /// True when the queue is observed empty. Racy by nature; a concurrent
    /// producer may be linking an item right now.
    pub fn is_empty(&self) -> bool {
        let h = self.head.load(Ordering::Relaxed);
        unsafe { (*h).next.load(Ordering::Acquire).is_null() }
    }

    /// True when the pool is currently exhausted, i.e. a `try_push` issued
    /// now would fail. Best-effort, like the emptiness probe.
    pub fn is_full(&self) -> bool {
        self.pool.is_empty()
    }
}

impl<T: Send + 'static> Default for PoolQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for PoolQueue<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the chain and free it. The dummy at the
        // head holds no payload; every node after it holds an undelivered
        // item that must be dropped in place. The pool frees itself.
        unsafe {
            let mut p = self.head.load(Ordering::Relaxed);
            let mut live = false;
            while !p.is_null() {
                let next = (*p).next.load(Ordering::Relaxed);
                if live {
                    ptr::drop_in_place((*p).item.as_mut_ptr());
                }
                drop(Box::from_raw(p));
                live = true;
                p = next;
            }
        }
    }
}

impl<T: Send + 'static> MpmcQueue<T> for PoolQueue<T> {
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
