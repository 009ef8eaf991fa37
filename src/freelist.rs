//! Recycling substrate shared by the queues: a lock-free Treiber stack of
//! spare nodes with a reference-count guard on pop.
//!
//! The counter embedded in every [`Node`] plays two roles at once: it gates
//! re-publication to the stack (a node re-enters only when its count hits
//! zero) and it pins the node's `next` pointer while a popper reads it. That
//! is what makes the plain pointer CAS on `top` safe against ABA: a node
//! whose count was raised above one cannot complete a push, so its link
//! cannot change under the popper.

use std::mem::MaybeUninit;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// A linked cell that alternates between queue link and free-list entry.
///
/// `next` means next-in-queue while the node is linked into a queue and
/// next-spare while it sits in a [`FreeList`]. The payload slot is live only
/// between an enqueue and the matching dequeue; a node resting in the list
/// (or serving as a queue dummy) holds no value.
#[repr(C)]
pub struct Node<T> {
    pub(crate) item: MaybeUninit<T>,
    pub(crate) next: AtomicPtr<Node<T>>,
    pub(crate) refcnt: AtomicUsize,
}

impl<T> Node<T> {
    /// Allocates a fresh, empty node owned by the caller (count 1).
    pub fn boxed() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            item: MaybeUninit::uninit(),
            next: AtomicPtr::new(null_mut()),
            refcnt: AtomicUsize::new(1),
        }))
    }
}

/// Lock-free LIFO stack of spare nodes.
///
/// Steady-state enqueue/dequeue cycles recycle nodes through here without
/// touching the allocator. Nodes handed to [`push`](FreeList::push) must
/// originate from [`Node::boxed`]; whatever is still linked when the list is
/// dropped is freed then.
pub struct FreeList<T> {
    top: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: the list only ever hands a node to one thread at a time; moving
// node storage across threads needs T: Send.
unsafe impl<T: Send> Send for FreeList<T> {}
unsafe impl<T: Send> Sync for FreeList<T> {}

impl<T> FreeList<T> {
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(AtomicPtr::new(null_mut())),
        }
    }

    /// True when no spare node is currently linked.
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Acquire).is_null()
    }

    /// Drops one reference to `u`. The holder of the last reference owns the
    /// node and must relink it: the link is repaired before the publication
    /// CAS, and the count goes back to 1 only after `u` is visible at the
    /// top. A zero count is therefore never re-incremented; poppers that
    /// observe it wait for this relink instead.
    ///
    /// # Safety
    ///
    /// `u` must be a live node the caller holds a reference on.
    pub unsafe fn release_ref(&self, u: *mut Node<T>) {
        if (*u).refcnt.fetch_sub(1, Ordering::Relaxed) != 1 {
            return;
        }
        loop {
            let t = self.top.load(Ordering::Relaxed);
            // Repair the link first; publishing u with a stale null next
            // would orphan the rest of the stack.
            (*u).next.store(t, Ordering::Relaxed);
            if self
                .top
                .compare_exchange_weak(t, u, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                (*u).refcnt.store(1, Ordering::Relaxed);
                break;
            }
        }
    }

    /// Returns `u` to the list.
    ///
    /// # Safety
    ///
    /// The caller must hold the only reference to `u` (count 1), `u` must
    /// have been allocated by [`Node::boxed`], and its payload slot must be
    /// dead.
    pub unsafe fn push(&self, u: *mut Node<T>) {
        self.release_ref(u);
    }

    /// Pops the most recently pushed node, or `None` when the list is
    /// observed empty. The returned node is exclusively owned by the caller.
    pub fn pop(&self) -> Option<*mut Node<T>> {
        loop {
            let u = self.top.load(Ordering::Acquire);
            if u.is_null() {
                return None;
            }
            unsafe {
                let t = (*u).refcnt.load(Ordering::Relaxed);
                if t == 0 {
                    // Ghost: already popped elsewhere, relink pending. The
                    // popper finishes it in a bounded number of steps.
                    std::hint::spin_loop();
                    continue;
                }
                // A zero count must never be raised, hence CAS rather than
                // a blind increment.
                if (*u)
                    .refcnt
                    .compare_exchange_weak(t, t + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_err()
                {
                    continue;
                }
                // With the extra reference held, u cannot complete a push,
                // so its link is stable even if u has cycled through the
                // list since we read top.
                let nv = (*u).next.load(Ordering::Relaxed);
                let won = self
                    .top
                    .compare_exchange_weak(u, nv, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok();
                // On a lost race this may also perform the delayed relink
                // for a winner that already gave up its own reference.
                self.release_ref(u);
                if won {
                    return Some(u);
                }
            }
        }
    }
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for FreeList<T> {
    fn drop(&mut self) {
        // Spare nodes never hold a live payload; freeing the box is enough.
        let mut p = self.top.load(Ordering::Relaxed);
        while !p.is_null() {
            let next = unsafe { (*p).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(p) });
            p = next;
        }
    }
}
