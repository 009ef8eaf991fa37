pub mod freelist;
pub mod mpmc;
pub mod mpsc;

pub use freelist::FreeList;
pub use freelist::Node;
pub use mpmc::PoolQueue;
pub use mpsc::RewindQueue;

/// Spare nodes pre-faulted into the pool by the default constructors. The
/// `with_capacity` constructors take any other value.
pub const DEFAULT_POOL_CAPACITY: usize = 65536;

// Common interface for MPMC queues.
pub trait MpmcQueue<T: Send>: Send + Sync + 'static {
    // Error on push when no spare node is available; carries the item back
    // so the producer can retry or apply back-pressure.
    type PushError;
    // Error on pop when the queue is observed empty.
    type PopError;

    // Attempts to push an item without growing the queue's storage.
    // Called by any producer.
    fn push(&self, item: T) -> Result<(), Self::PushError>;

    // Attempts to pop the oldest item.
    // Called by any consumer.
    fn pop(&self) -> Result<T, Self::PopError>;

    /// True when a subsequent `pop` would currently find nothing.
    fn is_empty(&self) -> bool;

    /// True when a subsequent `push` would currently fail for lack of a
    /// spare node. Best-effort; allocation races can change the answer.
    fn is_full(&self) -> bool;
}

// Common interface for MPSC queues. Producers may be many; pop is reserved
// to the single consumer.
pub trait MpscQueue<T: Send>: Send + Sync + 'static {
    type PushError;
    type PopError;

    // Called by any producer.
    fn push(&self, item: T) -> Result<(), Self::PushError>;

    // Called by the single consumer only.
    fn pop(&self) -> Result<T, Self::PopError>;

    // Typically called by the consumer.
    fn is_empty(&self) -> bool;

    // Typically called by producers.
    fn is_full(&self) -> bool;
}
