pub mod pool_queue;

pub use pool_queue::PoolQueue;
