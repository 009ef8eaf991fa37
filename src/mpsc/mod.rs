pub mod rewind_queue;

pub use rewind_queue::RewindQueue;
