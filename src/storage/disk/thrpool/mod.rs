//! # Thread-pool asynchronous queue
//!
//! Emulates asynchronous command completion on top of a device that only
//! offers a blocking call. A fixed slot arena backs three FIFO queues (free,
//! submission, completion); worker threads move slots from submission to
//! completion by running the blocking call, and callers drain completions
//! with `poke` or `wait`.
//!
//! - **`config`**: thread count and capacity.
//! - **`device`**: the `BlockingDevice` trait the workers call into.
//! - **`request`**: `Request` submitted by callers, `Completion` handed to callbacks.
//! - **`slot_pool`**: the slot arena and index-based FIFO queues.
//! - **`worker`**: worker threads and the state they share with the queue.
//! - **`queue`**: `ThreadPoolQueue`, the public entry point.
//! - **`stats`**: submission/completion counters.

pub mod config;
pub mod device;
pub mod queue;
pub mod request;
pub mod stats;

mod slot_pool;
mod worker;

pub use config::{QueueConfig, ThreadPoolConfig};
pub use device::BlockingDevice;
pub use queue::ThreadPoolQueue;
pub use request::{Callback, Completion, Request};
pub use stats::{QueueStats, QueueStatsSnapshot};
