use std::time::Duration;

/** Number of worker threads spawned per queue when nothing else is configured. */
pub const DEFAULT_NTHREADS: usize = 4;

/** Largest accepted worker thread count (the range is 1..=MAX_NTHREADS). */
pub const MAX_NTHREADS: usize = 1023;

/** Environment variable consulted by `ThreadPoolConfig::from_env`. */
pub const NTHREADS_ENV: &str = "THRPOOL_NTHREADS";

pub const DEFAULT_QUEUE_CAPACITY: u32 = 64; // slots per queue instance
pub const DEFAULT_LBA_NBYTES: usize = 512; // logical block size of the bundled devices

/** Sleep between completion polls once `wait` has exhausted its spin budget. */
pub static WAIT_POLL_INTERVAL: Duration = Duration::from_micros(1);

/** Completion ids `poke` moves out from under the completion lock per acquisition. */
pub const POKE_BATCH: usize = 32;

/** Upper bound `poke` waits for the completion-queue lock before reporting contention. */
pub static COMPLETION_LOCK_TIMEOUT: Duration = Duration::from_millis(1);

pub type SlotId = usize; // index into the slot arena
pub type Lba = u64; // logical block address
