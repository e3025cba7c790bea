//! # Thread-pool queue
//!
//! `ThreadPoolQueue` gives a device that only offers a blocking command call
//! an asynchronous submit / poll interface. Callers submit without ever
//! waiting on device latency and later drain completions with `poke` or
//! `wait`, which run each command's callback on the draining thread.
//!
//! ```text
//!   caller                         workers (N threads)                caller
//!   ══════                         ═══════════════════                ══════
//!   submit ─▶ free ─▶ submission ─▶ device.execute() ─▶ completion ─▶ poke/wait
//!                       (lock+condvar)                  (lock)          │
//!                                                                        ▼
//!                                                             callback(Completion)
//! ```
//!
//! | Method     | Blocks? | Description                                          |
//! |------------|---------|------------------------------------------------------|
//! | `new`      | no      | Allocates the slot arena and spawns the workers      |
//! | `submit`   | no      | Queues one command or fails with `Busy` when full    |
//! | `poke`     | no      | Drains up to `max` completions (0 = all outstanding) |
//! | `wait`     | yes     | Polls until nothing is outstanding                   |
//! | `term`     | yes     | Stops and joins the workers, frees the queue         |

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam::utils::Backoff;
use log::{error, info, trace, warn};

use crate::common::config::{COMPLETION_LOCK_TIMEOUT, POKE_BATCH, SlotId, WAIT_POLL_INTERVAL};
use crate::common::exception::{EngineError, Result, SubmitError};
use crate::storage::disk::thrpool::config::QueueConfig;
use crate::storage::disk::thrpool::device::BlockingDevice;
use crate::storage::disk::thrpool::request::Request;
use crate::storage::disk::thrpool::stats::QueueStatsSnapshot;
use crate::storage::disk::thrpool::worker::{QueueShared, WorkerPool};

/// Asynchronous queue instance over a blocking device
pub struct ThreadPoolQueue<D: BlockingDevice> {
    device: Arc<D>,
    shared: Arc<QueueShared<D::Command>>,
    workers: WorkerPool,
    nthreads: usize,
    terminated: bool,
}

impl<D: BlockingDevice> ThreadPoolQueue<D> {
    /// Allocates `config.capacity` slots and starts `config.pool.nthreads()`
    /// workers. If any worker fails to start, the ones already running are
    /// stopped and joined before the error is returned.
    pub fn new(device: Arc<D>, config: QueueConfig) -> Result<Self> {
        config.validate()?;
        let nthreads = config.pool.nthreads();

        let mut queue = Self {
            device,
            shared: Arc::new(QueueShared::new(config.capacity)),
            workers: WorkerPool::with_capacity(nthreads),
            nthreads,
            terminated: false,
        };

        for worker in 0..nthreads {
            if let Err(err) = queue.workers.spawn(worker, &queue.device, &queue.shared) {
                error!("Failed to start worker {}: {}", worker, err);
                if let Err(term_err) = queue.shutdown() {
                    warn!("Cleanup after failed init reported: {}", term_err);
                }
                return Err(err);
            }
        }

        info!(
            "Started {} worker threads for queue of capacity {}",
            queue.workers.len(),
            config.capacity
        );
        Ok(queue)
    }

    /// Queues one command without blocking.
    ///
    /// Fails with `EngineError::Busy` when every slot is outstanding; the
    /// request is handed back inside the error so it can be retried after
    /// draining completions. A rejected submission leaves the queue untouched.
    pub fn submit(&self, request: Request<D::Command>) -> std::result::Result<(), SubmitError<D::Command>> {
        let shared = &self.shared;
        let Some(id) = shared.pool.acquire() else {
            trace!("Queue full, rejecting submission");
            shared.stats.record_busy();
            return Err(SubmitError::new(
                EngineError::Busy {
                    capacity: shared.pool.capacity(),
                },
                request,
            ));
        };

        shared.pool.fill(id, request);
        shared.submissions.lock().queue.push_back(id);
        shared.work_ready.notify_one();
        shared.stats.record_submitted();
        trace!("Submitted slot {}", id);
        Ok(())
    }

    /// Drains up to `max` completions, 0 meaning everything outstanding.
    ///
    /// Ids are moved off the completion queue in batches of at most
    /// `POKE_BATCH` into a stack buffer. Each callback runs on the calling
    /// thread with no queue lock held, and only then is its slot freed, so a
    /// caller observing `outstanding() == 0` knows every drained callback has
    /// returned. Returns how many commands were completed, which can be fewer
    /// than requested. Fails with `EngineError::Contended` if the completion
    /// lock stays busy for longer than `COMPLETION_LOCK_TIMEOUT` before
    /// anything was drained.
    ///
    /// A panicking callback does not strand the rest of its batch: every
    /// drained slot is still completed and freed, then the first panic is
    /// resumed.
    pub fn poke(&self, max: u32) -> Result<u32> {
        let outstanding = self.outstanding();
        let bound = if max == 0 { outstanding } else { max.min(outstanding) };
        if bound == 0 {
            return Ok(0);
        }

        let mut batch: [SlotId; POKE_BATCH] = [0; POKE_BATCH];
        let mut completed = 0u32;
        let mut panicked = None;

        while completed < bound && panicked.is_none() {
            let want = ((bound - completed) as usize).min(POKE_BATCH);
            let taken = match self.shared.completions.try_lock_for(COMPLETION_LOCK_TIMEOUT) {
                Some(mut completions) => completions.drain_into(&mut batch[..want]),
                None if completed == 0 => return Err(EngineError::Contended),
                None => break,
            };
            if taken == 0 {
                break;
            }

            for &id in &batch[..taken] {
                if let Err(payload) = self.complete_slot(id) {
                    warn!("Completion callback for slot {} panicked", id);
                    if panicked.is_none() {
                        panicked = Some(payload);
                    }
                }
            }
            completed += taken as u32;
        }

        if completed > 0 {
            self.shared.stats.record_completed(completed as u64);
            trace!("Poke completed {} commands", completed);
        }
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        Ok(completed)
    }

    /// Runs the callback of one drained slot, then frees the slot.
    fn complete_slot(&self, id: SlotId) -> thread::Result<()> {
        let outcome = match self.shared.pool.take(id) {
            Some((request, status)) => panic::catch_unwind(AssertUnwindSafe(|| request.complete(status))),
            None => {
                error!("Completed slot {} held no request", id);
                Ok(())
            }
        };
        self.shared.pool.release(id);
        outcome
    }

    /// Polls until no command is outstanding and returns how many completed.
    ///
    /// Spins briefly between empty polls, then falls back to sleeping
    /// `WAIT_POLL_INTERVAL`. Transient errors from `poke` are retried; any
    /// other error is returned immediately.
    pub fn wait(&self) -> Result<u32> {
        let backoff = Backoff::new();
        let mut total = 0;

        while self.outstanding() > 0 {
            match self.poke(0) {
                Ok(0) => Self::idle(&backoff),
                Ok(completed) => {
                    total += completed;
                    backoff.reset();
                }
                Err(err) if err.is_transient() => Self::idle(&backoff),
                Err(err) => return Err(err),
            }
        }

        Ok(total)
    }

    fn idle(backoff: &Backoff) {
        if backoff.is_completed() {
            thread::sleep(WAIT_POLL_INTERVAL);
        } else {
            backoff.snooze();
        }
    }

    /// Stops the workers, waits for in-flight commands and frees the queue.
    ///
    /// Submissions already accepted are still executed. Completions that were
    /// never drained are dropped without running their callbacks.
    pub fn term(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        self.shared.request_stop();
        let joined = self.workers.join_all();

        let abandoned = self.shared.completions.lock().len();
        if abandoned > 0 {
            warn!("Dropping {} completions that were never drained", abandoned);
        }
        info!("Queue terminated, {} workers joined", self.nthreads);
        joined
    }

    pub fn capacity(&self) -> u32 {
        self.shared.pool.capacity()
    }

    /// Commands submitted but not yet drained by `poke`/`wait`.
    pub fn outstanding(&self) -> u32 {
        self.shared.pool.outstanding()
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<D: BlockingDevice> Drop for ThreadPoolQueue<D> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("Queue shutdown during drop failed: {}", err);
        }
    }
}
