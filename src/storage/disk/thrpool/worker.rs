//! Worker threads draining the submission queue
//!
//! Each worker blocks on the submission condvar until a slot is queued or a
//! stop is requested, runs the device's blocking call on the slot outside any
//! queue lock, then appends the slot to the completion queue. A stop request
//! is honored only once the submission queue is empty, so everything accepted
//! before shutdown still reaches the device.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::config::SlotId;
use crate::common::exception::{DeviceError, EngineError, Result};
use crate::storage::disk::thrpool::device::BlockingDevice;
use crate::storage::disk::thrpool::slot_pool::{SlotPool, SlotQueue};
use crate::storage::disk::thrpool::stats::QueueStats;

/// Submission queue plus the stop flag, guarded together
#[derive(Debug)]
pub(crate) struct Submissions {
    pub(crate) queue: SlotQueue,
    pub(crate) stop: bool,
}

/// State shared between a queue instance and its workers.
///
/// The submission and completion locks are never held at the same time.
pub(crate) struct QueueShared<C> {
    pub(crate) pool: SlotPool<C>,
    pub(crate) submissions: Mutex<Submissions>,
    pub(crate) work_ready: Condvar,
    pub(crate) completions: Mutex<SlotQueue>,
    pub(crate) stats: QueueStats,
}

impl<C> QueueShared<C> {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            pool: SlotPool::new(capacity),
            submissions: Mutex::new(Submissions {
                queue: SlotQueue::with_capacity(capacity as usize),
                stop: false,
            }),
            work_ready: Condvar::new(),
            completions: Mutex::new(SlotQueue::with_capacity(capacity as usize)),
            stats: QueueStats::new(),
        }
    }

    /// Sets the stop flag and wakes every blocked worker.
    pub(crate) fn request_stop(&self) {
        let mut submissions = self.submissions.lock();
        submissions.stop = true;
        self.work_ready.notify_all();
    }

    /// Blocks until a slot is queued; `None` once stopped with nothing left.
    fn next_submission(&self) -> Option<SlotId> {
        let mut submissions = self.submissions.lock();
        while submissions.queue.is_empty() && !submissions.stop {
            self.work_ready.wait(&mut submissions);
        }
        submissions.queue.pop_front()
    }

    fn push_completion(&self, id: SlotId) {
        self.completions.lock().push_back(id);
    }
}

/// Handles of the running worker threads
#[derive(Debug, Default)]
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn with_capacity(nthreads: usize) -> Self {
        Self {
            handles: Vec::with_capacity(nthreads),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn spawn<D: BlockingDevice>(
        &mut self,
        worker: usize,
        device: &Arc<D>,
        shared: &Arc<QueueShared<D::Command>>,
    ) -> Result<()> {
        debug!("Starting worker {}", worker);
        let device = Arc::clone(device);
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("thrpool-worker-{}", worker))
            .spawn(move || worker_loop(worker, device, shared))
            .map_err(EngineError::ThreadSpawn)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Joins every worker. All handles are joined even when one reports a
    /// panic; the first panic is returned.
    pub(crate) fn join_all(&mut self) -> Result<()> {
        let mut result = Ok(());
        for (worker, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!("Worker {} panicked before shutdown", worker);
                if result.is_ok() {
                    result = Err(EngineError::WorkerPanicked { worker });
                }
            }
        }
        result
    }
}

fn worker_loop<D: BlockingDevice>(worker: usize, device: Arc<D>, shared: Arc<QueueShared<D::Command>>) {
    debug!("Worker {} started", worker);

    while let Some(id) = shared.next_submission() {
        execute_slot(worker, id, device.as_ref(), &shared);
        shared.push_completion(id);
    }

    debug!("Worker {} shutting down", worker);
}

/// Runs the blocking call for one slot and records its status in the slot.
fn execute_slot<D: BlockingDevice>(worker: usize, id: SlotId, device: &D, shared: &QueueShared<D::Command>) {
    let mut slot = shared.pool.slot(id);
    let Some(request) = slot.request_mut() else {
        error!("Worker {} dequeued empty slot {}", worker, id);
        return;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        request.execute_with(|cmd, data, meta| device.execute(cmd, data, meta))
    }));
    let status = outcome.unwrap_or_else(|payload| Err(DeviceError::Panicked(panic_message(&*payload))));

    if let Err(err) = &status {
        debug!("Worker {}: command in slot {} failed: {} ({})", worker, id, err, err.status_code());
        shared.stats.record_device_error();
    }
    slot.set_status(status);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
