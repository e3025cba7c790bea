//! Slot arena and index-based FIFO queues
//!
//! Every in-flight command lives in one slot of a fixed arena allocated when
//! the queue is created. Queues never hold the commands themselves, only slot
//! ids, so moving a command between the free, submission and completion
//! queues is an O(1) push/pop of an index.
//!
//! ```text
//!   free ──submit──▶ submission ──worker──▶ (executing) ──▶ completion ──poke──▶ free
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;
use parking_lot::{Mutex, MutexGuard};

use crate::common::config::SlotId;
use crate::common::exception::DeviceError;
use crate::storage::disk::thrpool::request::Request;

/// FIFO of slot ids that never grows past the capacity it was built with
#[derive(Debug)]
pub(crate) struct SlotQueue {
    ids: VecDeque<SlotId>,
    capacity: usize,
}

impl SlotQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// A queue already holding every id in `0..capacity`.
    pub(crate) fn filled(capacity: usize) -> Self {
        let mut queue = Self::with_capacity(capacity);
        queue.ids.extend(0..capacity);
        queue
    }

    pub(crate) fn push_back(&mut self, id: SlotId) {
        debug_assert!(self.ids.len() < self.capacity, "slot queue overflow");
        debug_assert!(id < self.capacity, "slot id {} out of range", id);
        self.ids.push_back(id);
    }

    pub(crate) fn pop_front(&mut self) -> Option<SlotId> {
        self.ids.pop_front()
    }

    /// Moves ids from the head into `out`, oldest first, until either runs
    /// out. Returns how many were moved.
    pub(crate) fn drain_into(&mut self, out: &mut [SlotId]) -> usize {
        let n = out.len().min(self.ids.len());
        for (dst, id) in out.iter_mut().zip(self.ids.drain(..n)) {
            *dst = id;
        }
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One reusable command holder
pub(crate) struct Slot<C> {
    request: Option<Request<C>>,
    status: Option<Result<(), DeviceError>>,
}

impl<C> Slot<C> {
    fn empty() -> Self {
        Self {
            request: None,
            status: None,
        }
    }

    pub(crate) fn request_mut(&mut self) -> Option<&mut Request<C>> {
        self.request.as_mut()
    }

    pub(crate) fn set_status(&mut self, status: Result<(), DeviceError>) {
        self.status = Some(status);
    }
}

/// Fixed arena of slots plus the free queue and the outstanding count.
///
/// The free queue has its own lock, and `outstanding` only changes while that
/// lock is held, so `free.len() + outstanding == capacity` whenever the free
/// queue is observed.
pub(crate) struct SlotPool<C> {
    slots: Box<[Mutex<Slot<C>>]>,
    free: Mutex<SlotQueue>,
    outstanding: AtomicU32,
    capacity: u32,
}

impl<C> SlotPool<C> {
    pub(crate) fn new(capacity: u32) -> Self {
        let slots = (0..capacity).map(|_| Mutex::new(Slot::empty())).collect();
        Self {
            slots,
            free: Mutex::new(SlotQueue::filled(capacity as usize)),
            outstanding: AtomicU32::new(0),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free.lock().len()
    }

    pub(crate) fn slot(&self, id: SlotId) -> MutexGuard<'_, Slot<C>> {
        self.slots[id].lock()
    }

    /// Takes a free slot and counts it as outstanding, or `None` when full.
    pub(crate) fn acquire(&self) -> Option<SlotId> {
        let mut free = self.free.lock();
        let id = free.pop_front()?;
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        trace!("slot {} acquired, {} free", id, free.len());
        Some(id)
    }

    pub(crate) fn fill(&self, id: SlotId, request: Request<C>) {
        let mut slot = self.slot(id);
        debug_assert!(slot.request.is_none(), "slot {} already in use", id);
        slot.request = Some(request);
        slot.status = None;
    }

    /// Empties a completed slot without freeing it.
    ///
    /// Returns the request with the status recorded by the worker; `None`
    /// if the slot held no request. The slot stays outstanding until
    /// `release` is called.
    pub(crate) fn take(&self, id: SlotId) -> Option<(Request<C>, Result<(), DeviceError>)> {
        let mut slot = self.slot(id);
        let status = slot.status.take();
        slot.request.take().map(|req| (req, status.unwrap_or(Ok(()))))
    }

    /// Returns a slot to the free queue and drops it from the outstanding count.
    pub(crate) fn release(&self, id: SlotId) {
        let mut free = self.free.lock();
        free.push_back(id);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        trace!("slot {} released, {} free", id, free.len());
    }
}
