use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use log::trace;
use parking_lot::RwLock;

use crate::common::exception::DeviceError;
use crate::storage::disk::block::{BlockCommand, Opcode};
use crate::storage::disk::thrpool::device::BlockingDevice;

/// MemoryDevice keeps every logical block in a byte vector.
/// It stands in for real hardware in tests and benchmarks, optionally
/// sleeping on each command to mimic device latency.
pub struct MemoryDevice {
    memory: RwLock<Vec<u8>>,
    nblocks: u64,
    lba_nbytes: usize,
    latency: Option<Duration>,
    executed: AtomicU64,
}

impl MemoryDevice {
    pub fn new(nblocks: u64, lba_nbytes: usize) -> Self {
        Self {
            memory: RwLock::new(vec![0; nblocks as usize * lba_nbytes]),
            nblocks,
            lba_nbytes,
            latency: None,
            executed: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn nblocks(&self) -> u64 {
        self.nblocks
    }

    pub fn lba_nbytes(&self) -> usize {
        self.lba_nbytes
    }

    /// Number of commands that reached the device, failed ones included.
    pub fn commands_executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl BlockingDevice for MemoryDevice {
    type Command = BlockCommand;

    fn execute(&self, cmd: &mut BlockCommand, data: &mut [u8], _meta: Option<&mut [u8]>) -> Result<(), DeviceError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }

        if cmd.opcode == Opcode::Flush {
            return Ok(());
        }

        let (offset, nbytes) = cmd.byte_range(self.nblocks, self.lba_nbytes, data.len())?;
        let offset = offset as usize;
        trace!("{:?} of {} bytes at offset {}", cmd.opcode, nbytes, offset);

        match cmd.opcode {
            Opcode::Read => {
                let memory = self.memory.read();
                data[..nbytes].copy_from_slice(&memory[offset..offset + nbytes]);
            }
            Opcode::Write => {
                let mut memory = self.memory.write();
                memory[offset..offset + nbytes].copy_from_slice(&data[..nbytes]);
            }
            Opcode::Flush => {}
        }
        Ok(())
    }
}
