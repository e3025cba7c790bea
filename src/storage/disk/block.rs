//! LBA-addressed commands shared by the bundled devices

use crate::common::config::Lba;
use crate::common::exception::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Read,
    Write,
    Flush,
}

/// Read/write/flush of `nlb + 1` logical blocks starting at `slba`.
///
/// `nlb` is zero-based, so `nlb == 0` addresses a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCommand {
    pub opcode: Opcode,
    pub slba: Lba,
    pub nlb: u16,
}

impl BlockCommand {
    pub fn read(slba: Lba, nlb: u16) -> Self {
        Self { opcode: Opcode::Read, slba, nlb }
    }

    pub fn write(slba: Lba, nlb: u16) -> Self {
        Self { opcode: Opcode::Write, slba, nlb }
    }

    pub fn flush() -> Self {
        Self { opcode: Opcode::Flush, slba: 0, nlb: 0 }
    }

    pub fn nblocks(&self) -> u64 {
        self.nlb as u64 + 1
    }

    /// Byte offset and length of the addressed range, checked against the
    /// device size and the caller's buffer.
    pub fn byte_range(
        &self,
        device_nblocks: u64,
        lba_nbytes: usize,
        buf_nbytes: usize,
    ) -> Result<(u64, usize), DeviceError> {
        let end = self.slba.checked_add(self.nblocks());
        if end.is_none_or(|end| end > device_nblocks) {
            return Err(DeviceError::OutOfRange {
                slba: self.slba,
                nlb: self.nlb,
                nblocks: device_nblocks,
            });
        }

        let nbytes = self.nblocks() as usize * lba_nbytes;
        if buf_nbytes < nbytes {
            return Err(DeviceError::BufferTooSmall {
                needed: nbytes,
                got: buf_nbytes,
            });
        }
        Ok((self.slba * lba_nbytes as u64, nbytes))
    }
}
