use std::fs::{File, OpenOptions};
use std::io::Result as IoResult;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::common::exception::DeviceError;
use crate::storage::disk::block::{BlockCommand, Opcode};
use crate::storage::disk::thrpool::device::BlockingDevice;

/// Block device backed by a regular file, accessed with blocking positional I/O
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    path: PathBuf,
    nblocks: u64,
    lba_nbytes: usize,
}

impl FileDevice {
    /// Opens (creating if needed) `path` and sizes it to `nblocks` blocks.
    pub fn open<P: AsRef<Path>>(path: P, nblocks: u64, lba_nbytes: usize) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.set_len(nblocks * lba_nbytes as u64)?;
        info!(
            "Opened file device {} ({} blocks of {} bytes)",
            path.display(),
            nblocks,
            lba_nbytes
        );
        Ok(Self {
            file,
            path,
            nblocks,
            lba_nbytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn nblocks(&self) -> u64 {
        self.nblocks
    }

    pub fn lba_nbytes(&self) -> usize {
        self.lba_nbytes
    }
}

impl BlockingDevice for FileDevice {
    type Command = BlockCommand;

    fn execute(&self, cmd: &mut BlockCommand, data: &mut [u8], _meta: Option<&mut [u8]>) -> Result<(), DeviceError> {
        if cmd.opcode == Opcode::Flush {
            self.file.sync_data()?;
            return Ok(());
        }

        let (offset, nbytes) = cmd.byte_range(self.nblocks, self.lba_nbytes, data.len())?;
        debug!("{:?} {} bytes at offset {} in {}", cmd.opcode, nbytes, offset, self.path.display());
        match cmd.opcode {
            Opcode::Read => self.file.read_exact_at(&mut data[..nbytes], offset)?,
            Opcode::Write => self.file.write_all_at(&data[..nbytes], offset)?,
            Opcode::Flush => {}
        }
        Ok(())
    }
}
