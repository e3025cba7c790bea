pub mod common;
pub mod storage;

pub use common::exception::{ConfigError, DeviceError, EngineError, Result, SubmitError};
pub use storage::disk::block::{BlockCommand, Opcode};
pub use storage::disk::file_device::FileDevice;
pub use storage::disk::memory_device::MemoryDevice;
pub use storage::disk::thrpool::{
    BlockingDevice, Completion, QueueConfig, Request, ThreadPoolConfig, ThreadPoolQueue,
};
