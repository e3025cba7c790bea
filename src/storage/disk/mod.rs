pub mod block;
pub mod file_device;
pub mod memory_device;
pub mod thrpool;
