use crate::common::exception::DeviceError;

/// A device whose only way of running a command is a blocking call.
///
/// `execute` is invoked from worker threads, several at once, each call with
/// its own command and buffers. It returns once the device has finished the
/// command; `Ok(())` is the zero status.
pub trait BlockingDevice: Send + Sync + 'static {
    /// Device-specific command descriptor carried by every request.
    type Command: Send + 'static;

    fn execute(
        &self,
        cmd: &mut Self::Command,
        data: &mut [u8],
        meta: Option<&mut [u8]>,
    ) -> Result<(), DeviceError>;
}
