//! Command contexts travelling through the queue
//!
//! A `Request` is what the caller submits: the device command, the primary
//! data buffer, an optional metadata buffer and the completion callback. The
//! callback later receives a `Completion` owning the same buffers plus the
//! device status. Whatever the closure captures plays the role of the user
//! argument.

use std::fmt;

use crate::common::exception::DeviceError;

pub type Callback<C> = Box<dyn FnOnce(Completion<C>) + Send + 'static>;

pub struct Request<C> {
    pub command: C,
    pub data: Vec<u8>,
    pub meta: Option<Vec<u8>>,
    callback: Callback<C>,
}

impl<C> Request<C> {
    pub fn new<F>(command: C, data: Vec<u8>, on_complete: F) -> Self
    where
        F: FnOnce(Completion<C>) + Send + 'static,
    {
        Self {
            command,
            data,
            meta: None,
            callback: Box::new(on_complete),
        }
    }

    pub fn with_meta(mut self, meta: Vec<u8>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Runs the device command against this request's buffers.
    pub(crate) fn execute_with<F>(&mut self, execute: F) -> Result<(), DeviceError>
    where
        F: FnOnce(&mut C, &mut [u8], Option<&mut [u8]>) -> Result<(), DeviceError>,
    {
        execute(&mut self.command, self.data.as_mut_slice(), self.meta.as_deref_mut())
    }

    /// Consumes the request and hands its buffers to the callback.
    pub(crate) fn complete(self, status: Result<(), DeviceError>) {
        let completion = Completion {
            command: self.command,
            data: self.data,
            meta: self.meta,
            status,
        };
        (self.callback)(completion);
    }
}

impl<C: fmt::Debug> fmt::Debug for Request<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("data_nbytes", &self.data.len())
            .field("meta_nbytes", &self.meta.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

/// A finished command as seen by its callback
#[derive(Debug)]
pub struct Completion<C> {
    pub command: C,
    pub data: Vec<u8>,
    pub meta: Option<Vec<u8>>,
    pub status: Result<(), DeviceError>,
}

impl<C> Completion<C> {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Zero on success, a negative errno-style code otherwise.
    pub fn status_code(&self) -> i32 {
        match &self.status {
            Ok(()) => 0,
            Err(err) => err.status_code(),
        }
    }
}
