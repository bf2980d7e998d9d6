//! Transport trait for the USB bulk pipe

use crate::TransportError;
use std::time::Duration;

/// Blocking byte transport to a camera's bulk endpoints.
///
/// Implementations wrap an already-claimed PTP interface: `write` goes to the
/// bulk-out endpoint and `read` to the bulk-in endpoint. Device discovery,
/// interface claiming and endpoint selection happen before the transport is
/// handed to a [`CameraConnection`](crate::CameraConnection).
///
/// Every call is bounded by its own `timeout`.
pub trait Transport: Send {
    /// Write `bytes` to the bulk-out endpoint.
    ///
    /// Returns the number of bytes actually transferred.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` bytes from the bulk-in endpoint.
    ///
    /// Returns the number of bytes actually read, which may be less than
    /// requested.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Whether the underlying device handle is still usable.
    fn is_open(&self) -> bool;

    /// Release the interface and device handle.
    ///
    /// Called exactly once by the connection before the transport is dropped.
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).write(bytes, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read(buf, timeout)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
