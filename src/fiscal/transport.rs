//! Byte channel the protocol engine runs on.

use std::time::Duration;

use crate::error::Result;

/// Serial-style byte channel supplied by the host.
///
/// The engine never re-opens or reconfigures a transport by itself; `open`
/// is only called when the caller asks the printer to connect.
pub trait Transport: Send {
    /// Open the underlying link.
    fn open(&mut self) -> Result<()>;

    /// Whether the link is currently open.
    fn is_open(&self) -> bool;

    /// Write all bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to and including `marker`.
    ///
    /// Fails with a timeout error if the marker is not seen before `timeout`.
    fn read_until(&mut self, marker: u8, timeout: Duration) -> Result<Vec<u8>>;

    /// Read exactly `n` bytes or fail with a timeout error.
    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Close the link. Closing a closed link is a no-op.
    fn close(&mut self);

    /// Human readable endpoint name for logs.
    fn describe(&self) -> String {
        "transport".to_string()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_until(&mut self, marker: u8, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_until(marker, timeout)
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_exact(n, timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
