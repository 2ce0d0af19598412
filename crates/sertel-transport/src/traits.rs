use std::io::{ErrorKind, Read};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A blocking byte stream with a bounded read timeout.
///
/// This is deliberately narrow: the framer only ever reads, adjusts the read
/// timeout, discards stale input and closes. Transport-specific configuration
/// stays with whoever opened the handle.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when the read timeout elapsed with no data available.
    /// Returns `Err(TransportError::Closed)` once the stream has ended.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Bound every subsequent `read` by `timeout`.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Discard any input the transport has buffered but not yet delivered.
    fn reset_input(&mut self) -> Result<()>;

    /// Release the underlying handle. Further reads fail with `Closed`.
    fn close(&mut self);
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn reset_input(&mut self) -> Result<()> {
        (**self).reset_input()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// A [`ByteSource`] over any `Read`, such as a captured byte file.
///
/// End of the inner stream is reported as [`TransportError::Closed`]. Reads
/// that time out or are interrupted are reported as `Ok(0)`.
pub struct StreamSource<R> {
    inner: Option<R>,
}

impl<R: Read + Send> StreamSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Consume the source and return the inner reader, if still open.
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }
}

impl<R: Read + Send> ByteSource for StreamSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inner = self.inner.as_mut().ok_or(TransportError::Closed)?;
        if buf.is_empty() {
            return Ok(0);
        }
        match inner.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn reset_input(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

impl<R> std::fmt::Debug for StreamSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("open", &self.inner.is_some())
            .finish()
    }
}
