use std::io::{ErrorKind, Read};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

/// A serial port opened at a fixed baud rate.
///
/// Holds the port by composition and exposes only the [`ByteSource`]
/// surface; line settings are fixed at open time.
pub struct SerialSource {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    baud_rate: u32,
}

impl SerialSource {
    /// Read timeout applied at open time.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

    /// Open `path` at `baud_rate` (8N1, no flow control).
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Self::DEFAULT_READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                port: path.to_string(),
                baud_rate,
                source,
            })?;

        info!(port = path, baud_rate, "opened serial port");

        Ok(Self {
            port: Some(port),
            path: path.to_string(),
            baud_rate,
        })
    }

    /// Device path this source was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl ByteSource for SerialSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port_mut()?
            .set_timeout(timeout)
            .map_err(|err| TransportError::Io(err.into()))
    }

    fn reset_input(&mut self) -> Result<()> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .map_err(|err| TransportError::Io(err.into()))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.path, "closed serial port");
        }
    }
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}
