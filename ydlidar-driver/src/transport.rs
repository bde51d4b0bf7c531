use crate::error::Result;
use std::time::Duration;

/// Byte link to the device.
///
/// The driver owns one transport and serializes every access to it, so
/// implementations do not need internal locking.
pub trait Transport: Send {
    fn open(&mut self, port_name: &str, baud_rate: u32) -> Result<()>;

    /// Releases the link. Closing a closed transport is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Writes `data`, returning how many bytes were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Reads what is available into `buf`, waiting at most `timeout` for the
    /// first byte. Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Number of bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Drops everything received so far.
    fn flush_input(&mut self) -> Result<()>;

    /// Drives the DTR control line, which powers the motor on some models.
    fn set_dtr(&mut self, level: bool) -> Result<()>;

    /// Time one byte takes on the wire.
    fn byte_time(&self) -> Duration;
}

/// Wire time of one byte at `baud_rate` with 8N1 framing.
pub(crate) fn byte_time_for(baud_rate: u32) -> Duration {
    if baud_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(10 * 1_000_000_000 / u64::from(baud_rate))
}
