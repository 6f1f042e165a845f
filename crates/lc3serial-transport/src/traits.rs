use std::time::Duration;

use crate::error::Result;

/// A full-duplex, byte-oriented connection to the device.
///
/// Reads and writes block. The redirector splits one channel into a reader
/// half and a writer half with [`DuplexChannel::try_clone`], so both halves
/// must be usable from different threads at the same time.
pub trait DuplexChannel: Send + Sized + 'static {
    /// Read up to `buf.len()` bytes, waiting at most `timeout` for the first one.
    ///
    /// Returns `Ok(0)` when the timeout expires with nothing received. A zero
    /// timeout polls without blocking.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Number of received bytes that can be read without blocking.
    fn bytes_to_read(&self) -> Result<usize>;

    /// Write every byte of `data` to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Assert or deassert the RTS control line.
    fn set_rts(&mut self, level: bool) -> Result<()>;

    /// Assert or deassert the DTR control line.
    fn set_dtr(&mut self, level: bool) -> Result<()>;

    /// Open a second handle onto the same device.
    fn try_clone(&self) -> Result<Self>;

    /// Device name for diagnostics.
    fn name(&self) -> &str;
}
