//! In-memory device and sink doubles for the unit tests.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use lc3serial_transport::{ChannelError, DuplexChannel};

#[derive(Default)]
struct DeviceState {
    incoming: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
    chatter: bool,
    rts: Option<bool>,
    dtr: Option<bool>,
}

#[derive(Default)]
struct Device {
    state: Mutex<DeviceState>,
    ready: Condvar,
}

/// Host side of the in-memory link.
pub(crate) struct MemoryChannel {
    device: Arc<Device>,
}

/// Test side: emits device output and inspects what the host wrote.
#[derive(Clone)]
pub(crate) struct DeviceEnd {
    device: Arc<Device>,
}

impl MemoryChannel {
    pub(crate) fn pair() -> (Self, DeviceEnd) {
        let device = Arc::new(Device::default());
        (
            Self {
                device: Arc::clone(&device),
            },
            DeviceEnd { device },
        )
    }
}

impl DeviceEnd {
    pub(crate) fn emit(&self, bytes: &[u8]) {
        let mut state = self.device.state.lock().unwrap();
        state.incoming.extend(bytes);
        self.device.ready.notify_all();
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.device.state.lock().unwrap().writes.clone()
    }

    pub(crate) fn fail_reads(&self) {
        self.device.state.lock().unwrap().fail_reads = true;
        self.device.ready.notify_all();
    }

    pub(crate) fn fail_writes(&self) {
        self.device.state.lock().unwrap().fail_writes = true;
    }

    /// Make every read return a byte, so the line never goes quiet.
    pub(crate) fn chatter(&self) {
        self.device.state.lock().unwrap().chatter = true;
        self.device.ready.notify_all();
    }

    pub(crate) fn lines(&self) -> (Option<bool>, Option<bool>) {
        let state = self.device.state.lock().unwrap();
        (state.rts, state.dtr)
    }
}

impl DuplexChannel for MemoryChannel {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> lc3serial_transport::Result<usize> {
        let state = self.device.state.lock().unwrap();
        let (mut state, _) = self
            .device
            .ready
            .wait_timeout_while(state, timeout, |s| {
                s.incoming.is_empty() && !s.fail_reads && !s.chatter
            })
            .unwrap();

        if state.fail_reads {
            return Err(ChannelError::Closed);
        }
        if state.chatter && !buf.is_empty() {
            drop(state);
            std::thread::sleep(Duration::from_millis(1));
            buf[0] = b'.';
            return Ok(1);
        }
        let n = buf.len().min(state.incoming.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.incoming.pop_front().unwrap();
        }
        Ok(n)
    }

    fn bytes_to_read(&self) -> lc3serial_transport::Result<usize> {
        Ok(self.device.state.lock().unwrap().incoming.len())
    }

    fn write_all(&mut self, data: &[u8]) -> lc3serial_transport::Result<()> {
        let mut state = self.device.state.lock().unwrap();
        if state.fail_writes {
            return Err(ChannelError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> lc3serial_transport::Result<()> {
        self.device.state.lock().unwrap().rts = Some(level);
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> lc3serial_transport::Result<()> {
        self.device.state.lock().unwrap().dtr = Some(level);
        Ok(())
    }

    fn try_clone(&self) -> lc3serial_transport::Result<Self> {
        Ok(Self {
            device: Arc::clone(&self.device),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Observes a [`TestSink`] after it has been moved into the reader.
#[derive(Clone, Default)]
pub(crate) struct SinkCapture {
    data: Arc<Mutex<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
}

impl SinkCapture {
    pub(crate) fn sink(&self) -> TestSink {
        TestSink {
            capture: self.clone(),
        }
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestSink {
    capture: SinkCapture,
}

impl Write for TestSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TestSink {
    fn drop(&mut self) {
        self.capture.closes.fetch_add(1, Ordering::SeqCst);
    }
}
