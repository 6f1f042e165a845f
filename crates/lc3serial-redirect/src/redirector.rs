use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use lc3serial_image::ObjectImage;
use lc3serial_transport::{ChannelError, DuplexChannel};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RedirectConfig;
use crate::error::{RedirectError, Result};
use crate::session::{ReaderDoneGuard, SessionHandle, SessionState, Shared};

/// How a redirection task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum TaskExit {
    /// Writer: the source reported end of input.
    EndOfInput,
    /// Reader: acknowledged a drain request once the device went quiet.
    Drained,
    /// The session was stopped while the task was still working.
    Cancelled,
    /// The task hit an I/O error and ended on its own.
    Failed(String),
}

/// Outcome of one completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub records_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub reader_exit: TaskExit,
    pub writer_exit: TaskExit,
}

pub(crate) struct ReaderSummary {
    bytes_received: u64,
    exit: TaskExit,
}

struct WriterSummary {
    records_sent: u64,
    bytes_sent: u64,
    exit: TaskExit,
}

/// Bridges a device channel to a source and a sink.
///
/// The redirector owns the channel for its whole lifetime and closes it when
/// dropped. A session runs at most once: after `start()` returns the state is
/// [`SessionState::Stopped`] for good.
pub struct Redirector<C: DuplexChannel> {
    channel: C,
    config: RedirectConfig,
    shared: Arc<Shared>,
}

impl<C: DuplexChannel> Redirector<C> {
    /// Create a redirector with default configuration.
    pub fn new(channel: C) -> Self {
        Self::with_config(channel, RedirectConfig::default())
    }

    /// Create a redirector with explicit configuration.
    pub fn with_config(channel: C, config: RedirectConfig) -> Self {
        Self {
            channel,
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Current redirector configuration.
    pub fn config(&self) -> &RedirectConfig {
        &self.config
    }

    /// Handle for observing or stopping the session from another thread.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(Arc::clone(&self.shared))
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Mutably borrow the channel, e.g. to set control lines before streaming.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Transmit an image before the session starts.
    pub fn program(&mut self, image: &ObjectImage) -> Result<usize> {
        let state = self.shared.state();
        if state != SessionState::Idle {
            return Err(RedirectError::AlreadyStarted(state));
        }
        crate::program::program(&mut self.channel, image)
    }

    /// Run the session until both tasks have finished.
    ///
    /// The reader runs on its own thread and forwards device output to
    /// `sink`, closing it when done. The writer runs on the calling thread
    /// and sends `source` records to the device until the source is
    /// exhausted, a write fails, or the session is stopped. The session then
    /// drains: device output keeps flowing to the sink for the grace period,
    /// after which the reader is stopped and joined.
    ///
    /// Fails with [`RedirectError::AlreadyStarted`] if the session already
    /// ran or was stopped before it started.
    pub fn start<R, W>(&mut self, source: &mut R, sink: W) -> Result<SessionReport>
    where
        R: BufRead + ?Sized,
        W: Write + Send + 'static,
    {
        let reader_channel = self.channel.try_clone()?;
        self.shared
            .begin()
            .map_err(RedirectError::AlreadyStarted)?;
        info!(port = self.channel.name(), "redirection started");

        if let Err(err) = self.spawn_reader(reader_channel, sink) {
            self.shared.mark_reader_done();
            let _ = self.shared.force_stop();
            return Err(RedirectError::Spawn(err));
        }

        let writer = run_writer(&mut self.channel, source, &self.shared, &self.config);
        self.shared.mark_writer_done();
        info!(
            records = writer.records_sent,
            grace = ?self.config.grace_period,
            "writer done, draining device output"
        );

        // The reader keeps forwarding for the whole grace window. Only a
        // reader that already ended on its own cuts the wait short.
        if self.shared.request_drain()
            && self.shared.wait_reader_done(Some(self.config.grace_period))
        {
            debug!("reader ended before the grace period elapsed");
        }
        let _ = self.shared.force_stop();
        self.shared.join_reader();

        let reader = self.shared.take_reader_summary().unwrap_or(ReaderSummary {
            bytes_received: 0,
            exit: TaskExit::Failed("reader thread panicked".to_string()),
        });

        info!(
            sent = writer.bytes_sent,
            received = reader.bytes_received,
            "redirection stopped"
        );

        Ok(SessionReport {
            records_sent: writer.records_sent,
            bytes_sent: writer.bytes_sent,
            bytes_received: reader.bytes_received,
            reader_exit: reader.exit,
            writer_exit: writer.exit,
        })
    }

    /// Cancel an active session. See [`SessionHandle::stop`].
    pub fn stop(&self) {
        self.handle().stop();
    }

    fn spawn_reader<W>(&self, channel: C, sink: W) -> std::io::Result<()>
    where
        W: Write + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        self.shared.install_reader(move || {
            std::thread::Builder::new()
                .name("lc3serial-reader".to_string())
                .spawn(move || {
                    let _done = ReaderDoneGuard(Arc::clone(&shared));
                    let summary = run_reader(channel, sink, &shared, &config);
                    shared.store_reader_summary(summary);
                })
        })
    }
}

impl<C: DuplexChannel> std::fmt::Debug for Redirector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redirector")
            .field("port", &self.channel.name())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn run_reader<C, W>(
    mut channel: C,
    mut sink: W,
    shared: &Shared,
    config: &RedirectConfig,
) -> ReaderSummary
where
    C: DuplexChannel,
    W: Write,
{
    let mut batch = BytesMut::with_capacity(config.max_batch.max(1));
    let mut first = [0u8; 1];
    let mut received = 0u64;
    let mut draining = false;

    let exit = loop {
        let state = shared.state();
        if !state.is_active() {
            break if draining {
                TaskExit::Drained
            } else {
                TaskExit::Cancelled
            };
        }
        draining |= state == SessionState::Draining;

        let n = match channel.read(&mut first, config.read_timeout) {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "device read failed, reader stopping");
                break TaskExit::Failed(err.to_string());
            }
        };
        if n == 0 {
            continue;
        }

        batch.clear();
        batch.extend_from_slice(&first[..n]);
        if let Err(err) = drain_available(&mut channel, &mut batch, config.max_batch) {
            warn!(error = %err, "device read failed, reader stopping");
            break TaskExit::Failed(err.to_string());
        }

        if let Err(err) = sink.write_all(&batch).and_then(|()| sink.flush()) {
            warn!(error = %err, "sink write failed, reader stopping");
            break TaskExit::Failed(err.to_string());
        }
        received += batch.len() as u64;
        debug!(bytes = batch.len(), "forwarded device output");
    };

    if let Err(err) = sink.flush() {
        warn!(error = %err, "sink flush failed on close");
    }
    drop(sink);

    ReaderSummary {
        bytes_received: received,
        exit,
    }
}

/// Append whatever the device has already buffered, up to `max` bytes in total.
fn drain_available<C: DuplexChannel>(
    channel: &mut C,
    batch: &mut BytesMut,
    max: usize,
) -> std::result::Result<(), ChannelError> {
    let pending = channel
        .bytes_to_read()?
        .min(max.saturating_sub(batch.len()));
    if pending == 0 {
        return Ok(());
    }
    let start = batch.len();
    batch.resize(start + pending, 0);
    let n = channel.read(&mut batch[start..], Duration::ZERO)?;
    batch.truncate(start + n);
    Ok(())
}

fn run_writer<C, R>(
    channel: &mut C,
    source: &mut R,
    shared: &Shared,
    config: &RedirectConfig,
) -> WriterSummary
where
    C: DuplexChannel,
    R: BufRead + ?Sized,
{
    let mut record = Vec::new();
    let mut records_sent = 0u64;
    let mut bytes_sent = 0u64;

    let exit = loop {
        if shared.state() != SessionState::Running {
            break TaskExit::Cancelled;
        }

        record.clear();
        match source.read_until(b'\n', &mut record) {
            Ok(0) => break TaskExit::EndOfInput,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "source read failed, writer stopping");
                break TaskExit::Failed(err.to_string());
            }
        }

        // The source may have blocked for a long time; re-check before sending.
        if shared.state() != SessionState::Running {
            break TaskExit::Cancelled;
        }

        let out = config.line_ending.apply(&record);
        if let Err(err) = channel.write_all(&out) {
            warn!(error = %err, "device write failed, writer stopping");
            break TaskExit::Failed(err.to_string());
        }
        records_sent += 1;
        bytes_sent += out.len() as u64;
        debug!(bytes = out.len(), "sent record");
    };

    WriterSummary {
        records_sent,
        bytes_sent,
        exit,
    }
}
