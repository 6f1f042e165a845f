use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::redirector::ReaderSummary;

/// Lifecycle of a redirection session.
///
/// `Idle → Running → Draining → Stopped`. `Stopped` is terminal. An external
/// stop moves any non-terminal session straight to `Stopped`; an `Idle`
/// session stopped this way never starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Running,
            2 => SessionState::Draining,
            _ => SessionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Running => 1,
            SessionState::Draining => 2,
            SessionState::Stopped => 3,
        }
    }

    /// True while the reader is expected to keep polling the device.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Draining)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// State shared by the writer, the reader thread and every [`SessionHandle`].
pub(crate) struct Shared {
    state: AtomicU8,
    writer_done: AtomicBool,
    reader_done: Mutex<bool>,
    reader_done_cv: Condvar,
    reader: Mutex<Option<JoinHandle<()>>>,
    reader_summary: Mutex<Option<ReaderSummary>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle.as_u8()),
            writer_done: AtomicBool::new(false),
            reader_done: Mutex::new(false),
            reader_done_cv: Condvar::new(),
            reader: Mutex::new(None),
            reader_summary: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }

    /// `Idle → Running`. Fails with the current state otherwise.
    pub(crate) fn begin(&self) -> Result<(), SessionState> {
        self.transition(SessionState::Idle, SessionState::Running)
    }

    /// `Running → Draining`. False if the session was already stopped.
    pub(crate) fn request_drain(&self) -> bool {
        self.transition(SessionState::Running, SessionState::Draining)
            .is_ok()
    }

    /// Move a session that has not stopped yet to `Stopped`, returning the
    /// state it left.
    pub(crate) fn force_stop(&self) -> Option<SessionState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (SessionState::from_u8(current) != SessionState::Stopped)
                    .then_some(SessionState::Stopped.as_u8())
            })
            .ok()
            .map(SessionState::from_u8)
    }

    pub(crate) fn writer_done(&self) -> bool {
        self.writer_done.load(Ordering::Acquire)
    }

    pub(crate) fn mark_writer_done(&self) {
        self.writer_done.store(true, Ordering::Release);
    }

    pub(crate) fn reader_done(&self) -> bool {
        *lock(&self.reader_done)
    }

    pub(crate) fn mark_reader_done(&self) {
        *lock(&self.reader_done) = true;
        self.reader_done_cv.notify_all();
    }

    /// Block until the reader has finished, or `timeout` passes.
    ///
    /// Returns whether the reader finished.
    pub(crate) fn wait_reader_done(&self, timeout: Option<Duration>) -> bool {
        let done = lock(&self.reader_done);
        match timeout {
            Some(timeout) => {
                let (done, _) = self
                    .reader_done_cv
                    .wait_timeout_while(done, timeout, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                *done
            }
            None => {
                let done = self
                    .reader_done_cv
                    .wait_while(done, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                *done
            }
        }
    }

    /// Spawn the reader while holding its slot, so a concurrent join never
    /// observes an empty slot for a thread that is about to exist.
    pub(crate) fn install_reader<F>(&self, spawn: F) -> std::io::Result<()>
    where
        F: FnOnce() -> std::io::Result<JoinHandle<()>>,
    {
        let mut slot = lock(&self.reader);
        *slot = Some(spawn()?);
        Ok(())
    }

    /// Join the reader thread. Safe to call from several threads; the ones
    /// that find the handle already taken wait for the done latch instead.
    pub(crate) fn join_reader(&self) {
        let handle = lock(&self.reader).take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    tracing::error!("reader thread panicked");
                }
            }
            None => {
                self.wait_reader_done(None);
            }
        }
    }

    pub(crate) fn store_reader_summary(&self, summary: ReaderSummary) {
        *lock(&self.reader_summary) = Some(summary);
    }

    pub(crate) fn take_reader_summary(&self) -> Option<ReaderSummary> {
        lock(&self.reader_summary).take()
    }
}

/// Releases the reader's done latch when the reader thread ends, even by panic.
pub(crate) struct ReaderDoneGuard(pub(crate) Arc<Shared>);

impl Drop for ReaderDoneGuard {
    fn drop(&mut self) {
        self.0.mark_reader_done();
    }
}

/// Cloneable control handle for a running session.
///
/// Obtain it from [`Redirector::handle`](crate::Redirector::handle) before
/// calling `start()`, then use it from another thread (a signal handler, a
/// supervisor) to observe or cancel the session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn reader_done(&self) -> bool {
        self.shared.reader_done()
    }

    pub fn writer_done(&self) -> bool {
        self.shared.writer_done()
    }

    /// Cancel the session and wait for the reader to finish.
    ///
    /// Calling this before `start()` latches the stop: the session will
    /// refuse to start. Calling it again, or after natural termination, does
    /// nothing. The reader notices within one device read timeout unless it
    /// is blocked writing to a stalled sink; a reader that already exited is
    /// joined immediately.
    pub fn stop(&self) {
        match self.shared.force_stop() {
            Some(SessionState::Idle) => info!("session stopped before start"),
            Some(previous) => {
                info!(from = %previous, "session stop requested");
                self.shared.join_reader();
            }
            None => {}
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("reader_done", &self.reader_done())
            .field("writer_done", &self.writer_done())
            .finish()
    }
}
