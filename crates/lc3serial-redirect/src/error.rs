use lc3serial_transport::ChannelError;

use crate::session::SessionState;

/// Errors that can occur while programming or redirecting.
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    /// Channel-level error outside a running session.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Writing the image to the device failed; nothing is retried.
    #[error("programming failed ({total} byte image): {source}")]
    Program { total: usize, source: ChannelError },

    /// `start()` was called on a session that already ran.
    #[error("session already started (state: {0})")]
    AlreadyStarted(SessionState),

    /// The reader thread could not be spawned.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, RedirectError>;
