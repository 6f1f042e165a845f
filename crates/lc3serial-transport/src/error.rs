/// Errors that can occur on a duplex device channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to open the device.
    #[error("could not open serial port {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// The device opened but rejected the requested line settings.
    #[error("could not configure serial port {port}: {source}")]
    Configure {
        port: String,
        source: std::io::Error,
    },

    /// The baud rate has no termios equivalent on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// An I/O error occurred on an open channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device went away: a write accepted zero bytes, or a read saw the
    /// line hang up.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
