use std::fmt;
use std::io;

use lc3serial_image::ImageError;
use lc3serial_redirect::RedirectError;
use lc3serial_transport::ChannelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Open { source, .. } | ChannelError::Configure { source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            PERMISSION_DENIED
        }
        ChannelError::UnsupportedBaud(_) => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn image_error(err: ImageError) -> CliError {
    match err {
        ImageError::Io { path, source } => {
            io_error(&format!("File read error: {}", path.display()), source)
        }
        other => CliError::new(DATA_INVALID, format!("{}: {other}", other.caption())),
    }
}

pub fn redirect_error(context: &str, err: RedirectError) -> CliError {
    match err {
        RedirectError::Channel(err) => channel_error(context, err),
        RedirectError::Program { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
