//! Duplex byte channel to a serial-attached CPU board.
//!
//! This is the lowest layer of lc3serial. The programmer and the redirector
//! only see the [`DuplexChannel`] trait; [`SerialPort`] implements it for
//! unix tty devices.

pub mod config;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod tty;

pub use config::{LineState, Parity, SerialConfig, DEFAULT_BAUD_RATE};
pub use error::{ChannelError, Result};
pub use traits::DuplexChannel;

#[cfg(unix)]
pub use tty::SerialPort;
