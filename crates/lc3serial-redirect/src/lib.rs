//! Programming and redirection engine.
//!
//! [`program`] transmits an [`ObjectImage`](lc3serial_image::ObjectImage) to
//! the board. A [`Redirector`] then bridges the serial channel to a source and
//! a sink with two threads: the reader copies device output to the sink, the
//! writer copies source records to the device. The writer drives the session;
//! once its input is exhausted it asks the reader to drain and stop.

pub mod config;
pub mod error;
pub mod program;
pub mod redirector;
pub mod session;

#[cfg(test)]
pub(crate) mod memory;

pub use config::{LineEnding, RedirectConfig};
pub use error::{RedirectError, Result};
pub use program::program;
pub use redirector::{Redirector, SessionReport, TaskExit};
pub use session::{SessionHandle, SessionState};
