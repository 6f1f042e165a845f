//! Program an LC-3 board over a serial line and redirect its console.
//!
//! # Crate Structure
//!
//! - [`transport`]: Duplex device channel and unix serial port
//! - [`image`]: Object image loading and validation
//! - [`redirect`]: Device programming and full-duplex redirection

/// Re-export transport types.
pub mod transport {
    pub use lc3serial_transport::*;
}

/// Re-export image types.
pub mod image {
    pub use lc3serial_image::*;
}

/// Re-export programming and redirection types.
pub mod redirect {
    pub use lc3serial_redirect::*;
}
