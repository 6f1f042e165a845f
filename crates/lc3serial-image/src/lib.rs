//! LC-3 object images for serial programming.
//!
//! An image is a sequence of 16-bit words:
//! - word 0: payload word count `C`
//! - word 1: destination offset in device memory
//! - words 2..2+C: payload
//!
//! Loading is all-or-nothing: either the whole file validates and an
//! [`ObjectImage`] is returned, or an [`ImageError`] explains why not.

pub mod error;
pub mod format;
pub mod image;
pub mod order;

pub use error::{ImageError, Result};
pub use format::{ImageFormat, LoaderConfig};
pub use image::{Chunk, ObjectImage, HEADER_WORDS, MAX_OBJ_BYTES, MIN_IMAGE_BYTES};
pub use order::{ByteOrder, DEVICE_BYTE_ORDER};
