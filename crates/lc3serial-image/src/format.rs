use std::path::Path;

use crate::order::{ByteOrder, DEVICE_BYTE_ORDER};

/// On-disk layout of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Count-prefixed serial image: `[count, offset, payload...]`.
    Ser,
    /// Assembler output without a count word: `[offset, payload...]`.
    Obj,
}

impl ImageFormat {
    /// Pick a format from the file extension. Anything but `.obj` is `Ser`.
    pub fn detect(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("obj") => ImageFormat::Obj,
            _ => ImageFormat::Ser,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Ser => "ser",
            ImageFormat::Obj => "obj",
        }
    }
}

/// Configuration for the image loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Byte order of words in the file. Default: big-endian (device convention).
    pub source_byte_order: ByteOrder,
    /// Force a layout instead of detecting it from the extension.
    pub format: Option<ImageFormat>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source_byte_order: DEVICE_BYTE_ORDER,
            format: None,
        }
    }
}

impl LoaderConfig {
    /// Layout to use for `path`.
    pub fn format_for(&self, path: impl AsRef<Path>) -> ImageFormat {
        self.format.unwrap_or_else(|| ImageFormat::detect(path))
    }
}
