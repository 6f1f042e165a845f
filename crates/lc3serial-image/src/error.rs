use std::path::PathBuf;

/// Errors that can occur while loading an object image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The file length cannot hold a valid image.
    #[error("image of {len} bytes rejected: {requirement}")]
    Size {
        len: usize,
        requirement: &'static str,
    },

    /// The count word disagrees with the number of payload words present.
    #[error("count field ({declared}) doesn't match file size ({actual})")]
    CountMismatch { declared: u16, actual: usize },

    /// The image file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ImageError {
    /// Short caption distinguishing the error class in user-facing reports.
    pub fn caption(&self) -> &'static str {
        match self {
            ImageError::Size { .. } | ImageError::CountMismatch { .. } => "File size error",
            ImageError::Io { .. } => "File read error",
        }
    }

    /// True for errors caused by the file's contents rather than by I/O.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, ImageError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, ImageError>;
