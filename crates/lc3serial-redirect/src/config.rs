use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;

/// Default wait for the first byte of each device read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default upper bound on the reader's drain after the writer finishes.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Default cap on bytes forwarded to the sink per batch.
pub const DEFAULT_MAX_BATCH: usize = 4096;

/// Terminator written after each source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl LineEnding {
    pub fn terminator(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
            LineEnding::CrLf => b"\r\n",
        }
    }

    /// Replace the record's trailing `\n` or `\r\n` with this terminator.
    ///
    /// A record without a line break (last line of a file) is returned as is.
    pub fn apply(self, record: &[u8]) -> Cow<'_, [u8]> {
        let body = if let Some(body) = record.strip_suffix(b"\r\n") {
            body
        } else if let Some(body) = record.strip_suffix(b"\n") {
            body
        } else {
            return Cow::Borrowed(record);
        };

        if record.len() - body.len() == self.terminator().len()
            && record.ends_with(self.terminator())
        {
            return Cow::Borrowed(record);
        }

        let mut out = Vec::with_capacity(body.len() + 2);
        out.extend_from_slice(body);
        out.extend_from_slice(self.terminator());
        Cow::Owned(out)
    }
}

/// Configuration for a redirection session.
#[derive(Debug, Clone)]
pub struct RedirectConfig {
    /// How long each reader poll waits for the first byte. Bounds how quickly
    /// the reader notices a stop request. Default: 1s.
    pub read_timeout: Duration,
    /// Longest the writer waits for the reader to acknowledge a drain before
    /// forcing it to stop. Default: 3s.
    pub grace_period: Duration,
    /// Terminator applied to each source record. Default: LF.
    pub line_ending: LineEnding,
    /// Largest batch forwarded to the sink in one write. Default: 4 KiB.
    pub max_batch: usize,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            line_ending: LineEnding::Lf,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}
