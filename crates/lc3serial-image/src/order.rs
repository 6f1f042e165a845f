use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};

/// Byte order of 16-bit words as stored on disk and sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

/// The LC-3 tool chain writes object files most significant byte first.
pub const DEVICE_BYTE_ORDER: ByteOrder = ByteOrder::Big;

impl ByteOrder {
    /// Byte order of the host running this code.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// True when words in this order must be byte-swapped on this host.
    pub fn differs_from_host(self) -> bool {
        self != Self::native()
    }

    /// Append one word in this byte order.
    pub fn put_u16(self, dst: &mut BytesMut, word: u16) {
        match self {
            ByteOrder::Big => dst.put_u16(word),
            ByteOrder::Little => dst.put_u16_le(word),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ByteOrder::Big => "big",
            ByteOrder::Little => "little",
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        DEVICE_BYTE_ORDER
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "big" | "be" => Ok(ByteOrder::Big),
            "little" | "le" => Ok(ByteOrder::Little),
            "native" => Ok(ByteOrder::native()),
            other => Err(format!("unknown byte order: {other}")),
        }
    }
}

/// Decode `bytes` as host-order words, then swap when `source` differs from the host.
///
/// `bytes.len()` must be even; a trailing odd byte is ignored.
pub(crate) fn decode_words(bytes: &[u8], source: ByteOrder) -> Vec<u16> {
    let swap = source.differs_from_host();
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let word = u16::from_ne_bytes([pair[0], pair[1]]);
            if swap {
                word.swap_bytes()
            } else {
                word
            }
        })
        .collect()
}
