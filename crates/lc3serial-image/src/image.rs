use std::path::Path;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{ImageError, Result};
use crate::format::{ImageFormat, LoaderConfig};
use crate::order::{decode_words, ByteOrder};

/// Header words preceding the payload: count and destination offset.
pub const HEADER_WORDS: usize = 2;

/// Smallest valid serial image: count, offset and one payload word.
pub const MIN_IMAGE_BYTES: usize = 6;

/// Largest assembler `.obj` file the board loader accepts.
pub const MAX_OBJ_BYTES: usize = 0x10000;

/// A validated, immutable program image.
///
/// `payload.len() == word_count` always holds, and the serialized form is
/// exactly `2 * (word_count + 2)` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectImage {
    word_count: u16,
    destination_offset: u16,
    payload: Vec<u16>,
    source_order: ByteOrder,
}

/// One contiguous run of words destined for device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub count: u16,
    pub offset: u16,
    pub words: &'a [u16],
}

impl ObjectImage {
    /// Load an image with the default configuration.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(path, &LoaderConfig::default())
    }

    /// Load and validate an image file.
    pub fn load(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let format = config.format_for(path);
        debug!(
            ?path,
            len = bytes.len(),
            format = format.as_str(),
            order = %config.source_byte_order,
            "loading image"
        );

        match format {
            ImageFormat::Ser => Self::from_bytes(&bytes, config.source_byte_order),
            ImageFormat::Obj => Self::from_obj_bytes(&bytes, config.source_byte_order),
        }
    }

    /// Validate a count-prefixed image held in memory.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Result<Self> {
        if bytes.len() < MIN_IMAGE_BYTES || bytes.len() % 2 != 0 {
            return Err(ImageError::Size {
                len: bytes.len(),
                requirement: "size has to be a multiple of 2 and the file must contain at least 3 words",
            });
        }

        let words = decode_words(bytes, order);
        let actual = words.len() - HEADER_WORDS;
        let declared = words[0];
        if usize::from(declared) != actual {
            return Err(ImageError::CountMismatch { declared, actual });
        }

        Ok(Self {
            word_count: declared,
            destination_offset: words[1],
            payload: words[HEADER_WORDS..].to_vec(),
            source_order: order,
        })
    }

    /// Validate an assembler image (`[offset, payload...]`) and supply its count.
    ///
    /// A bare origin is accepted and yields an empty payload.
    pub fn from_obj_bytes(bytes: &[u8], order: ByteOrder) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return Err(ImageError::Size {
                len: bytes.len(),
                requirement: "object file size has to be even and hold at least an origin",
            });
        }
        if bytes.len() > MAX_OBJ_BYTES {
            return Err(ImageError::Size {
                len: bytes.len(),
                requirement: "object file must not exceed 65536 bytes",
            });
        }

        let words = decode_words(bytes, order);
        Self::from_parts(words[0], words[1..].to_vec(), order)
    }

    /// Build an image from an offset and payload.
    pub fn from_parts(
        destination_offset: u16,
        payload: Vec<u16>,
        order: ByteOrder,
    ) -> Result<Self> {
        let word_count = u16::try_from(payload.len()).map_err(|_| ImageError::Size {
            len: payload.len() * 2,
            requirement: "payload must fit a 16-bit word count",
        })?;
        Ok(Self {
            word_count,
            destination_offset,
            payload,
            source_order: order,
        })
    }

    /// Number of payload words.
    pub fn word_count(&self) -> u16 {
        self.word_count
    }

    /// Device address the payload is loaded at.
    pub fn destination_offset(&self) -> u16 {
        self.destination_offset
    }

    /// Payload words in host order.
    pub fn payload(&self) -> &[u16] {
        &self.payload
    }

    /// Byte order the image was loaded from, and is encoded back into.
    pub fn source_order(&self) -> ByteOrder {
        self.source_order
    }

    /// Serialized size in bytes.
    pub fn byte_len(&self) -> usize {
        2 * (self.payload.len() + HEADER_WORDS)
    }

    /// The image's chunks. The current container always holds exactly one.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'_>> {
        std::iter::once(Chunk {
            count: self.word_count,
            offset: self.destination_offset,
            words: &self.payload,
        })
    }

    /// Serialize back to the on-disk word sequence in the source byte order.
    pub fn encode(&self) -> Bytes {
        self.encode_as(self.source_order)
    }

    /// Serialize as `[count, offset, payload...]` in an explicit byte order.
    pub fn encode_as(&self, order: ByteOrder) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.byte_len());
        order.put_u16(&mut buf, self.word_count);
        order.put_u16(&mut buf, self.destination_offset);
        for &word in &self.payload {
            order.put_u16(&mut buf, word);
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_file(tag: &str, ext: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lc3img-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let path = dir.join(format!("image.{ext}"));
        std::fs::write(&path, bytes).expect("image should be writable");
        path
    }

    fn be_words(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn parses_minimal_image() {
        let image = ObjectImage::from_bytes(&be_words(&[1, 0x3000, 0xF025]), ByteOrder::Big)
            .expect("3-word image should parse");
        assert_eq!(image.word_count(), 1);
        assert_eq!(image.destination_offset(), 0x3000);
        assert_eq!(image.payload(), &[0xF025]);
        assert_eq!(image.byte_len(), 6);
    }

    #[test]
    fn valid_sizes_yield_matching_payload_length() {
        for words in 3..40usize {
            let mut raw = vec![(words - 2) as u16, 0x3000];
            raw.extend((0..words - 2).map(|i| i as u16));
            let image = ObjectImage::from_bytes(&be_words(&raw), ByteOrder::Big).unwrap();
            assert_eq!(image.payload().len(), words - 2);
        }
    }

    #[test]
    fn short_or_odd_files_are_size_errors() {
        for len in [0usize, 1, 2, 3, 4, 5, 7, 9, 11] {
            let err = ObjectImage::from_bytes(&vec![0u8; len], ByteOrder::Big).unwrap_err();
            assert!(matches!(err, ImageError::Size { .. }), "len {len}: {err}");
            assert_eq!(err.caption(), "File size error");
        }
    }

    #[test]
    fn wrong_count_is_rejected() {
        let err = ObjectImage::from_bytes(&be_words(&[3, 0x3000, 1, 2]), ByteOrder::Big)
            .unwrap_err();
        match err {
            ImageError::CountMismatch { declared, actual } => {
                assert_eq!(declared, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected count mismatch, got {other}"),
        }
    }

    #[test]
    fn count_is_read_in_source_order() {
        // Count 2 stored big-endian reads as 0x0200 when taken as little-endian.
        let bytes = be_words(&[2, 0x3000, 7, 8]);
        assert!(ObjectImage::from_bytes(&bytes, ByteOrder::Big).is_ok());
        let err = ObjectImage::from_bytes(&bytes, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, ImageError::CountMismatch { declared: 0x0200, .. }));
    }

    #[test]
    fn encode_reproduces_file_bytes() {
        let raw = be_words(&[3, 0x3000, 0x1020, 0x5260, 0xF025]);
        let image = ObjectImage::from_bytes(&raw, ByteOrder::Big).unwrap();
        assert_eq!(image.encode().as_ref(), raw.as_slice());

        let le = image.encode_as(ByteOrder::Little);
        assert_eq!(&le[..4], &[3, 0, 0x00, 0x30]);
    }

    #[test]
    fn round_trips_through_a_file() {
        let payload = vec![0x1234, 0x0000, 0xFFFF, 0x8001, 0x00FF];
        let built = ObjectImage::from_parts(0x4000, payload.clone(), ByteOrder::Big).unwrap();
        let path = temp_file("roundtrip", "ser", &built.encode());

        let parsed = ObjectImage::parse(&path).unwrap();
        assert_eq!(parsed.word_count(), 5);
        assert_eq!(parsed.destination_offset(), 0x4000);
        assert_eq!(parsed.payload(), payload.as_slice());
        assert_eq!(parsed, built);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn exposes_a_single_chunk() {
        let image = ObjectImage::from_parts(0x3000, vec![1, 2, 3], ByteOrder::Big).unwrap();
        let chunks: Vec<_> = image.chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].count, 3);
        assert_eq!(chunks[0].offset, 0x3000);
        assert_eq!(chunks[0].words, &[1, 2, 3]);
    }

    #[test]
    fn obj_file_gets_a_synthesized_count() {
        let path = temp_file("obj", "obj", &be_words(&[0x3000, 0xE002, 0xF022, 0xF025]));
        let image = ObjectImage::parse(&path).unwrap();
        assert_eq!(image.word_count(), 3);
        assert_eq!(image.destination_offset(), 0x3000);
        assert_eq!(
            image.encode().as_ref(),
            be_words(&[3, 0x3000, 0xE002, 0xF022, 0xF025]).as_slice()
        );
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn obj_size_limits() {
        for bytes in [&[][..], &[0x30][..], &[0x30, 0x00, 0x12][..]] {
            assert!(matches!(
                ObjectImage::from_obj_bytes(bytes, ByteOrder::Big),
                Err(ImageError::Size { .. })
            ));
        }
        assert!(matches!(
            ObjectImage::from_obj_bytes(&vec![0u8; MAX_OBJ_BYTES + 2], ByteOrder::Big),
            Err(ImageError::Size { .. })
        ));
        assert!(ObjectImage::from_obj_bytes(&vec![0u8; MAX_OBJ_BYTES], ByteOrder::Big).is_ok());
    }

    #[test]
    fn bare_obj_origin_is_an_empty_image() {
        let image = ObjectImage::from_obj_bytes(&[0x30, 0x00], ByteOrder::Big).unwrap();
        assert_eq!(image.word_count(), 0);
        assert_eq!(image.destination_offset(), 0x3000);
        assert!(image.payload().is_empty());
        assert_eq!(image.encode().as_ref(), &[0x00, 0x00, 0x30, 0x00]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ObjectImage::parse("/nonexistent/lc3serial/image.ser").unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
        assert!(!err.is_format_error());
        assert_eq!(err.caption(), "File read error");
    }
}
