use lc3serial_image::ObjectImage;
use lc3serial_transport::DuplexChannel;
use tracing::{debug, info};

use crate::error::{RedirectError, Result};

/// Transmit an image to the device in its on-disk form.
///
/// The whole `[count, offset, payload...]` sequence goes out in one write.
/// A failed write aborts programming; nothing is retried. Returns the number
/// of bytes sent.
pub fn program<C: DuplexChannel>(channel: &mut C, image: &ObjectImage) -> Result<usize> {
    let wire = image.encode();
    let total = wire.len();

    info!(
        port = channel.name(),
        words = image.word_count(),
        offset = %format!("{:#06x}", image.destination_offset()),
        bytes = total,
        "programming"
    );

    channel
        .write_all(&wire)
        .map_err(|source| RedirectError::Program { total, source })?;

    debug!(port = channel.name(), bytes = total, "image written");
    info!(port = channel.name(), "programming done");
    Ok(total)
}
