//! Thumbnails for the resized variant of image files.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Width of every thumbnail; height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 256;

/// Decodes `data`, scales it to [`THUMBNAIL_WIDTH`] and re-encodes it in the source format.
///
/// CPU bound; call it from `spawn_blocking`.
pub fn make_thumbnail(data: &[u8]) -> Result<Bytes, anyhow::Error> {
    let format = image::guess_format(data)?;
    let img = image::load_from_memory_with_format(data, format)?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!("image has no pixels"));
    }
    let new_height = ((u64::from(height) * u64::from(THUMBNAIL_WIDTH)) / u64::from(width)).max(1);
    let resized = img.resize_exact(THUMBNAIL_WIDTH, new_height as u32, FilterType::Lanczos3);

    let mut buffer = Vec::new();
    encode(&resized, format, &mut buffer).or_else(|e| {
        tracing::debug!(error = %e, ?format, "Can't encode thumbnail in source format, using PNG");
        buffer.clear();
        encode(&resized, ImageFormat::Png, &mut buffer)
    })?;

    Ok(Bytes::from(buffer))
}

fn encode(img: &DynamicImage, format: ImageFormat, out: &mut Vec<u8>) -> Result<(), anyhow::Error> {
    let mut cursor = Cursor::new(out);
    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut cursor, format)?,
        _ => img.write_to(&mut cursor, format)?,
    }
    Ok(())
}
