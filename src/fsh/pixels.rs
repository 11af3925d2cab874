//! Pixel unpacking to RGBA8.

use super::{Bitmap, BitmapFormat};
use crate::error::{Result, ThumbnailError};

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 65536;

/// Reject dimensions that are zero or too large, before any size arithmetic.
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ThumbnailError::format(
            "FSH bitmap",
            format!("invalid dimensions {}x{}", width, height),
        ));
    }
    Ok(())
}

/// 4-bit channel to 8-bit.
pub fn expand4(v: u16) -> u8 {
    let v = (v & 0x0F) as u8;
    (v << 4) | v
}

/// 5-bit channel to 8-bit.
pub fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

/// 6-bit channel to 8-bit.
pub fn expand6(v: u16) -> u8 {
    let v = (v & 0x3F) as u8;
    (v << 2) | (v >> 4)
}

fn check_payload(bitmap: &Bitmap) -> Result<usize> {
    validate_dimensions(bitmap.width, bitmap.height)?;
    let expected = bitmap.format.payload_len(bitmap.width, bitmap.height);
    if bitmap.data.len() < expected {
        return Err(ThumbnailError::format(
            "FSH bitmap",
            format!(
                "payload has {} bytes, {}x{} {:?} needs {}",
                bitmap.data.len(),
                bitmap.width,
                bitmap.height,
                bitmap.format,
                expected
            ),
        ));
    }
    Ok(bitmap.width as usize * bitmap.height as usize)
}

/// Convert an uncompressed bitmap to tightly packed RGBA8.
///
/// Block-compressed bitmaps are rejected with [`ThumbnailError::CorruptData`];
/// they are meant to be uploaded to the GPU as is.
pub fn convert_to_rgba8(bitmap: &Bitmap) -> Result<Vec<u8>> {
    if bitmap.format.is_block_compressed() {
        return Err(ThumbnailError::CorruptData(format!(
            "{:?} is block-compressed and must be uploaded natively",
            bitmap.format
        )));
    }
    let pixel_count = check_payload(bitmap)?;
    let mut rgba = Vec::with_capacity(pixel_count * 4);
    let data = &bitmap.data;

    match bitmap.format {
        BitmapFormat::Argb8888 => {
            for px in data.chunks_exact(4).take(pixel_count) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        BitmapFormat::Rgb888 => {
            for px in data.chunks_exact(3).take(pixel_count) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
        }
        BitmapFormat::Argb4444 => {
            for v in words(data, pixel_count) {
                rgba.extend_from_slice(&[expand4(v >> 8), expand4(v >> 4), expand4(v), expand4(v >> 12)]);
            }
        }
        BitmapFormat::Rgb565 => {
            for v in words(data, pixel_count) {
                rgba.extend_from_slice(&[expand5(v >> 11), expand6(v >> 5), expand5(v), 255]);
            }
        }
        BitmapFormat::Argb1555 => {
            for v in words(data, pixel_count) {
                let alpha = if v & 0x8000 != 0 { 255 } else { 0 };
                rgba.extend_from_slice(&[expand5(v >> 10), expand5(v >> 5), expand5(v), alpha]);
            }
        }
        BitmapFormat::Dxt1 | BitmapFormat::Dxt3 => unreachable!("rejected above"),
    }

    Ok(rgba)
}

fn words(data: &[u8], count: usize) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2)
        .take(count)
        .map(|px| u16::from_le_bytes([px[0], px[1]]))
}

/// Decode DXT1/DXT3 block data to RGBA8.
pub fn decode_block_compressed(
    format: BitmapFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Vec<u8>> {
    validate_dimensions(width, height)?;
    let (w, h) = (width as usize, height as usize);
    if data.len() < format.payload_len(width, height) {
        return Err(ThumbnailError::format(
            "FSH bitmap",
            format!("block data too short for {}x{}", width, height),
        ));
    }

    let mut pixels = vec![0u32; w * h];
    let decoded = match format {
        BitmapFormat::Dxt1 => texture2ddecoder::decode_bc1(data, w, h, &mut pixels),
        BitmapFormat::Dxt3 => texture2ddecoder::decode_bc2(data, w, h, &mut pixels),
        other => {
            return Err(ThumbnailError::CorruptData(format!(
                "{:?} is not block-compressed",
                other
            )))
        }
    };
    decoded.map_err(|e| ThumbnailError::CorruptData(format!("block decode failed: {}", e)))?;

    // The decoder packs pixels as little-endian BGRA.
    Ok(pixels
        .iter()
        .flat_map(|p| {
            let [b, g, r, a] = p.to_le_bytes();
            [r, g, b, a]
        })
        .collect())
}

/// Decode any supported bitmap to RGBA8, including block-compressed ones.
pub fn decode_to_rgba8(bitmap: &Bitmap) -> Result<Vec<u8>> {
    if bitmap.format.is_block_compressed() {
        decode_block_compressed(bitmap.format, bitmap.width, bitmap.height, &bitmap.data)
    } else {
        convert_to_rgba8(bitmap)
    }
}
