//! Block decompression for QFS/RefPack-style compressed assets.
//!
//! A compressed block starts with a 6-byte header:
//!
//! | bytes | meaning                                   |
//! |-------|-------------------------------------------|
//! | 0-1   | magic `0x10 0xFB` (`0xFB10` little-endian) |
//! | 2-4   | uncompressed size, 24-bit big-endian       |
//! | 5     | compression variant tag                   |
//!
//! The payload is a sequence of groups, each a control byte followed by up
//! to eight commands. Control bits are consumed least-significant first: a
//! clear bit copies one literal byte, a set bit copies a back-reference.
//!
//! A back-reference begins with a big-endian 16-bit word:
//!
//! ```text
//! short form   0 LLL OOOO OOOO OOOO           offset = O (12 bits), length = L + 3
//! long form    1 LLL OOOO OOOO OOOO  oooooooo  offset = O << 8 | o (20 bits), length = L + 4
//! ```
//!
//! A short-form length of 10 or a long-form length of 11 (the largest value
//! each can encode) is followed by one extension byte added to the length.

use crate::error::{Result, ThumbnailError};
use std::borrow::Cow;

/// Leading magic of a compressed block.
pub const QFS_MAGIC: [u8; 2] = [0x10, 0xFB];

/// Size of the block header in bytes.
pub const HEADER_LEN: usize = 6;

const SHORT_MIN_LENGTH: usize = 3;
const SHORT_EXTENDED_LENGTH: usize = 10;
const LONG_MIN_LENGTH: usize = 4;
const LONG_EXTENDED_LENGTH: usize = 11;

/// Parsed header of a compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    /// Declared size of the decompressed output.
    pub uncompressed_size: u32,
    /// Compression variant tag (byte 5).
    pub variant: u8,
}

/// Check whether a buffer starts with the compressed-block magic.
///
/// Only the first two bytes are inspected.
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == QFS_MAGIC
}

/// Read the header of a compressed block.
pub fn compressed_header(bytes: &[u8]) -> Result<CompressedHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(ThumbnailError::format(
            "compressed block",
            format!("{} bytes is shorter than the {}-byte header", bytes.len(), HEADER_LEN),
        ));
    }
    if !is_compressed(bytes) {
        return Err(ThumbnailError::format(
            "compressed block",
            format!("bad magic {:02X} {:02X}", bytes[0], bytes[1]),
        ));
    }

    Ok(CompressedHeader {
        uncompressed_size: u32::from_be_bytes([0, bytes[2], bytes[3], bytes[4]]),
        variant: bytes[5],
    })
}

/// Decompress a block.
///
/// The output always has exactly the declared uncompressed size. If the
/// stream ends early the tail stays zeroed and a warning is logged. A
/// back-reference with offset 0 or pointing before the start of the output
/// fails with [`ThumbnailError::CorruptData`].
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let header = compressed_header(bytes)?;
    let size = header.uncompressed_size as usize;
    let mut decoder = Decoder {
        input: &bytes[HEADER_LEN..],
        pos: 0,
        output: vec![0u8; size],
        written: 0,
    };

    decoder.run()?;

    if decoder.written != size {
        tracing::warn!(
            expected = size,
            actual = decoder.written,
            "Output size mismatch after decompression"
        );
    }

    Ok(decoder.output)
}

/// Decompress when the magic is present, otherwise borrow the input as is.
pub fn decompress_if_needed(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if is_compressed(bytes) && bytes.len() >= HEADER_LEN {
        decompress(bytes).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(bytes))
    }
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    output: Vec<u8>,
    written: usize,
}

impl Decoder<'_> {
    fn next_byte(&mut self) -> Option<u8> {
        let b = *self.input.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn output_full(&self) -> bool {
        self.written >= self.output.len()
    }

    fn run(&mut self) -> Result<()> {
        while !self.output_full() {
            let Some(control) = self.next_byte() else {
                return Ok(());
            };

            for bit in 0..8 {
                if self.output_full() || self.pos >= self.input.len() {
                    return Ok(());
                }

                if control & (1 << bit) == 0 {
                    let literal = self.input[self.pos];
                    self.pos += 1;
                    self.output[self.written] = literal;
                    self.written += 1;
                } else if !self.copy_reference()? {
                    tracing::warn!(
                        position = self.pos,
                        "Back-reference truncated by end of input"
                    );
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Returns `false` when the input ends inside the reference.
    fn copy_reference(&mut self) -> Result<bool> {
        let (Some(hi), Some(lo)) = (self.next_byte(), self.next_byte()) else {
            return Ok(false);
        };
        let word = u16::from_be_bytes([hi, lo]);
        let length_code = ((word >> 12) & 0x7) as usize;

        let (offset, mut length, extended) = if word & 0x8000 == 0 {
            (
                (word & 0x0FFF) as usize,
                length_code + SHORT_MIN_LENGTH,
                SHORT_EXTENDED_LENGTH,
            )
        } else {
            let Some(low) = self.next_byte() else {
                return Ok(false);
            };
            (
                ((word & 0x0FFF) as usize) << 8 | low as usize,
                length_code + LONG_MIN_LENGTH,
                LONG_EXTENDED_LENGTH,
            )
        };

        if length == extended {
            let Some(extra) = self.next_byte() else {
                return Ok(false);
            };
            length += extra as usize;
        }

        if offset == 0 || offset > self.written {
            return Err(ThumbnailError::CorruptData(format!(
                "back-reference offset {} with {} bytes written",
                offset, self.written
            )));
        }

        let available = self.output.len() - self.written;
        if length > available {
            tracing::warn!(
                length,
                available,
                "Back-reference runs past the declared size, clamping"
            );
            length = available;
        }

        // Byte by byte: source and destination may overlap.
        let start = self.written - offset;
        for i in 0..length {
            self.output[self.written + i] = self.output[start + i];
        }
        self.written += length;
        Ok(true)
    }
}
