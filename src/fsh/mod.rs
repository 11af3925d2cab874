//! FSH texture container parsing.
//!
//! An FSH container holds a directory of bitmaps. The first bitmap is the
//! main image used for thumbnails; any further entries (mipmaps, companion
//! images) are parsed but not otherwise processed.
//!
//! Layout (little-endian):
//!
//! ```text
//! header     magic:4  total_size:4  entry_count:4  directory_id:4
//! directory  entry_count × { name:4  offset:4 }
//! bitmap     code:1  block_size:3  width:2  height:2  misc:2×4  payload
//! ```

mod pixels;

pub use pixels::{
    convert_to_rgba8, decode_block_compressed, decode_to_rgba8, expand4, expand5, expand6,
    validate_dimensions, MAX_DIMENSION,
};

use crate::error::{Result, ThumbnailError};
use crate::types::ByteReader;

/// Container magics accepted by the parser.
pub const FSH_MAGICS: [[u8; 4]; 4] = [*b"SHPI", *b"SHPP", *b"SHPS", *b"SHPA"];

const HEADER_LEN: usize = 16;
const DIRECTORY_ENTRY_LEN: usize = 8;
const BITMAP_HEADER_LEN: usize = 16;

/// Pixel encoding of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitmapFormat {
    /// 32-bit ARGB, stored B, G, R, A.
    Argb8888,
    /// 24-bit RGB, stored B, G, R.
    Rgb888,
    /// 16-bit 4-4-4-4 ARGB.
    Argb4444,
    /// 16-bit 5-6-5 RGB.
    Rgb565,
    /// 16-bit 1-5-5-5 ARGB.
    Argb1555,
    /// DXT1 / BC1, 8 bytes per 4×4 block.
    Dxt1,
    /// DXT3 / BC2, 16 bytes per 4×4 block.
    Dxt3,
}

impl BitmapFormat {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x7D => Some(Self::Argb8888),
            0x7F => Some(Self::Rgb888),
            0x6D => Some(Self::Argb4444),
            0x78 => Some(Self::Rgb565),
            0x7E => Some(Self::Argb1555),
            0x60 => Some(Self::Dxt1),
            0x61 => Some(Self::Dxt3),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Argb8888 => 0x7D,
            Self::Rgb888 => 0x7F,
            Self::Argb4444 => 0x6D,
            Self::Rgb565 => 0x78,
            Self::Argb1555 => 0x7E,
            Self::Dxt1 => 0x60,
            Self::Dxt3 => 0x61,
        }
    }

    pub fn is_block_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3)
    }

    /// Bytes per pixel for uncompressed formats.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Argb8888 => Some(4),
            Self::Rgb888 => Some(3),
            Self::Argb4444 | Self::Rgb565 | Self::Argb1555 => Some(2),
            Self::Dxt1 | Self::Dxt3 => None,
        }
    }

    /// Bytes per 4×4 block for block-compressed formats.
    pub fn block_bytes(self) -> Option<usize> {
        match self {
            Self::Dxt1 => Some(8),
            Self::Dxt3 => Some(16),
            _ => None,
        }
    }

    /// Exact payload size for a bitmap of the given dimensions.
    ///
    /// Dimensions must already be validated with [`validate_dimensions`].
    pub fn payload_len(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match (self.bytes_per_pixel(), self.block_bytes()) {
            (Some(bpp), _) => w * h * bpp,
            (_, Some(block)) => w.div_ceil(4) * h.div_ceil(4) * block,
            _ => 0,
        }
    }
}

/// How to treat a truncated payload in the last directory entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FshParseMode {
    /// Any short payload is a format error.
    #[default]
    Strict,
    /// A short payload in the last entry is zero-padded and logged, as long
    /// as at least half of it is present.
    Lenient,
}

/// One image within a texture container.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    /// Directory entry name.
    pub name: [u8; 4],
    pub format: BitmapFormat,
    pub width: u32,
    pub height: u32,
    /// Number of mipmaps stored after the main image (not decoded).
    pub mipmap_count: u8,
    /// Raw payload of the main image, exactly `format.payload_len(width, height)` bytes.
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Directory name as text, for display.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// A parsed FSH container.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureContainer {
    pub magic: [u8; 4],
    /// Size declared in the header.
    pub total_size: u32,
    pub directory_id: [u8; 4],
    pub bitmaps: Vec<Bitmap>,
}

impl TextureContainer {
    /// The canonical image used for thumbnailing.
    pub fn main_bitmap(&self) -> Option<&Bitmap> {
        self.bitmaps.first()
    }
}

/// Parse an FSH container with strict truncation handling.
pub fn parse_texture_container(bytes: &[u8]) -> Result<TextureContainer> {
    parse_texture_container_with(bytes, FshParseMode::Strict)
}

/// Parse an FSH container.
pub fn parse_texture_container_with(bytes: &[u8], mode: FshParseMode) -> Result<TextureContainer> {
    let mut r = ByteReader::new(bytes, "FSH header");

    let magic = r.read_magic()?;
    if !FSH_MAGICS.contains(&magic) {
        return Err(r.error(format!("unknown container magic {:?}", String::from_utf8_lossy(&magic))));
    }
    let total_size = r.read_u32_le()?;
    let entry_count = r.read_u32_le()? as usize;
    let directory_id = r.read_magic()?;

    if total_size as usize > bytes.len() {
        tracing::warn!(
            declared = total_size,
            actual = bytes.len(),
            "FSH container is shorter than its declared size"
        );
    }

    // Reject counts the buffer cannot hold before reserving anything.
    let directory_len = entry_count
        .checked_mul(DIRECTORY_ENTRY_LEN)
        .filter(|len| HEADER_LEN + len <= bytes.len())
        .ok_or_else(|| {
            ThumbnailError::format(
                "FSH directory",
                format!("{} entries do not fit in {} bytes", entry_count, bytes.len()),
            )
        })?;

    r.set_section("FSH directory");
    let mut directory = r.sub_reader(directory_len, "FSH directory")?;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let name = directory.read_magic()?;
        let offset = directory.read_u32_le()? as usize;
        entries.push((name, offset));
    }

    let mut bitmaps = Vec::with_capacity(entry_count);
    for (index, (name, offset)) in entries.iter().enumerate() {
        let is_last = index + 1 == entries.len();
        let lenient = is_last && mode == FshParseMode::Lenient;
        bitmaps.push(parse_bitmap(bytes, *name, *offset, lenient)?);
    }

    Ok(TextureContainer {
        magic,
        total_size,
        directory_id,
        bitmaps,
    })
}

fn parse_bitmap(bytes: &[u8], name: [u8; 4], offset: usize, lenient: bool) -> Result<Bitmap> {
    let mut r = ByteReader::new(bytes, "FSH bitmap");
    if offset
        .checked_add(BITMAP_HEADER_LEN)
        .map_or(true, |end| end > bytes.len())
    {
        return Err(r.error(format!(
            "entry '{}' offset {} is outside the {}-byte buffer",
            String::from_utf8_lossy(&name),
            offset,
            bytes.len()
        )));
    }
    r.seek(offset)?;

    let code = r.read_u8()?;
    let _block_size = r.read_u24_le()?;
    let width = r.read_u16_le()? as u32;
    let height = r.read_u16_le()? as u32;
    let mut misc = [0u16; 4];
    for m in &mut misc {
        *m = r.read_u16_le()?;
    }

    let format = BitmapFormat::from_code(code).ok_or_else(|| {
        ThumbnailError::CorruptData(format!(
            "entry '{}' has unsupported bitmap code 0x{:02X}",
            String::from_utf8_lossy(&name),
            code
        ))
    })?;
    validate_dimensions(width, height)?;

    let expected = format.payload_len(width, height);
    let available = r.remaining();
    let data = if expected <= available {
        r.read_bytes(expected)?.to_vec()
    } else if lenient && expected - available <= available {
        // Padding is bounded by the bytes actually present.
        tracing::warn!(
            entry = %String::from_utf8_lossy(&name),
            expected,
            available,
            "Truncated bitmap payload, zero-padding"
        );
        let mut data = r.read_bytes(available)?.to_vec();
        data.resize(expected, 0);
        data
    } else {
        return Err(r.error(format!(
            "entry '{}' needs {} payload bytes, {} available",
            String::from_utf8_lossy(&name),
            expected,
            available
        )));
    };

    Ok(Bitmap {
        name,
        format,
        width,
        height,
        mipmap_count: (misc[3] >> 12) as u8,
        data,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build a container from (name, code, width, height, payload) entries.
    pub(crate) fn build_fsh(entries: &[([u8; 4], u8, u16, u16, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        let data_start = HEADER_LEN + entries.len() * DIRECTORY_ENTRY_LEN;
        let mut directory = Vec::new();
        for (name, code, width, height, payload) in entries {
            directory.extend_from_slice(name);
            directory.extend_from_slice(&((data_start + body.len()) as u32).to_le_bytes());
            body.push(*code);
            body.extend_from_slice(&[0, 0, 0]);
            body.extend_from_slice(&width.to_le_bytes());
            body.extend_from_slice(&height.to_le_bytes());
            body.extend_from_slice(&[0u8; 8]);
            body.extend_from_slice(payload);
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"SHPI");
        bytes.extend_from_slice(&((data_start + body.len()) as u32).to_le_bytes());
        bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"G354");
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn test_parse_single_entry() {
        let bytes = build_fsh(&[(*b"0000", 0x78, 2, 1, vec![0x00, 0xF8, 0xE0, 0x07])]);
        let fsh = parse_texture_container(&bytes).unwrap();
        assert_eq!(&fsh.directory_id, b"G354");
        let main = fsh.main_bitmap().unwrap();
        assert_eq!(main.format, BitmapFormat::Rgb565);
        assert_eq!((main.width, main.height), (2, 1));
        assert_eq!(main.data.len(), 4);
    }

    #[test]
    fn test_parse_multiple_entries_keeps_order() {
        let bytes = build_fsh(&[
            (*b"main", 0x7D, 1, 1, vec![1, 2, 3, 4]),
            (*b"dxt1", 0x60, 4, 4, vec![0u8; 8]),
        ]);
        let fsh = parse_texture_container(&bytes).unwrap();
        assert_eq!(fsh.bitmaps.len(), 2);
        assert_eq!(fsh.bitmaps[0].name_str(), "main");
        assert_eq!(fsh.bitmaps[1].format, BitmapFormat::Dxt1);
    }

    #[test]
    fn test_block_payload_rounds_up() {
        assert_eq!(BitmapFormat::Dxt1.payload_len(5, 5), 4 * 8);
        assert_eq!(BitmapFormat::Dxt3.payload_len(4, 1), 16);
        assert_eq!(BitmapFormat::Rgb888.payload_len(3, 2), 18);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = build_fsh(&[(*b"0000", 0x7D, 1, 1, vec![0; 4])]);
        bytes[..4].copy_from_slice(b"NOPE");
        assert!(matches!(
            parse_texture_container(&bytes),
            Err(ThumbnailError::Format { .. })
        ));
    }

    #[test]
    fn test_huge_entry_count_rejected() {
        let mut bytes = build_fsh(&[(*b"0000", 0x7D, 1, 1, vec![0; 4])]);
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = parse_texture_container(&bytes).unwrap_err();
        assert_eq!(err.section(), Some("FSH directory"));
    }

    #[test]
    fn test_offset_outside_buffer() {
        let mut bytes = build_fsh(&[(*b"0000", 0x7D, 1, 1, vec![0; 4])]);
        bytes[20..24].copy_from_slice(&10_000u32.to_le_bytes());
        assert!(matches!(
            parse_texture_container(&bytes),
            Err(ThumbnailError::Format { .. })
        ));
    }

    #[test]
    fn test_unknown_code_is_corrupt() {
        let bytes = build_fsh(&[(*b"0000", 0x7B, 1, 1, vec![0; 4])]);
        assert!(matches!(
            parse_texture_container(&bytes),
            Err(ThumbnailError::CorruptData(_))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let bytes = build_fsh(&[(*b"0000", 0x7D, 0, 4, vec![])]);
        assert!(parse_texture_container(&bytes).is_err());
    }

    #[test]
    fn test_truncated_last_entry() {
        let mut bytes = build_fsh(&[(*b"0000", 0x7D, 2, 2, vec![7; 16])]);
        bytes.truncate(bytes.len() - 6);

        assert!(parse_texture_container(&bytes).is_err());

        let fsh = parse_texture_container_with(&bytes, FshParseMode::Lenient).unwrap();
        let main = fsh.main_bitmap().unwrap();
        assert_eq!(main.data.len(), 16);
        assert_eq!(&main.data[..10], &[7; 10]);
        assert_eq!(&main.data[10..], &[0; 6]);
    }

    #[test]
    fn test_lenient_only_applies_to_last_entry() {
        let mut bytes = build_fsh(&[
            (*b"0000", 0x7D, 1, 1, vec![0; 4]),
            (*b"0001", 0x7D, 1, 1, vec![0; 4]),
        ]);
        // Point the first entry at the tail so its payload is short.
        let tail = (bytes.len() - 18) as u32;
        bytes[20..24].copy_from_slice(&tail.to_le_bytes());
        assert!(parse_texture_container_with(&bytes, FshParseMode::Lenient).is_err());
    }

    proptest! {
        #[test]
        fn never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = bytes;
            if bytes.len() >= 4 {
                bytes[..4].copy_from_slice(b"SHPI");
            }
            let _ = parse_texture_container_with(&bytes, FshParseMode::Lenient);
        }
    }
}
