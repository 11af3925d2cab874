//! Vertex format decoding.

/// Component counts of a vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    pub positions: u8,
    pub colors: u8,
    pub uvs: u8,
}

/// Set on bitfield-encoded format codes.
pub const BITFIELD_FLAG: u32 = 0x8000_0000;

impl VertexFormat {
    pub const fn new(positions: u8, colors: u8, uvs: u8) -> Self {
        Self {
            positions,
            colors,
            uvs,
        }
    }

    /// Position + one UV set, used for unrecognized legacy codes.
    pub const FALLBACK: VertexFormat = VertexFormat::new(1, 0, 1);

    /// Decode a format code.
    ///
    /// Bitfield codes carry a 2-bit position count at bit 0, a 2-bit color
    /// count at bit 8 and a 2-bit UV count at bit 14. Other codes go through
    /// the legacy table; unknown legacy codes fall back to [`Self::FALLBACK`].
    pub fn decode(code: u32) -> Self {
        let format = if code & BITFIELD_FLAG != 0 {
            Self::new(
                (code & 0x3) as u8,
                ((code >> 8) & 0x3) as u8,
                ((code >> 14) & 0x3) as u8,
            )
        } else {
            match code {
                1 => Self::new(1, 0, 1),
                2 => Self::new(1, 1, 0),
                3 => Self::new(1, 1, 1),
                10 => Self::new(1, 0, 2),
                11 => Self::new(1, 1, 2),
                _ => {
                    tracing::warn!(code, "Unknown vertex format code, assuming position + uv");
                    Self::FALLBACK
                }
            }
        };

        // Every vertex carries a position.
        if format.positions == 0 {
            Self {
                positions: 1,
                ..format
            }
        } else {
            format
        }
    }

    /// Bytes consumed by the fields this format describes.
    pub fn byte_size(&self) -> usize {
        self.positions as usize * 12 + self.colors as usize * 4 + self.uvs as usize * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_codes() {
        assert_eq!(VertexFormat::decode(1), VertexFormat::new(1, 0, 1));
        assert_eq!(VertexFormat::decode(2), VertexFormat::new(1, 1, 0));
        assert_eq!(VertexFormat::decode(3), VertexFormat::new(1, 1, 1));
        assert_eq!(VertexFormat::decode(10), VertexFormat::new(1, 0, 2));
        assert_eq!(VertexFormat::decode(11), VertexFormat::new(1, 1, 2));
    }

    #[test]
    fn test_unknown_legacy_code_falls_back() {
        assert_eq!(VertexFormat::decode(7), VertexFormat::FALLBACK);
        assert_eq!(VertexFormat::decode(0x1234), VertexFormat::FALLBACK);
    }

    #[test]
    fn test_bitfield_code() {
        let code = BITFIELD_FLAG | 1 | (1 << 8) | (2 << 14);
        let format = VertexFormat::decode(code);
        assert_eq!(format, VertexFormat::new(1, 1, 2));
        assert_eq!(format.byte_size(), 12 + 4 + 16);
    }

    #[test]
    fn test_bitfield_without_positions_still_has_one() {
        assert_eq!(VertexFormat::decode(BITFIELD_FLAG).positions, 1);
    }
}
