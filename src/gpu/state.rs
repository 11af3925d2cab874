//! Legacy GL-style material codes to pipeline state.
//!
//! Every mapping is total: an unrecognized code logs a warning and resolves
//! to the documented default.

/// Comparison used by depth and alpha tests.
///
/// Codes 0..=7 follow the GL order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    const ALL: [CompareFunction; 8] = [
        Self::Never,
        Self::Less,
        Self::Equal,
        Self::LessEqual,
        Self::Greater,
        Self::NotEqual,
        Self::GreaterEqual,
        Self::Always,
    ];

    /// Function for an index in 0..=7.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Whether `value` passes against `reference`.
    pub fn passes(self, value: f32, reference: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => value < reference,
            Self::Equal => value == reference,
            Self::LessEqual => value <= reference,
            Self::Greater => value > reference,
            Self::NotEqual => value != reference,
            Self::GreaterEqual => value >= reference,
            Self::Always => true,
        }
    }
}

/// Blend factor applied to source or destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    Dst,
    OneMinusDst,
    SrcAlphaSaturated,
}

impl BlendFactor {
    /// Per-channel weights for a source and destination color.
    pub fn weights(self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let splat = |v: f32| [v; 4];
        match self {
            Self::Zero => splat(0.0),
            Self::One => splat(1.0),
            Self::Src => src,
            Self::OneMinusSrc => src.map(|c| 1.0 - c),
            Self::SrcAlpha => splat(src[3]),
            Self::OneMinusSrcAlpha => splat(1.0 - src[3]),
            Self::DstAlpha => splat(dst[3]),
            Self::OneMinusDstAlpha => splat(1.0 - dst[3]),
            Self::Dst => dst,
            Self::OneMinusDst => dst.map(|c| 1.0 - c),
            Self::SrcAlphaSaturated => {
                let f = src[3].min(1.0 - dst[3]);
                [f, f, f, 1.0]
            }
        }
    }
}

/// Texture coordinate addressing outside 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
    ClampToBorder,
}

/// Combined minification, magnification and mip filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    MinMagMipPoint,
    MinMagPointMipLinear,
    MinPointMagLinearMipPoint,
    MinPointMagMipLinear,
    MinLinearMagMipPoint,
    MinLinearMagPointMipLinear,
    MinMagLinearMipPoint,
    MinMagMipLinear,
}

impl FilterMode {
    /// Build from the three linear/point switches.
    pub fn from_parts(min_linear: bool, mag_linear: bool, mip_linear: bool) -> Self {
        match (min_linear, mag_linear, mip_linear) {
            (false, false, false) => Self::MinMagMipPoint,
            (false, false, true) => Self::MinMagPointMipLinear,
            (false, true, false) => Self::MinPointMagLinearMipPoint,
            (false, true, true) => Self::MinPointMagMipLinear,
            (true, false, false) => Self::MinLinearMagMipPoint,
            (true, false, true) => Self::MinLinearMagPointMipLinear,
            (true, true, false) => Self::MinMagLinearMipPoint,
            (true, true, true) => Self::MinMagMipLinear,
        }
    }

    pub fn min_linear(self) -> bool {
        matches!(
            self,
            Self::MinLinearMagMipPoint
                | Self::MinLinearMagPointMipLinear
                | Self::MinMagLinearMipPoint
                | Self::MinMagMipLinear
        )
    }

    pub fn mag_linear(self) -> bool {
        matches!(
            self,
            Self::MinPointMagLinearMipPoint
                | Self::MinPointMagMipLinear
                | Self::MinMagLinearMipPoint
                | Self::MinMagMipLinear
        )
    }

    pub fn mip_linear(self) -> bool {
        matches!(
            self,
            Self::MinMagPointMipLinear
                | Self::MinPointMagMipLinear
                | Self::MinLinearMagPointMipLinear
                | Self::MinMagMipLinear
        )
    }
}

/// Default alpha-test function index (greater).
pub const DEFAULT_ALPHA_FUNCTION: u8 = 4;

/// Filter code used when a material predates stored filters.
pub const DEFAULT_FILTER_CODE: u8 = 1;

/// Depth/alpha comparison code, defaulting to less-or-equal.
pub fn compare_function(code: u8) -> CompareFunction {
    CompareFunction::from_index(code).unwrap_or_else(|| {
        tracing::warn!(code, "Unknown compare function, using less-equal");
        CompareFunction::LessEqual
    })
}

/// Alpha-test function as an index in 0..=7, defaulting to greater.
pub fn alpha_function_index(code: u8) -> u8 {
    if code <= 7 {
        code
    } else {
        tracing::warn!(code, "Unknown alpha function, using greater");
        DEFAULT_ALPHA_FUNCTION
    }
}

/// Alpha-test function, defaulting to greater.
pub fn alpha_function(code: u8) -> CompareFunction {
    CompareFunction::from_index(alpha_function_index(code)).unwrap_or(CompareFunction::Greater)
}

/// Blend factor code, defaulting to one.
pub fn blend_factor(code: u8) -> BlendFactor {
    match code {
        0 => BlendFactor::Zero,
        1 => BlendFactor::One,
        2 => BlendFactor::Src,
        3 => BlendFactor::OneMinusSrc,
        4 => BlendFactor::SrcAlpha,
        5 => BlendFactor::OneMinusSrcAlpha,
        6 => BlendFactor::DstAlpha,
        7 => BlendFactor::OneMinusDstAlpha,
        8 => BlendFactor::Dst,
        9 => BlendFactor::OneMinusDst,
        10 => BlendFactor::SrcAlphaSaturated,
        _ => {
            tracing::warn!(code, "Unknown blend factor, using one");
            BlendFactor::One
        }
    }
}

/// Texture wrap code, defaulting to repeat.
pub fn address_mode(code: u8) -> AddressMode {
    match code {
        0 => AddressMode::ClampToEdge,
        1 => AddressMode::Repeat,
        2 => AddressMode::MirrorRepeat,
        3 => AddressMode::ClampToBorder,
        _ => {
            tracing::warn!(code, "Unknown wrap mode, using repeat");
            AddressMode::Repeat
        }
    }
}

/// Combined filter for a (min, mag) code pair.
///
/// Codes: 0 nearest, 1 linear, 2 nearest-mipmap-nearest,
/// 3 linear-mipmap-nearest, 4 nearest-mipmap-linear, 5 linear-mipmap-linear.
/// Unknown codes resolve to linear.
pub fn filter_mode(min_code: u8, mag_code: u8) -> FilterMode {
    let (min_linear, mip_linear) = match min_code {
        0 | 2 => (false, false),
        1 | 3 => (true, false),
        4 => (false, true),
        5 => (true, true),
        _ => {
            tracing::warn!(code = min_code, "Unknown min filter, using linear");
            (true, false)
        }
    };
    let mag_linear = match mag_code {
        0 | 2 | 4 => false,
        1 | 3 | 5 => true,
        _ => {
            tracing::warn!(code = mag_code, "Unknown mag filter, using linear");
            true
        }
    };
    FilterMode::from_parts(min_linear, mag_linear, mip_linear)
}
