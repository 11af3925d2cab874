//! S3D model container types and parsing.
//!
//! A model is an immutable value produced once by [`parse_model`]. Frames in
//! its animation table refer to buffers and materials by index; those
//! references are not validated here but when a frame is rendered.

pub(crate) mod parser;
mod vertex_format;

pub use parser::{parse_model, MAX_BLOCKS};
pub use vertex_format::{VertexFormat, BITFIELD_FLAG};

use crate::types::BoundingBox;
use bitflags::bitflags;

/// Frame index value meaning "no primitive block": draw the whole index buffer.
pub const NO_PRIMITIVE_BLOCK: u16 = 0xFFFF;

/// A parsed S3D model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub major_version: u16,
    pub minor_version: u16,
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffers: Vec<IndexBuffer>,
    pub primitive_blocks: Vec<PrimitiveBlock>,
    pub materials: Vec<Material>,
    pub animation: Animation,
    /// Union of all vertex buffer bounds.
    pub bbox: BoundingBox,
}

/// A single vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Packed color in B, G, R, A byte order.
    pub color: [u8; 4],
    pub uv0: Option<[f32; 2]>,
    pub uv1: Option<[f32; 2]>,
}

impl Vertex {
    /// Opaque white, the color of vertices without a color component.
    pub const DEFAULT_COLOR: [u8; 4] = [255, 255, 255, 255];

    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            color: Self::DEFAULT_COLOR,
            uv0: None,
            uv1: None,
        }
    }

    pub fn with_color_bgra(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, uv: [f32; 2]) -> Self {
        self.uv0 = Some(uv);
        self
    }

    /// Color reordered to R, G, B, A.
    pub fn color_rgba(&self) -> [u8; 4] {
        let [b, g, r, a] = self.color;
        [r, g, b, a]
    }
}

/// A block of vertices sharing one format.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    pub flags: u16,
    /// Format code as stored.
    pub format_code: u32,
    pub format: VertexFormat,
    /// Distance between consecutive vertices in the file.
    pub stride: u32,
    pub vertices: Vec<Vertex>,
    pub bbox: BoundingBox,
}

impl VertexBuffer {
    /// Build a buffer from vertices, computing its bounds.
    pub fn new(format_code: u32, vertices: Vec<Vertex>) -> Self {
        let format = VertexFormat::decode(format_code);
        let bbox = BoundingBox::from_points(vertices.iter().map(|v| v.position)).unwrap_or_default();
        Self {
            flags: 0,
            format_code,
            format,
            stride: format.byte_size() as u32,
            vertices,
            bbox,
        }
    }
}

/// A block of 16-bit indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub flags: u16,
    pub stride: u16,
    pub indices: Vec<u16>,
}

impl IndexBuffer {
    pub fn new(indices: Vec<u16>) -> Self {
        Self {
            flags: 0,
            stride: 2,
            indices,
        }
    }
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::TriangleList),
            1 => Some(Self::TriangleStrip),
            2 => Some(Self::TriangleFan),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::TriangleList => 0,
            Self::TriangleStrip => 1,
            Self::TriangleFan => 2,
        }
    }
}

/// One draw: a range of the index buffer with a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub kind: PrimitiveType,
    pub first: u32,
    pub count: u32,
}

/// Primitives drawn together for one mesh at one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveBlock {
    pub primitives: Vec<Primitive>,
}

bitflags! {
    /// Fixed-function state switches of a material.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        const ALPHA_TEST    = 0x01;
        const DEPTH_TEST    = 0x02;
        const FLAT_SHADE    = 0x04;
        const BACKFACE_CULL = 0x08;
        const BLEND         = 0x10;
        const TEXTURED      = 0x20;
        const DEPTH_WRITE   = 0x80;
    }
}

/// A texture slot of a material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTexture {
    /// Instance id used to look the texture up; not a pointer into this model.
    pub texture_id: u32,
    pub wrap_s: u8,
    pub wrap_t: u8,
    /// Only stored by minor version 5.
    pub mag_filter: Option<u8>,
    /// Only stored by minor version 5.
    pub min_filter: Option<u8>,
    pub anim_rate: u16,
    pub anim_mode: u16,
    pub anim_name: String,
}

impl MaterialTexture {
    pub fn new(texture_id: u32) -> Self {
        Self {
            texture_id,
            wrap_s: 1,
            wrap_t: 1,
            mag_filter: None,
            min_filter: None,
            anim_rate: 0,
            anim_mode: 0,
            anim_name: String::new(),
        }
    }
}

/// Fixed-function render state plus texture references.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub flags: MaterialFlags,
    pub alpha_func: u8,
    pub depth_func: u8,
    pub src_blend: u8,
    pub dst_blend: u8,
    /// Alpha-test reference, normalized to 0..1.
    pub alpha_threshold: f32,
    pub material_class: u32,
    pub textures: Vec<MaterialTexture>,
}

impl Material {
    /// An untextured, depth-tested, opaque material.
    pub fn untextured() -> Self {
        Self {
            flags: MaterialFlags::DEPTH_TEST | MaterialFlags::DEPTH_WRITE,
            alpha_func: 4,
            depth_func: 3,
            src_blend: 1,
            dst_blend: 0,
            alpha_threshold: 0.5,
            material_class: 0,
            textures: Vec::new(),
        }
    }

    pub fn is_textured(&self) -> bool {
        self.flags.contains(MaterialFlags::TEXTURED) && !self.textures.is_empty()
    }
}

/// Buffer/material selection of one mesh at one keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub vert_block: u16,
    pub index_block: u16,
    pub prim_block: u16,
    pub mats_block: u16,
}

/// A named mesh with one [`Frame`] per animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedMesh {
    pub name: String,
    pub flags: u8,
    pub frames: Vec<Frame>,
}

/// Keyframe table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub frame_count: u16,
    pub frame_rate: u16,
    pub mode: u16,
    pub flags: u32,
    pub displacement: f32,
    pub meshes: Vec<AnimatedMesh>,
}

impl Model {
    /// Whether the model is in the supported version range.
    pub fn is_supported_version(minor_version: u16) -> bool {
        (1..=5).contains(&minor_version)
    }

    /// Recompute the overall bounds from the vertex buffers.
    pub fn compute_bbox(vertex_buffers: &[VertexBuffer]) -> BoundingBox {
        vertex_buffers
            .iter()
            .filter(|vb| !vb.vertices.is_empty())
            .map(|vb| vb.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_buffers.iter().map(|vb| vb.vertices.len()).sum()
    }

    pub fn primitive_count(&self) -> usize {
        self.primitive_blocks.iter().map(|b| b.primitives.len()).sum()
    }
}
