//! Rendering-host abstraction.
//!
//! [`GpuContext`] is the seam between the thumbnail pipeline and whatever
//! device actually draws. Objects are referred to by small copyable handles
//! and released explicitly; the pipeline never holds a context across calls.

mod arena;
mod software;
pub mod state;

#[cfg(test)]
pub(crate) mod spy;

pub use arena::StateArena;
pub use software::SoftwareContext;
pub use state::{AddressMode, BlendFactor, CompareFunction, FilterMode};

use crate::error::Result;
use crate::s3d::Vertex;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// A vertex or index buffer.
    BufferHandle
);
handle!(
    /// A sampled texture, color target or depth target.
    TextureHandle
);
handle!(SamplerHandle);
handle!(BlendStateHandle);
handle!(DepthStateHandle);
handle!(RasterizerStateHandle);

/// Any object created through a [`GpuContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Sampler(SamplerHandle),
    BlendState(BlendStateHandle),
    DepthState(DepthStateHandle),
    RasterizerState(RasterizerStateHandle),
}

/// Vertex layout uploaded to the device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    /// R, G, B, A.
    pub color: [u8; 4],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

/// Size of one [`GpuVertex`] in bytes.
pub const GPU_VERTEX_STRIDE: usize = std::mem::size_of::<GpuVertex>();

impl From<&Vertex> for GpuVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position,
            color: v.color_rgba(),
            uv0: v.uv0.unwrap_or_default(),
            uv1: v.uv1.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    /// DXT1 blocks.
    Bc1,
    /// DXT3 blocks.
    Bc2,
    Depth32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Whether the texture can be bound as a render target.
    pub render_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub filter: FilterMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            filter: FilterMode::MinMagLinearMipPoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendDesc {
    pub const OPAQUE: BlendDesc = BlendDesc {
        enabled: false,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthDesc {
    pub test_enabled: bool,
    pub write_enabled: bool,
    pub compare: CompareFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Back,
}

/// Counter-clockwise triangles (in normalized device coordinates) face front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    pub cull_mode: CullMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-size viewport over a square target.
    pub fn square(size: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size as f32,
            height: size as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::square(0)
    }
}

/// Color target plus optional depth target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    pub color: TextureHandle,
    pub depth: Option<TextureHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaTest {
    pub enabled: bool,
    pub function: CompareFunction,
    /// Reference alpha in 0..1.
    pub reference: f32,
}

impl Default for AlphaTest {
    fn default() -> Self {
        Self {
            enabled: false,
            function: CompareFunction::Greater,
            reference: 0.5,
        }
    }
}

/// Per-draw shader constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawUniforms {
    pub view_projection: Mat4,
    pub alpha_test: AlphaTest,
    /// Modulate vertex color by the bound texture.
    pub textured: bool,
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            alpha_test: AlphaTest::default(),
            textured: false,
        }
    }
}

/// Pipeline state a caller can save and put back.
///
/// `None` for a state object means the device default (no blending, no
/// depth test, no culling).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineSnapshot {
    pub render_target: Option<RenderTarget>,
    pub viewport: Viewport,
    pub rasterizer: Option<RasterizerStateHandle>,
    pub blend: Option<BlendStateHandle>,
    pub depth: Option<DepthStateHandle>,
}

/// A device that can create resources and draw indexed triangles.
///
/// Creation failures are reported as
/// [`ThumbnailError::ResourceUnavailable`](crate::ThumbnailError::ResourceUnavailable).
pub trait GpuContext {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle>;
    /// `data` is tightly packed in `desc.format`; `None` leaves the texture zeroed.
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureHandle>;
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle>;
    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateHandle>;
    fn create_depth_state(&mut self, desc: &DepthDesc) -> Result<DepthStateHandle>;
    fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<RasterizerStateHandle>;
    /// Releasing an unknown or already released handle is a no-op.
    fn release(&mut self, resource: GpuResource);

    fn snapshot(&self) -> PipelineSnapshot;
    fn restore(&mut self, snapshot: &PipelineSnapshot);

    fn set_render_target(&mut self, target: Option<RenderTarget>);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_blend_state(&mut self, state: Option<BlendStateHandle>);
    fn set_depth_state(&mut self, state: Option<DepthStateHandle>);
    fn set_rasterizer_state(&mut self, state: Option<RasterizerStateHandle>);
    fn set_texture(&mut self, texture: Option<TextureHandle>, sampler: Option<SamplerHandle>);
    fn set_vertex_buffer(&mut self, buffer: BufferHandle);
    fn set_index_buffer(&mut self, buffer: BufferHandle);
    fn set_uniforms(&mut self, uniforms: &DrawUniforms);

    /// Clear the bound color and depth targets.
    fn clear(&mut self, color: [f32; 4], depth: f32) -> Result<()>;
    /// Draw `count` indices starting at `first` from the bound index buffer.
    fn draw_indexed(&mut self, topology: Topology, first: u32, count: u32) -> Result<()>;
    /// Copy a color texture back as tightly packed RGBA8.
    fn read_texture_rgba8(&self, texture: TextureHandle) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(GPU_VERTEX_STRIDE, 32);
        let v = Vertex::new([1.0, 2.0, 3.0]).with_color_bgra([10, 20, 30, 40]);
        let gpu = GpuVertex::from(&v);
        assert_eq!(gpu.color, [30, 20, 10, 40]);
        assert_eq!(gpu.uv0, [0.0, 0.0]);
        assert_eq!(bytemuck::bytes_of(&gpu).len(), GPU_VERTEX_STRIDE);
    }
}
