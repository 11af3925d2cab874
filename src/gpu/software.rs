//! CPU rasterizer implementing [`GpuContext`].
//!
//! Good enough for thumbnails and tests: one texture stage, depth test,
//! blending, alpha test, back-face culling, nearest and bilinear sampling.
//! Block-compressed textures are decoded to RGBA8 on upload.

use super::{
    AddressMode, BlendDesc, BlendStateHandle, BufferHandle, BufferKind, CullMode, DepthDesc,
    DepthStateHandle, DrawUniforms, GpuContext, GpuResource, GpuVertex, PipelineSnapshot,
    RasterizerDesc, RasterizerStateHandle, RenderTarget, SamplerDesc, SamplerHandle, TextureDesc,
    TextureFormat, TextureHandle, Topology, Viewport, GPU_VERTEX_STRIDE,
};
use crate::error::{Result, ThumbnailError};
use crate::fsh::{decode_block_compressed, BitmapFormat, MAX_DIMENSION};
use glam::Vec4;
use std::collections::HashMap;

#[derive(Debug)]
enum Buffer {
    Vertex(Vec<GpuVertex>),
    Index(Vec<u16>),
}

#[derive(Debug)]
struct Texture {
    desc: TextureDesc,
    /// RGBA8 texels for color formats.
    rgba: Vec<u8>,
    /// Depth values for depth formats.
    depth: Vec<f32>,
}

impl Texture {
    fn texel(&self, x: usize, y: usize) -> [f32; 4] {
        let i = (y * self.desc.width as usize + x) * 4;
        [
            self.rgba[i] as f32 / 255.0,
            self.rgba[i + 1] as f32 / 255.0,
            self.rgba[i + 2] as f32 / 255.0,
            self.rgba[i + 3] as f32 / 255.0,
        ]
    }

    fn put(&mut self, x: usize, y: usize, color: [f32; 4]) {
        let i = (y * self.desc.width as usize + x) * 4;
        for (c, v) in color.iter().enumerate() {
            self.rgba[i + c] = to_unorm8(*v);
        }
    }
}

fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn unavailable(reason: impl Into<String>) -> ThumbnailError {
    ThumbnailError::ResourceUnavailable(reason.into())
}

/// Software device.
///
/// All handle kinds share one id counter, so a handle is never reused.
#[derive(Debug, Default)]
pub struct SoftwareContext {
    next_id: u32,
    resource_limit: Option<usize>,
    buffers: HashMap<u32, Buffer>,
    textures: HashMap<u32, Texture>,
    samplers: HashMap<u32, SamplerDesc>,
    blend_states: HashMap<u32, BlendDesc>,
    depth_states: HashMap<u32, DepthDesc>,
    rasterizer_states: HashMap<u32, RasterizerDesc>,
    pipeline: PipelineSnapshot,
    texture: Option<TextureHandle>,
    sampler: Option<SamplerHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    uniforms: DrawUniforms,
}

impl SoftwareContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail object creation once `limit` objects are alive.
    pub fn with_resource_limit(mut self, limit: usize) -> Self {
        self.resource_limit = Some(limit);
        self
    }

    /// Number of objects created and not yet released.
    pub fn live_resources(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.blend_states.len()
            + self.depth_states.len()
            + self.rasterizer_states.len()
    }

    fn allocate_id(&mut self) -> Result<u32> {
        if let Some(limit) = self.resource_limit {
            if self.live_resources() >= limit {
                return Err(unavailable(format!("device limit of {} objects reached", limit)));
            }
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn upload_texels(desc: &TextureDesc, data: Option<&[u8]>) -> Result<Vec<u8>> {
        let pixel_bytes = desc.width as usize * desc.height as usize * 4;
        let Some(data) = data else {
            return Ok(vec![0; pixel_bytes]);
        };
        let block_format = match desc.format {
            TextureFormat::Rgba8 => {
                if data.len() != pixel_bytes {
                    return Err(unavailable(format!(
                        "RGBA8 upload of {} bytes for {}x{}",
                        data.len(),
                        desc.width,
                        desc.height
                    )));
                }
                return Ok(data.to_vec());
            }
            TextureFormat::Bc1 => BitmapFormat::Dxt1,
            TextureFormat::Bc2 => BitmapFormat::Dxt3,
            TextureFormat::Depth32 => return Ok(Vec::new()),
        };
        decode_block_compressed(block_format, desc.width, desc.height, data)
            .map_err(|e| unavailable(format!("block texture upload failed: {}", e)))
    }
}

impl GpuContext for SoftwareContext {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle> {
        let buffer = match kind {
            BufferKind::Vertex => {
                if contents.len() % GPU_VERTEX_STRIDE != 0 {
                    return Err(unavailable(format!(
                        "vertex buffer of {} bytes is not a multiple of {}",
                        contents.len(),
                        GPU_VERTEX_STRIDE
                    )));
                }
                Buffer::Vertex(
                    contents
                        .chunks_exact(GPU_VERTEX_STRIDE)
                        .map(bytemuck::pod_read_unaligned)
                        .collect(),
                )
            }
            BufferKind::Index => {
                if contents.len() % 2 != 0 {
                    return Err(unavailable("index buffer has an odd byte count"));
                }
                Buffer::Index(
                    contents
                        .chunks_exact(2)
                        .map(|b| u16::from_le_bytes([b[0], b[1]]))
                        .collect(),
                )
            }
        };
        let id = self.allocate_id()?;
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureHandle> {
        if desc.width == 0
            || desc.height == 0
            || desc.width > MAX_DIMENSION
            || desc.height > MAX_DIMENSION
        {
            return Err(unavailable(format!(
                "invalid texture size {}x{}",
                desc.width, desc.height
            )));
        }
        let rgba = Self::upload_texels(desc, data)?;
        let depth = if desc.format == TextureFormat::Depth32 {
            vec![1.0; desc.width as usize * desc.height as usize]
        } else {
            Vec::new()
        };
        let id = self.allocate_id()?;
        self.textures.insert(
            id,
            Texture {
                desc: *desc,
                rgba,
                depth,
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let id = self.allocate_id()?;
        self.samplers.insert(id, *desc);
        Ok(SamplerHandle(id))
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateHandle> {
        let id = self.allocate_id()?;
        self.blend_states.insert(id, *desc);
        Ok(BlendStateHandle(id))
    }

    fn create_depth_state(&mut self, desc: &DepthDesc) -> Result<DepthStateHandle> {
        let id = self.allocate_id()?;
        self.depth_states.insert(id, *desc);
        Ok(DepthStateHandle(id))
    }

    fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<RasterizerStateHandle> {
        let id = self.allocate_id()?;
        self.rasterizer_states.insert(id, *desc);
        Ok(RasterizerStateHandle(id))
    }

    fn release(&mut self, resource: GpuResource) {
        match resource {
            GpuResource::Buffer(h) => {
                self.buffers.remove(&h.0);
            }
            GpuResource::Texture(h) => {
                self.textures.remove(&h.0);
            }
            GpuResource::Sampler(h) => {
                self.samplers.remove(&h.0);
            }
            GpuResource::BlendState(h) => {
                self.blend_states.remove(&h.0);
            }
            GpuResource::DepthState(h) => {
                self.depth_states.remove(&h.0);
            }
            GpuResource::RasterizerState(h) => {
                self.rasterizer_states.remove(&h.0);
            }
        }
    }

    fn snapshot(&self) -> PipelineSnapshot {
        self.pipeline
    }

    fn restore(&mut self, snapshot: &PipelineSnapshot) {
        self.pipeline = *snapshot;
    }

    fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.pipeline.render_target = target;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.pipeline.viewport = viewport;
    }

    fn set_blend_state(&mut self, state: Option<BlendStateHandle>) {
        self.pipeline.blend = state;
    }

    fn set_depth_state(&mut self, state: Option<DepthStateHandle>) {
        self.pipeline.depth = state;
    }

    fn set_rasterizer_state(&mut self, state: Option<RasterizerStateHandle>) {
        self.pipeline.rasterizer = state;
    }

    fn set_texture(&mut self, texture: Option<TextureHandle>, sampler: Option<SamplerHandle>) {
        self.texture = texture;
        self.sampler = sampler;
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.vertex_buffer = Some(buffer);
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.index_buffer = Some(buffer);
    }

    fn set_uniforms(&mut self, uniforms: &DrawUniforms) {
        self.uniforms = *uniforms;
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) -> Result<()> {
        let target = self
            .pipeline
            .render_target
            .ok_or_else(|| unavailable("no render target bound"))?;
        let color_target = self
            .textures
            .get_mut(&target.color.0)
            .ok_or_else(|| unavailable("render target was released"))?;
        let texel = color.map(to_unorm8);
        for px in color_target.rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&texel);
        }
        if let Some(depth_target) = target.depth.and_then(|h| self.textures.get_mut(&h.0)) {
            depth_target.depth.fill(depth);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, topology: Topology, first: u32, count: u32) -> Result<()> {
        let target = self
            .pipeline
            .render_target
            .ok_or_else(|| unavailable("no render target bound"))?;

        let vertices = match self.vertex_buffer.and_then(|h| self.buffers.get(&h.0)) {
            Some(Buffer::Vertex(v)) => v,
            _ => return Err(unavailable("no vertex buffer bound")),
        };
        let indices = match self.index_buffer.and_then(|h| self.buffers.get(&h.0)) {
            Some(Buffer::Index(i)) => i,
            _ => return Err(unavailable("no index buffer bound")),
        };
        let (start, end) = (first as usize, first as usize + count as usize);
        let range = indices.get(start..end).ok_or_else(|| {
            ThumbnailError::CorruptData(format!(
                "draw range {}..{} outside {} indices",
                start,
                end,
                indices.len()
            ))
        })?;

        let triangles: Vec<[u16; 3]> = match topology {
            Topology::TriangleList => range.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
            Topology::TriangleStrip => range
                .windows(3)
                .enumerate()
                .map(|(i, t)| if i % 2 == 0 { [t[0], t[1], t[2]] } else { [t[1], t[0], t[2]] })
                .collect(),
        };

        // Targets are taken out of the map so sampling can borrow it.
        let mut color = self
            .textures
            .remove(&target.color.0)
            .ok_or_else(|| unavailable("render target was released"))?;
        if color.desc.format != TextureFormat::Rgba8 {
            self.textures.insert(target.color.0, color);
            return Err(unavailable("color target must be RGBA8"));
        }
        let mut depth = target.depth.and_then(|h| self.textures.remove(&h.0));

        let raster = Raster {
            viewport: self.pipeline.viewport,
            uniforms: &self.uniforms,
            blend: self
                .pipeline
                .blend
                .and_then(|h| self.blend_states.get(&h.0))
                .copied()
                .unwrap_or(BlendDesc::OPAQUE),
            depth: self.pipeline.depth.and_then(|h| self.depth_states.get(&h.0)).copied(),
            cull_mode: self
                .pipeline
                .rasterizer
                .and_then(|h| self.rasterizer_states.get(&h.0))
                .map_or(CullMode::None, |r| r.cull_mode),
            texture: self.texture.and_then(|h| self.textures.get(&h.0)).map(|t| {
                let sampler = self
                    .sampler
                    .and_then(|h| self.samplers.get(&h.0))
                    .copied()
                    .unwrap_or_default();
                (t, sampler)
            }),
        };

        for tri in &triangles {
            let corners = [
                vertices.get(tri[0] as usize),
                vertices.get(tri[1] as usize),
                vertices.get(tri[2] as usize),
            ];
            if let [Some(a), Some(b), Some(c)] = corners {
                raster.triangle(&mut color, depth.as_mut(), [a, b, c]);
            }
        }

        self.textures.insert(target.color.0, color);
        if let (Some(handle), Some(depth)) = (target.depth, depth) {
            self.textures.insert(handle.0, depth);
        }
        Ok(())
    }

    fn read_texture_rgba8(&self, texture: TextureHandle) -> Result<Vec<u8>> {
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| unavailable(format!("unknown texture {:?}", texture)))?;
        if tex.desc.format == TextureFormat::Depth32 {
            return Err(unavailable("depth textures cannot be read as RGBA8"));
        }
        Ok(tex.rgba.clone())
    }
}

struct Raster<'a> {
    viewport: Viewport,
    uniforms: &'a DrawUniforms,
    blend: BlendDesc,
    depth: Option<DepthDesc>,
    cull_mode: CullMode,
    texture: Option<(&'a Texture, SamplerDesc)>,
}

struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    color: [f32; 4],
    uv: [f32; 2],
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

impl Raster<'_> {
    fn project(&self, v: &GpuVertex) -> Option<(ScreenVertex, (f32, f32))> {
        let clip = self.uniforms.view_projection * Vec4::new(v.position[0], v.position[1], v.position[2], 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = &self.viewport;
        let screen = ScreenVertex {
            x: vp.x + (ndc.x + 1.0) * 0.5 * vp.width,
            y: vp.y + (1.0 - ndc.y) * 0.5 * vp.height,
            z: vp.min_depth + ndc.z * (vp.max_depth - vp.min_depth),
            color: v.color.map(|c| c as f32 / 255.0),
            uv: v.uv0,
        };
        Some((screen, (ndc.x, ndc.y)))
    }

    fn triangle(&self, color: &mut Texture, mut depth: Option<&mut Texture>, verts: [&GpuVertex; 3]) {
        let (Some((s0, n0)), Some((s1, n1)), Some((s2, n2))) = (
            self.project(verts[0]),
            self.project(verts[1]),
            self.project(verts[2]),
        ) else {
            return;
        };

        // Counter-clockwise in normalized device coordinates faces front.
        if self.cull_mode == CullMode::Back && edge(n0, n1, n2) <= 0.0 {
            return;
        }

        let (p0, p1, p2) = ((s0.x, s0.y), (s1.x, s1.y), (s2.x, s2.y));
        let area = edge(p0, p1, p2);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let (width, height) = (color.desc.width as f32, color.desc.height as f32);
        let vp = &self.viewport;
        let clip_x0 = vp.x.max(0.0);
        let clip_y0 = vp.y.max(0.0);
        let clip_x1 = (vp.x + vp.width).min(width);
        let clip_y1 = (vp.y + vp.height).min(height);

        let x0 = s0.x.min(s1.x).min(s2.x).floor().max(clip_x0);
        let y0 = s0.y.min(s1.y).min(s2.y).floor().max(clip_y0);
        let x1 = s0.x.max(s1.x).max(s2.x).ceil().min(clip_x1);
        let y1 = s0.y.max(s1.y).max(s2.y).ceil().min(clip_y1);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for py in y0 as usize..y1 as usize {
            for px in x0 as usize..x1 as usize {
                let p = (px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(p1, p2, p) / area;
                let w1 = edge(p2, p0, p) / area;
                let w2 = edge(p0, p1, p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let z = w0 * s0.z + w1 * s1.z + w2 * s2.z;
                if z < vp.min_depth || z > vp.max_depth {
                    continue;
                }

                let mut src = [0.0f32; 4];
                for (c, out) in src.iter_mut().enumerate() {
                    *out = w0 * s0.color[c] + w1 * s1.color[c] + w2 * s2.color[c];
                }
                if self.uniforms.textured {
                    if let Some((texture, sampler)) = &self.texture {
                        let uv = [
                            w0 * s0.uv[0] + w1 * s1.uv[0] + w2 * s2.uv[0],
                            w0 * s0.uv[1] + w1 * s1.uv[1] + w2 * s2.uv[1],
                        ];
                        let texel = sample(texture, sampler, uv);
                        for c in 0..4 {
                            src[c] *= texel[c];
                        }
                    }
                }

                let alpha_test = &self.uniforms.alpha_test;
                if alpha_test.enabled && !alpha_test.function.passes(src[3], alpha_test.reference) {
                    continue;
                }

                if let (Some(state), Some(target)) = (&self.depth, depth.as_deref_mut()) {
                    let i = py * target.desc.width as usize + px;
                    if let Some(stored) = target.depth.get_mut(i) {
                        if state.test_enabled && !state.compare.passes(z, *stored) {
                            continue;
                        }
                        if state.write_enabled {
                            *stored = z;
                        }
                    }
                }

                let out = if self.blend.enabled {
                    let dst = color.texel(px, py);
                    let sw = self.blend.src.weights(src, dst);
                    let dw = self.blend.dst.weights(src, dst);
                    [0, 1, 2, 3].map(|c| src[c] * sw[c] + dst[c] * dw[c])
                } else {
                    src
                };
                color.put(px, py, out);
            }
        }
    }
}

/// Map an integer texel coordinate into `0..size`; `None` means border color.
fn address(mode: AddressMode, i: i64, size: i64) -> Option<usize> {
    let mapped = match mode {
        AddressMode::Repeat => i.rem_euclid(size),
        AddressMode::ClampToEdge => i.clamp(0, size - 1),
        AddressMode::MirrorRepeat => {
            let m = i.rem_euclid(2 * size);
            if m >= size {
                2 * size - 1 - m
            } else {
                m
            }
        }
        AddressMode::ClampToBorder => {
            if !(0..size).contains(&i) {
                return None;
            }
            i
        }
    };
    Some(mapped as usize)
}

fn fetch(texture: &Texture, sampler: &SamplerDesc, x: i64, y: i64) -> [f32; 4] {
    let (w, h) = (texture.desc.width as i64, texture.desc.height as i64);
    match (address(sampler.address_u, x, w), address(sampler.address_v, y, h)) {
        (Some(x), Some(y)) => texture.texel(x, y),
        _ => [0.0; 4],
    }
}

fn sample(texture: &Texture, sampler: &SamplerDesc, uv: [f32; 2]) -> [f32; 4] {
    let (w, h) = (texture.desc.width as f32, texture.desc.height as f32);
    if !sampler.filter.mag_linear() {
        return fetch(texture, sampler, (uv[0] * w).floor() as i64, (uv[1] * h).floor() as i64);
    }

    let fx = uv[0] * w - 0.5;
    let fy = uv[1] * h - 0.5;
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let a = fetch(texture, sampler, x0, y0);
    let b = fetch(texture, sampler, x0.saturating_add(1), y0);
    let c = fetch(texture, sampler, x0, y0.saturating_add(1));
    let d = fetch(texture, sampler, x0.saturating_add(1), y0.saturating_add(1));
    [0, 1, 2, 3].map(|i| {
        let top = a[i] + (b[i] - a[i]) * tx;
        let bottom = c[i] + (d[i] - c[i]) * tx;
        top + (bottom - top) * ty
    })
}
