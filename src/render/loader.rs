//! Uploading a parsed model to the device.

use crate::assets::TextureResolver;
use crate::error::Result;
use crate::gpu::state::{
    address_mode, alpha_function, blend_factor, compare_function, filter_mode, DEFAULT_FILTER_CODE,
};
use crate::gpu::{
    AlphaTest, BlendDesc, BlendStateHandle, BufferHandle, BufferKind, CullMode, DepthDesc,
    DepthStateHandle, GpuContext, GpuResource, GpuVertex, RasterizerDesc, RasterizerStateHandle,
    SamplerDesc, SamplerHandle, StateArena, TextureHandle,
};
use crate::s3d::{AnimatedMesh, Material, MaterialFlags, MaterialTexture, Model, PrimitiveBlock};
use crate::types::BoundingBox;
use std::collections::HashMap;

/// A device buffer and its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: BufferHandle,
    pub len: u32,
}

/// Device state for one material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedMaterial {
    pub blend: BlendStateHandle,
    pub depth: DepthStateHandle,
    pub rasterizer: RasterizerStateHandle,
    /// `None` when untextured or when the texture could not be resolved.
    pub texture: Option<TextureHandle>,
    pub sampler: Option<SamplerHandle>,
    pub alpha_test: AlphaTest,
}

impl LoadedMaterial {
    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

/// A model's device-side mirror.
///
/// Owns every object created for the model. Release it with
/// [`LoadedModel::release`]; dropping it leaks the device objects.
#[derive(Debug)]
pub struct LoadedModel {
    pub(crate) vertex_buffers: Vec<GpuBuffer>,
    pub(crate) index_buffers: Vec<GpuBuffer>,
    pub(crate) primitive_blocks: Vec<PrimitiveBlock>,
    pub(crate) materials: Vec<LoadedMaterial>,
    pub(crate) meshes: Vec<AnimatedMesh>,
    pub(crate) bbox: BoundingBox,
    textures: Vec<TextureHandle>,
    states: StateArena,
}

impl LoadedModel {
    fn empty(model: &Model) -> Self {
        Self {
            vertex_buffers: Vec::with_capacity(model.vertex_buffers.len()),
            index_buffers: Vec::with_capacity(model.index_buffers.len()),
            primitive_blocks: model.primitive_blocks.clone(),
            materials: Vec::with_capacity(model.materials.len()),
            meshes: model.animation.meshes.clone(),
            bbox: model.bbox,
            textures: Vec::new(),
            states: StateArena::new(),
        }
    }

    pub fn vertex_buffers(&self) -> &[GpuBuffer] {
        &self.vertex_buffers
    }

    pub fn index_buffers(&self) -> &[GpuBuffer] {
        &self.index_buffers
    }

    pub fn materials(&self) -> &[LoadedMaterial] {
        &self.materials
    }

    pub fn meshes(&self) -> &[AnimatedMesh] {
        &self.meshes
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Distinct textures uploaded for this model.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Distinct blend/depth/rasterizer/sampler objects.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Release every device object owned by this model.
    pub fn release<C: GpuContext + ?Sized>(mut self, ctx: &mut C) {
        self.release_objects(ctx);
    }

    fn release_objects<C: GpuContext + ?Sized>(&mut self, ctx: &mut C) {
        for buffer in self.vertex_buffers.drain(..).chain(self.index_buffers.drain(..)) {
            ctx.release(GpuResource::Buffer(buffer.handle));
        }
        for texture in self.textures.drain(..) {
            ctx.release(GpuResource::Texture(texture));
        }
        self.states.release_all(ctx);
        self.materials.clear();
    }
}

/// Create device objects for a model.
///
/// Materials whose texture cannot be resolved are drawn untextured. If any
/// device object cannot be created, everything created so far is released
/// and the error is returned.
pub fn load_model<C: GpuContext + ?Sized>(
    ctx: &mut C,
    model: &Model,
    resolver: &TextureResolver<'_>,
) -> Result<LoadedModel> {
    let mut loaded = LoadedModel::empty(model);
    match populate(ctx, model, resolver, &mut loaded) {
        Ok(()) => {
            tracing::debug!(
                vertex_buffers = loaded.vertex_buffers.len(),
                index_buffers = loaded.index_buffers.len(),
                materials = loaded.materials.len(),
                textures = loaded.textures.len(),
                states = loaded.states.len(),
                "Loaded model"
            );
            Ok(loaded)
        }
        Err(e) => {
            loaded.release_objects(ctx);
            Err(e)
        }
    }
}

fn populate<C: GpuContext + ?Sized>(
    ctx: &mut C,
    model: &Model,
    resolver: &TextureResolver<'_>,
    loaded: &mut LoadedModel,
) -> Result<()> {
    for vb in &model.vertex_buffers {
        let vertices: Vec<GpuVertex> = vb.vertices.iter().map(GpuVertex::from).collect();
        let handle = ctx.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&vertices))?;
        loaded.vertex_buffers.push(GpuBuffer {
            handle,
            len: vertices.len() as u32,
        });
    }

    for ib in &model.index_buffers {
        let handle = ctx.create_buffer(BufferKind::Index, bytemuck::cast_slice(&ib.indices))?;
        loaded.index_buffers.push(GpuBuffer {
            handle,
            len: ib.indices.len() as u32,
        });
    }

    // Materials often share a texture; look each id up once.
    let mut resolved: HashMap<u32, Option<TextureHandle>> = HashMap::new();

    for (index, material) in model.materials.iter().enumerate() {
        let slot = material.textures.first().filter(|_| material.is_textured());
        let texture = match slot {
            Some(slot) => match resolved.get(&slot.texture_id) {
                Some(handle) => *handle,
                None => {
                    let handle = resolve_texture(ctx, resolver, index, slot)?;
                    if let Some(h) = handle {
                        loaded.textures.push(h);
                    }
                    resolved.insert(slot.texture_id, handle);
                    handle
                }
            },
            None => None,
        };

        let sampler = match (texture, slot) {
            (Some(_), Some(slot)) => Some(loaded.states.sampler(ctx, &sampler_desc(slot))?),
            _ => None,
        };

        let (blend, depth, rasterizer, alpha_test) = material_states(material, texture.is_some());
        loaded.materials.push(LoadedMaterial {
            blend: loaded.states.blend_state(ctx, &blend)?,
            depth: loaded.states.depth_state(ctx, &depth)?,
            rasterizer: loaded.states.rasterizer_state(ctx, &rasterizer)?,
            texture,
            sampler,
            alpha_test,
        });
    }

    Ok(())
}

/// `Ok(None)` demotes the material; only device failures are errors.
fn resolve_texture<C: GpuContext + ?Sized>(
    ctx: &mut C,
    resolver: &TextureResolver<'_>,
    material: usize,
    slot: &MaterialTexture,
) -> Result<Option<TextureHandle>> {
    let bitmap = match resolver.resolve_bitmap(slot.texture_id) {
        Ok(bitmap) => bitmap,
        Err(e) => {
            tracing::warn!(
                material,
                texture_id = %format!("0x{:08X}", slot.texture_id),
                error = %e,
                "Texture unavailable, drawing material untextured"
            );
            return Ok(None);
        }
    };
    crate::assets::upload_bitmap(ctx, &bitmap).map(Some)
}

fn sampler_desc(slot: &MaterialTexture) -> SamplerDesc {
    SamplerDesc {
        address_u: address_mode(slot.wrap_s),
        address_v: address_mode(slot.wrap_t),
        filter: filter_mode(
            slot.min_filter.unwrap_or(DEFAULT_FILTER_CODE),
            slot.mag_filter.unwrap_or(DEFAULT_FILTER_CODE),
        ),
    }
}

/// Pipeline descriptors for a material.
pub(crate) fn material_states(
    material: &Material,
    texture_resolved: bool,
) -> (BlendDesc, DepthDesc, RasterizerDesc, AlphaTest) {
    let flags = material.flags;

    let blend = if flags.contains(MaterialFlags::BLEND) && texture_resolved {
        BlendDesc {
            enabled: true,
            src: blend_factor(material.src_blend),
            dst: blend_factor(material.dst_blend),
        }
    } else {
        BlendDesc::OPAQUE
    };

    let depth = DepthDesc {
        test_enabled: flags.contains(MaterialFlags::DEPTH_TEST),
        write_enabled: flags.contains(MaterialFlags::DEPTH_WRITE),
        compare: compare_function(material.depth_func),
    };

    let rasterizer = RasterizerDesc {
        cull_mode: if flags.contains(MaterialFlags::BACKFACE_CULL) {
            CullMode::Back
        } else {
            CullMode::None
        },
    };

    let alpha_test = AlphaTest {
        enabled: flags.contains(MaterialFlags::ALPHA_TEST),
        function: alpha_function(material.alpha_func),
        reference: material.alpha_threshold,
    };

    (blend, depth, rasterizer, alpha_test)
}

/// Keeps at most one loaded model, releasing the previous one on each load.
#[derive(Debug, Default)]
pub struct ModelLoader {
    current: Option<LoadedModel>,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        model: &Model,
        resolver: &TextureResolver<'_>,
    ) -> Result<&LoadedModel> {
        self.unload(ctx);
        let loaded = load_model(ctx, model, resolver)?;
        Ok(self.current.insert(loaded))
    }

    pub fn current(&self) -> Option<&LoadedModel> {
        self.current.as_ref()
    }

    pub fn unload<C: GpuContext + ?Sized>(&mut self, ctx: &mut C) {
        if let Some(model) = self.current.take() {
            model.release(ctx);
        }
    }
}
