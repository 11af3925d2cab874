//! Drawing one animation frame of a loaded model.

use super::camera::Camera;
use super::loader::{GpuBuffer, LoadedMaterial, LoadedModel};
use crate::error::Result;
use crate::gpu::{DrawUniforms, GpuContext, Topology};
use crate::s3d::{Frame, PrimitiveBlock, PrimitiveType, NO_PRIMITIVE_BLOCK};
use glam::Mat4;

/// What a frame render drew and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes_drawn: usize,
    pub meshes_skipped: usize,
    pub primitives_drawn: usize,
    pub primitives_skipped: usize,
}

/// Resolved references of one mesh at one frame.
struct MeshDraw<'a> {
    vertices: GpuBuffer,
    indices: GpuBuffer,
    /// `None` draws the whole index buffer as a triangle list.
    block: Option<&'a PrimitiveBlock>,
    material: &'a LoadedMaterial,
}

/// Render `frame_index` of every animated mesh with the default camera.
pub fn render_frame<C: GpuContext + ?Sized>(
    ctx: &mut C,
    loaded: &LoadedModel,
    frame_index: usize,
) -> Result<FrameStats> {
    render_frame_with(ctx, loaded, frame_index, &Camera::default())
}

/// Render `frame_index` into the currently bound target.
///
/// A mesh whose frame references something the model does not have is
/// skipped and the rest are still drawn. Errors from the device abort the
/// frame.
pub fn render_frame_with<C: GpuContext + ?Sized>(
    ctx: &mut C,
    loaded: &LoadedModel,
    frame_index: usize,
    camera: &Camera,
) -> Result<FrameStats> {
    let viewport = ctx.snapshot().viewport;
    let aspect = if viewport.height > 0.0 {
        viewport.width / viewport.height
    } else {
        1.0
    };
    let view_projection = camera.view_projection(&loaded.bbox, aspect);

    let mut stats = FrameStats::default();
    for (mesh_index, mesh) in loaded.meshes.iter().enumerate() {
        let Some(frame) = mesh.frames.get(frame_index) else {
            tracing::warn!(mesh = %mesh.name, frame_index, frames = mesh.frames.len(), "Mesh has no such frame, skipping");
            stats.meshes_skipped += 1;
            continue;
        };
        let Some(draw) = resolve(loaded, frame) else {
            tracing::warn!(mesh = %mesh.name, mesh_index, ?frame, "Frame references missing buffers, skipping mesh");
            stats.meshes_skipped += 1;
            continue;
        };

        draw_mesh(ctx, &draw, &view_projection, &mut stats)?;
        stats.meshes_drawn += 1;
    }
    Ok(stats)
}

fn resolve<'a>(loaded: &'a LoadedModel, frame: &Frame) -> Option<MeshDraw<'a>> {
    let vertices = *loaded.vertex_buffers.get(frame.vert_block as usize)?;
    let indices = *loaded.index_buffers.get(frame.index_block as usize)?;
    let material = loaded.materials.get(frame.mats_block as usize)?;
    let block = if loaded.primitive_blocks.is_empty() || frame.prim_block == NO_PRIMITIVE_BLOCK {
        None
    } else {
        Some(loaded.primitive_blocks.get(frame.prim_block as usize)?)
    };
    Some(MeshDraw {
        vertices,
        indices,
        block,
        material,
    })
}

fn draw_mesh<C: GpuContext + ?Sized>(
    ctx: &mut C,
    draw: &MeshDraw<'_>,
    view_projection: &Mat4,
    stats: &mut FrameStats,
) -> Result<()> {
    let material = draw.material;
    ctx.set_blend_state(Some(material.blend));
    ctx.set_depth_state(Some(material.depth));
    ctx.set_rasterizer_state(Some(material.rasterizer));
    ctx.set_texture(material.texture, material.sampler);
    ctx.set_uniforms(&DrawUniforms {
        view_projection: *view_projection,
        alpha_test: material.alpha_test,
        textured: material.is_textured(),
    });
    ctx.set_vertex_buffer(draw.vertices.handle);
    ctx.set_index_buffer(draw.indices.handle);

    let Some(block) = draw.block else {
        let count = draw.indices.len - draw.indices.len % 3;
        if count > 0 {
            ctx.draw_indexed(Topology::TriangleList, 0, count)?;
            stats.primitives_drawn += 1;
        }
        return Ok(());
    };

    for primitive in &block.primitives {
        let topology = match primitive.kind {
            PrimitiveType::TriangleList => Topology::TriangleList,
            PrimitiveType::TriangleStrip => Topology::TriangleStrip,
            PrimitiveType::TriangleFan => {
                tracing::warn!("Triangle fans are not supported, skipping primitive");
                stats.primitives_skipped += 1;
                continue;
            }
        };

        let in_range = primitive
            .first
            .checked_add(primitive.count)
            .is_some_and(|end| end <= draw.indices.len);
        if !in_range {
            tracing::warn!(
                first = primitive.first,
                count = primitive.count,
                available = draw.indices.len,
                "Primitive range outside the index buffer, skipping"
            );
            stats.primitives_skipped += 1;
            continue;
        }
        if primitive.count == 0 {
            continue;
        }

        ctx.draw_indexed(topology, primitive.first, primitive.count)?;
        stats.primitives_drawn += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemorySource, TextureResolver};
    use crate::gpu::spy::SpyContext;
    use crate::gpu::{
        RenderTarget, SoftwareContext, TextureDesc, TextureFormat, Viewport,
    };
    use crate::render::loader::load_model;
    use crate::s3d::parser::tests::triangle_model;
    use crate::s3d::{AnimatedMesh, IndexBuffer, Model, Primitive};

    fn load(ctx: &mut SpyContext<SoftwareContext>, model: &Model) -> LoadedModel {
        let source = MemorySource::new();
        let resolver = TextureResolver::new(&source, 0);
        load_model(ctx, model, &resolver).unwrap()
    }

    fn bind_target(ctx: &mut SpyContext<SoftwareContext>, size: u32) {
        let color = ctx
            .create_texture(
                &TextureDesc {
                    width: size,
                    height: size,
                    format: TextureFormat::Rgba8,
                    render_target: true,
                },
                None,
            )
            .unwrap();
        ctx.set_render_target(Some(RenderTarget { color, depth: None }));
        ctx.set_viewport(Viewport::square(size));
    }

    fn mesh(name: &str, frame: Frame) -> AnimatedMesh {
        AnimatedMesh {
            name: name.to_string(),
            flags: 0,
            frames: vec![frame],
        }
    }

    fn frame(vert: u16, index: u16, prim: u16, mats: u16) -> Frame {
        Frame {
            vert_block: vert,
            index_block: index,
            prim_block: prim,
            mats_block: mats,
        }
    }

    #[test]
    fn test_draws_primitive_block() {
        let model = triangle_model([0, 0, 255, 255]);
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);

        let stats = render_frame(&mut ctx, &loaded, 0).unwrap();
        assert_eq!(stats.meshes_drawn, 1);
        assert_eq!(stats.primitives_drawn, 1);
        assert_eq!(ctx.draws(), vec![(Topology::TriangleList, 0, 3)]);
    }

    #[test]
    fn test_bad_mesh_is_skipped_others_drawn() {
        let mut model = triangle_model([0, 0, 255, 255]);
        model.animation.meshes = vec![
            mesh("bad-vert", frame(5, 0, 0, 0)),
            mesh("good", frame(0, 0, 0, 0)),
            mesh("bad-index", frame(0, 9, 0, 0)),
            mesh("bad-prim", frame(0, 0, 3, 0)),
            mesh("bad-mats", frame(0, 0, 0, 7)),
        ];
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);

        let stats = render_frame(&mut ctx, &loaded, 0).unwrap();
        assert_eq!(stats.meshes_drawn, 1);
        assert_eq!(stats.meshes_skipped, 4);
        assert_eq!(ctx.draws().len(), 1);
    }

    #[test]
    fn test_missing_frame_index_skips_mesh() {
        let model = triangle_model([0, 0, 255, 255]);
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);

        let stats = render_frame(&mut ctx, &loaded, 3).unwrap();
        assert_eq!(stats.meshes_skipped, 1);
        assert!(ctx.draws().is_empty());
    }

    #[test]
    fn test_fans_and_bad_ranges_skipped() {
        let mut model = triangle_model([0, 0, 255, 255]);
        model.index_buffers = vec![IndexBuffer::new(vec![0, 1, 2, 0, 2, 1])];
        model.primitive_blocks[0].primitives = vec![
            Primitive {
                kind: PrimitiveType::TriangleFan,
                first: 0,
                count: 3,
            },
            Primitive {
                kind: PrimitiveType::TriangleStrip,
                first: 2,
                count: 4,
            },
            Primitive {
                kind: PrimitiveType::TriangleList,
                first: 4,
                count: 3,
            },
            Primitive {
                kind: PrimitiveType::TriangleList,
                first: u32::MAX,
                count: 3,
            },
        ];
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);

        let stats = render_frame(&mut ctx, &loaded, 0).unwrap();
        assert_eq!(stats.primitives_drawn, 1);
        assert_eq!(stats.primitives_skipped, 3);
        assert_eq!(ctx.draws(), vec![(Topology::TriangleStrip, 2, 4)]);
    }

    #[test]
    fn test_no_primitive_block_draws_whole_index_buffer() {
        let mut model = triangle_model([0, 0, 255, 255]);
        model.index_buffers = vec![IndexBuffer::new(vec![0, 1, 2, 2, 1, 0, 0])];
        model.animation.meshes[0].frames[0].prim_block = NO_PRIMITIVE_BLOCK;
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);
        render_frame(&mut ctx, &loaded, 0).unwrap();
        assert_eq!(ctx.draws(), vec![(Topology::TriangleList, 0, 6)]);

        // Same without any primitive blocks in the model.
        model.animation.meshes[0].frames[0].prim_block = 0;
        model.primitive_blocks.clear();
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        bind_target(&mut ctx, 16);
        render_frame(&mut ctx, &loaded, 0).unwrap();
        assert_eq!(ctx.draws(), vec![(Topology::TriangleList, 0, 6)]);
    }

    #[test]
    fn test_device_error_aborts_frame() {
        let model = triangle_model([0, 0, 255, 255]);
        let mut ctx = SpyContext::new(SoftwareContext::new());
        let loaded = load(&mut ctx, &model);
        ctx.fail_draws_after = Some(0);
        bind_target(&mut ctx, 16);
        assert!(render_frame(&mut ctx, &loaded, 0).is_err());
    }
}
