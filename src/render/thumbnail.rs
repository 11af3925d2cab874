//! Offscreen thumbnail rendering.

use super::frame::render_frame_with;
use super::loader::ModelLoader;
use super::ThumbnailConfig;
use crate::assets::TextureResolver;
use crate::error::{Result, ThumbnailError};
use crate::gpu::{
    GpuContext, GpuResource, RenderTarget, TextureDesc, TextureFormat, TextureHandle, Viewport,
};
use crate::s3d::Model;
use std::path::Path;

/// A rendered thumbnail. The caller owns the color texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumbnail {
    pub texture: TextureHandle,
    pub size: u32,
}

impl Thumbnail {
    pub fn read_rgba8<C: GpuContext + ?Sized>(&self, ctx: &C) -> Result<Vec<u8>> {
        ctx.read_texture_rgba8(self.texture)
    }

    pub fn to_image<C: GpuContext + ?Sized>(&self, ctx: &C) -> Result<image::RgbaImage> {
        let pixels = self.read_rgba8(ctx)?;
        image::RgbaImage::from_raw(self.size, self.size, pixels).ok_or_else(|| {
            ThumbnailError::CorruptData(format!(
                "thumbnail readback does not hold {0}x{0} pixels",
                self.size
            ))
        })
    }

    pub fn save_png<C: GpuContext + ?Sized, P: AsRef<Path>>(&self, ctx: &C, path: P) -> Result<()> {
        self.to_image(ctx)?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    pub fn release<C: GpuContext + ?Sized>(self, ctx: &mut C) {
        ctx.release(GpuResource::Texture(self.texture));
    }
}

/// Renders thumbnails with a fixed configuration.
///
/// Holds the model loader between calls; nothing is shared globally.
#[derive(Debug, Default)]
pub struct ThumbnailRenderer {
    config: ThumbnailConfig,
    loader: ModelLoader,
}

impl ThumbnailRenderer {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self {
            config,
            loader: ModelLoader::new(),
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Render the configured frame of `model` into a new square texture.
    ///
    /// The caller's render target, viewport and pipeline states are restored
    /// whether or not rendering succeeds.
    pub fn render<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        model: &Model,
        resolver: &TextureResolver<'_>,
    ) -> Result<Thumbnail> {
        let size = self.config.size;
        if size == 0 {
            return Err(ThumbnailError::ResourceUnavailable(
                "thumbnail size must be positive".to_string(),
            ));
        }

        let color = ctx.create_texture(&target_desc(size, TextureFormat::Rgba8), None)?;
        let depth = match ctx.create_texture(&target_desc(size, TextureFormat::Depth32), None) {
            Ok(depth) => depth,
            Err(e) => {
                ctx.release(GpuResource::Texture(color));
                return Err(e);
            }
        };

        let target = RenderTarget {
            color,
            depth: Some(depth),
        };
        let saved = ctx.snapshot();
        let result = self.render_into(ctx, model, resolver, target);
        ctx.restore(&saved);

        ctx.release(GpuResource::Texture(depth));
        self.loader.unload(ctx);

        match result {
            Ok(()) => Ok(Thumbnail {
                texture: color,
                size,
            }),
            Err(e) => {
                ctx.release(GpuResource::Texture(color));
                Err(e)
            }
        }
    }

    fn render_into<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        model: &Model,
        resolver: &TextureResolver<'_>,
        target: RenderTarget,
    ) -> Result<()> {
        ctx.set_render_target(Some(target));
        ctx.set_viewport(Viewport::square(self.config.size));
        ctx.clear(self.config.background_f32(), 1.0)?;

        let loaded = self.loader.load(ctx, model, resolver)?;
        let stats = render_frame_with(ctx, loaded, self.config.frame, &self.config.camera())?;
        tracing::debug!(
            meshes = stats.meshes_drawn,
            skipped = stats.meshes_skipped,
            primitives = stats.primitives_drawn,
            "Rendered thumbnail"
        );
        Ok(())
    }
}

fn target_desc(size: u32, format: TextureFormat) -> TextureDesc {
    TextureDesc {
        width: size,
        height: size,
        format,
        render_target: true,
    }
}

/// Render frame 0 of `model` into a new `size` x `size` texture with the
/// default configuration.
pub fn generate_thumbnail<C: GpuContext + ?Sized>(
    ctx: &mut C,
    model: &Model,
    resolver: &TextureResolver<'_>,
    size: u32,
) -> Result<Thumbnail> {
    ThumbnailRenderer::new(ThumbnailConfig::default().with_size(size)).render(ctx, model, resolver)
}
