//! Texture lookup for model materials.

use super::{AssetSource, TgiKey};
use crate::error::{Result, ThumbnailError};
use crate::fsh::{convert_to_rgba8, parse_texture_container_with, Bitmap, BitmapFormat, FshParseMode};
use crate::gpu::{GpuContext, TextureDesc, TextureFormat, TextureHandle};
use crate::qfs::decompress_if_needed;

/// Group shared by the textures of most pre-rendered building models.
pub const FALLBACK_TEXTURE_GROUP: u32 = 0x1ABE_787D;

/// Finds the FSH texture a material refers to and uploads its main bitmap.
///
/// A texture id is an instance number. The model's own group is tried
/// first, then each fallback group in order.
pub struct TextureResolver<'a> {
    source: &'a dyn AssetSource,
    model_group: u32,
    fallback_groups: Vec<u32>,
    parse_mode: FshParseMode,
}

impl<'a> TextureResolver<'a> {
    pub fn new(source: &'a dyn AssetSource, model_group: u32) -> Self {
        Self {
            source,
            model_group,
            fallback_groups: vec![FALLBACK_TEXTURE_GROUP],
            parse_mode: FshParseMode::Strict,
        }
    }

    pub fn with_fallback_groups(mut self, groups: Vec<u32>) -> Self {
        self.fallback_groups = groups;
        self
    }

    pub fn with_parse_mode(mut self, mode: FshParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Keys tried for a texture id, in lookup order.
    pub fn candidate_keys(&self, texture_id: u32) -> Vec<TgiKey> {
        let mut keys = vec![TgiKey::texture(self.model_group, texture_id)];
        for &group in &self.fallback_groups {
            let key = TgiKey::texture(group, texture_id);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Fetch, decompress and parse the texture, returning its main bitmap.
    pub fn resolve_bitmap(&self, texture_id: u32) -> Result<Bitmap> {
        let keys = self.candidate_keys(texture_id);
        for key in &keys {
            let bytes = match self.source.get_bytes(key) {
                Ok(bytes) => bytes,
                Err(ThumbnailError::ResourceUnavailable(_)) => continue,
                Err(e) => return Err(e),
            };

            match self.decode(&bytes) {
                Ok(bitmap) => return Ok(bitmap),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Unreadable texture, trying next group");
                }
            }
        }

        Err(ThumbnailError::ResourceUnavailable(format!(
            "texture 0x{:08X} not found in groups {}",
            texture_id,
            keys.iter()
                .map(|k| format!("0x{:08X}", k.group))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bitmap> {
        let bytes = decompress_if_needed(bytes)?;
        let container = parse_texture_container_with(&bytes, self.parse_mode)?;
        container
            .bitmaps
            .into_iter()
            .next()
            .ok_or_else(|| ThumbnailError::CorruptData("texture container has no bitmaps".to_string()))
    }

    /// Resolve a texture and create it on the device.
    ///
    /// Block-compressed bitmaps are uploaded as is; the rest go through RGBA8.
    pub fn upload<C: GpuContext + ?Sized>(&self, ctx: &mut C, texture_id: u32) -> Result<TextureHandle> {
        let bitmap = self.resolve_bitmap(texture_id)?;
        upload_bitmap(ctx, &bitmap)
    }
}

/// Create a sampled texture from a bitmap.
pub(crate) fn upload_bitmap<C: GpuContext + ?Sized>(ctx: &mut C, bitmap: &Bitmap) -> Result<TextureHandle> {
    let (format, converted) = match bitmap.format {
        BitmapFormat::Dxt1 => (TextureFormat::Bc1, None),
        BitmapFormat::Dxt3 => (TextureFormat::Bc2, None),
        _ => (TextureFormat::Rgba8, Some(convert_to_rgba8(bitmap)?)),
    };
    let desc = TextureDesc {
        width: bitmap.width,
        height: bitmap.height,
        format,
        render_target: false,
    };
    let data = converted.as_deref().unwrap_or(&bitmap.data);
    ctx.create_texture(&desc, Some(data))
}
