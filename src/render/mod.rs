//! From parsed model to pixels: device upload, frame drawing and thumbnails.

mod camera;
mod frame;
mod loader;
mod thumbnail;

pub use camera::{Camera, PITCH_DEGREES, YAW_DEGREES};
pub use frame::{render_frame, render_frame_with, FrameStats};
pub use loader::{load_model, GpuBuffer, LoadedMaterial, LoadedModel, ModelLoader};
pub use thumbnail::{generate_thumbnail, Thumbnail, ThumbnailRenderer};

use crate::assets::{AssetSource, TextureResolver, FALLBACK_TEXTURE_GROUP};
use crate::error::Result;
use crate::fsh::FshParseMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for thumbnail rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Edge length of the square output, in pixels.
    pub size: u32,
    /// Clear color as RGBA.
    pub background: [u8; 4],
    /// Extra space around the model, as a fraction of its extent.
    pub padding: f32,
    /// Smallest extent the projection covers.
    pub min_extent: f32,
    /// Animation frame to draw.
    pub frame: usize,
    /// Texture groups tried after the model's own group.
    pub fallback_texture_groups: Vec<u32>,
    /// Zero-pad textures whose last bitmap is slightly short.
    pub lenient_textures: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: 128,
            background: [0, 0, 0, 0],
            padding: 0.1,
            min_extent: 1.0,
            frame: 0,
            fallback_texture_groups: vec![FALLBACK_TEXTURE_GROUP],
            lenient_textures: false,
        }
    }
}

impl ThumbnailConfig {
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_background(mut self, rgba: [u8; 4]) -> Self {
        self.background = rgba;
        self
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_fallback_groups(mut self, groups: Vec<u32>) -> Self {
        self.fallback_texture_groups = groups;
        self
    }

    pub fn with_lenient_textures(mut self, lenient: bool) -> Self {
        self.lenient_textures = lenient;
        self
    }

    /// Parse a JSON configuration; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn camera(&self) -> Camera {
        Camera {
            padding: self.padding,
            min_extent: self.min_extent,
        }
    }

    pub fn background_f32(&self) -> [f32; 4] {
        self.background.map(|c| c as f32 / 255.0)
    }

    pub fn parse_mode(&self) -> FshParseMode {
        if self.lenient_textures {
            FshParseMode::Lenient
        } else {
            FshParseMode::Strict
        }
    }

    /// Texture resolver for a model in `model_group`, using these settings.
    pub fn resolver<'a>(&self, source: &'a dyn AssetSource, model_group: u32) -> TextureResolver<'a> {
        TextureResolver::new(source, model_group)
            .with_fallback_groups(self.fallback_texture_groups.clone())
            .with_parse_mode(self.parse_mode())
    }
}
