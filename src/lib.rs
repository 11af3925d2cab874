//! # S3D Thumbnailer
//!
//! A Rust library for decoding SimCity 4 model and texture assets and
//! rendering them into offscreen thumbnails.
//!
//! ## Overview
//!
//! Assets are read from an [`AssetSource`] (a directory of loose files, a ZIP
//! archive or memory), decompressed if needed, parsed into plain data
//! ([`Model`], [`fsh::TextureContainer`]) and drawn through any
//! [`GpuContext`]. [`SoftwareContext`] is a CPU backend for headless use.
//!
//! ## Quick Start
//!
//! ```ignore
//! use s3d_thumbnailer::{
//!     decompress_if_needed, generate_thumbnail, open_source, parse_model, SoftwareContext,
//!     TextureResolver, TgiKey,
//! };
//!
//! let source = open_source("path/to/assets")?;
//! let key = TgiKey::model(0x1ABE787D, 0x00000123);
//! let bytes = source.get_bytes(&key)?;
//! let model = parse_model(&decompress_if_needed(&bytes)?)?;
//!
//! let mut ctx = SoftwareContext::new();
//! let resolver = TextureResolver::new(source.as_ref(), key.group);
//! let thumbnail = generate_thumbnail(&mut ctx, &model, &resolver, 128)?;
//! thumbnail.save_png(&ctx, "thumbnail.png")?;
//! ```
//!
//! ## Custom Backends
//!
//! Implement [`GpuContext`] to render with a real device. The pipeline only
//! creates immutable buffers, textures and state objects, binds them, and
//! issues indexed draws; it saves and restores the caller's bindings around
//! every thumbnail.

pub mod error;
pub mod types;
pub mod qfs;
pub mod fsh;
pub mod s3d;
pub mod gpu;
pub mod assets;
pub mod render;

// Re-export main types for convenience
pub use error::{Result, ThumbnailError};
pub use types::BoundingBox;
pub use qfs::{decompress, decompress_if_needed, is_compressed};
pub use fsh::{convert_to_rgba8, decode_to_rgba8, parse_texture_container, Bitmap, BitmapFormat, FshParseMode};
pub use s3d::{parse_model, Model};
pub use gpu::{GpuContext, SoftwareContext};
pub use assets::{open_source, AssetSource, MemorySource, TextureResolver, TgiKey};
pub use render::{
    generate_thumbnail, load_model, render_frame, LoadedModel, Thumbnail, ThumbnailConfig,
    ThumbnailRenderer,
};

/// Decompress if needed and parse a model.
pub fn load_model_bytes(bytes: &[u8]) -> Result<Model> {
    parse_model(&decompress_if_needed(bytes)?)
}
