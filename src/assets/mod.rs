//! Asset storage: where model and texture bytes come from.
//!
//! Assets are addressed by a type/group/instance key. The pipeline only
//! needs [`AssetSource::get_bytes`]; the sources here cover in-memory maps,
//! loose files named after their key and ZIP archives of such files.

mod loader;
mod resolver;

pub use loader::{open_source, DirectorySource, ZipSource};
pub use resolver::{TextureResolver, FALLBACK_TEXTURE_GROUP};
pub(crate) use resolver::upload_bitmap;

use crate::error::{Result, ThumbnailError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Type id of FSH texture containers.
pub const FSH_TYPE_ID: u32 = 0x7AB5_0E44;

/// Type id of S3D models.
pub const S3D_TYPE_ID: u32 = 0x5AD0_E817;

/// Type/group/instance key of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TgiKey {
    pub type_id: u32,
    pub group: u32,
    pub instance: u32,
}

impl TgiKey {
    pub fn new(type_id: u32, group: u32, instance: u32) -> Self {
        Self {
            type_id,
            group,
            instance,
        }
    }

    pub fn texture(group: u32, instance: u32) -> Self {
        Self::new(FSH_TYPE_ID, group, instance)
    }

    pub fn model(group: u32, instance: u32) -> Self {
        Self::new(S3D_TYPE_ID, group, instance)
    }

    /// Parse a file name such as `7AB50E44-1ABE787D-00000123.fsh`.
    ///
    /// Leading directories and anything after the first `.` are ignored.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = name.rsplit(['/', '\\']).next()?;
        let stem = base.split('.').next()?;
        stem.parse().ok()
    }
}

impl fmt::Display for TgiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}-{:08X}-{:08X}", self.type_id, self.group, self.instance)
    }
}

impl FromStr for TgiKey {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ThumbnailError::ResourceUnavailable(format!("invalid asset key '{}'", s));
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [t, g, i] = parts[..] else {
            return Err(invalid());
        };
        let hex = |p: &str| {
            let p = p.trim_start_matches("0x").trim_start_matches("0X");
            u32::from_str_radix(p, 16).map_err(|_| invalid())
        };
        Ok(Self::new(hex(t)?, hex(g)?, hex(i)?))
    }
}

/// Read-only access to asset bytes.
///
/// Missing assets are reported as
/// [`ThumbnailError::ResourceUnavailable`]. Returned bytes may still be
/// compressed.
pub trait AssetSource {
    fn get_bytes(&self, key: &TgiKey) -> Result<Vec<u8>>;

    fn contains(&self, key: &TgiKey) -> bool {
        self.get_bytes(key).is_ok()
    }

    /// All keys available from this source, sorted.
    fn keys(&self) -> Vec<TgiKey>;
}

pub(crate) fn missing(key: &TgiKey) -> ThumbnailError {
    ThumbnailError::ResourceUnavailable(format!("asset {} not found", key))
}

/// Assets held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: HashMap<TgiKey, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TgiKey, bytes: Vec<u8>) {
        self.entries.insert(key, bytes);
    }

    pub fn with(mut self, key: TgiKey, bytes: Vec<u8>) -> Self {
        self.insert(key, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetSource for MemorySource {
    fn get_bytes(&self, key: &TgiKey) -> Result<Vec<u8>> {
        self.entries.get(key).cloned().ok_or_else(|| missing(key))
    }

    fn contains(&self, key: &TgiKey) -> bool {
        self.entries.contains_key(key)
    }

    fn keys(&self) -> Vec<TgiKey> {
        let mut keys: Vec<TgiKey> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }
}
