//! Asset sources backed by directories and ZIP archives.

use super::{missing, AssetSource, TgiKey};
use crate::error::Result;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Open a directory or ZIP archive of key-named asset files.
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn AssetSource>> {
    let path = path.as_ref();

    if path.is_dir() {
        Ok(Box::new(DirectorySource::open(path)?))
    } else {
        let data = std::fs::read(path)?;
        Ok(Box::new(ZipSource::from_bytes(&data)?))
    }
}

/// Loose files named `TTTTTTTT-GGGGGGGG-IIIIIIII[.ext]`, read on demand.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    index: HashMap<TgiKey, PathBuf>,
}

impl DirectorySource {
    /// Index the files under `root`, recursively.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut index = HashMap::new();
        index_directory(&root, &mut index)?;
        tracing::debug!(root = %root.display(), assets = index.len(), "Indexed asset directory");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn index_directory(dir: &Path, index: &mut HashMap<TgiKey, PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            index_directory(&path, index)?;
            continue;
        }

        let name = entry.file_name();
        match TgiKey::from_file_name(&name.to_string_lossy()) {
            Some(key) => {
                if let Some(previous) = index.insert(key, path.clone()) {
                    tracing::warn!(
                        key = %key,
                        kept = %path.display(),
                        dropped = %previous.display(),
                        "Duplicate asset key"
                    );
                }
            }
            None => tracing::debug!(file = %path.display(), "Skipping file without an asset key"),
        }
    }
    Ok(())
}

impl AssetSource for DirectorySource {
    fn get_bytes(&self, key: &TgiKey) -> Result<Vec<u8>> {
        let path = self.index.get(key).ok_or_else(|| missing(key))?;
        Ok(std::fs::read(path)?)
    }

    fn contains(&self, key: &TgiKey) -> bool {
        self.index.contains_key(key)
    }

    fn keys(&self) -> Vec<TgiKey> {
        let mut keys: Vec<TgiKey> = self.index.keys().copied().collect();
        keys.sort();
        keys
    }
}

/// A ZIP archive of key-named files, loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct ZipSource {
    entries: HashMap<TgiKey, Vec<u8>>,
}

impl ZipSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let cursor = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(cursor)?;
        let mut entries = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let Some(key) = TgiKey::from_file_name(file.name()) else {
                tracing::debug!(entry = file.name(), "Skipping archive entry without an asset key");
                continue;
            };

            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            entries.insert(key, bytes);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetSource for ZipSource {
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
