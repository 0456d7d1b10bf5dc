//! Archive collaborator: where records live and how their data is read
//!
//! The catalog and the preview pipeline only talk to a `ModArchive`.
//! `LooseArchive` is the on-disk implementation; tests use a counting mock.

pub mod loose;
pub mod texture;

pub use loose::LooseArchive;

use crate::catalog::{ModList, ModRecord};
use crate::paths::normalize_for_lookup;
use image::{Rgba32FImage, RgbaImage};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Number of floats in a material color set
pub const COLOR_SET_LEN: usize = 256;

/// Record list read/write failures
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Mod list not found at {0}")]
    MissingList(PathBuf),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid mod list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No record with path {0}")]
    UnknownRecord(String),

    #[error("No pack named {0}")]
    UnknownPack(String),

    #[error("Path leaves the archive: {0}")]
    UnsafePath(String),
}

/// Per-item decode failures. These skip one row, never the batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No data found for {0}")]
    Missing(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid DDS data: {0}")]
    Dds(String),

    #[error("Color set has {0} bytes, expected {expected}", expected = COLOR_SET_LEN * 2)]
    ColorSetSize(usize),

    #[error("Color set has {0} values, expected {expected}", expected = COLOR_SET_LEN)]
    ColorSetLen(usize),

    #[error("Pixel buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Pre-built path index for one data partition.
///
/// Built once per large batch so each decode skips the per-file lookup.
#[derive(Debug, Clone, Default)]
pub struct IndexLookup {
    pub data_file: String,
    entries: HashMap<String, PathBuf>,
}

impl IndexLookup {
    pub fn new(data_file: impl Into<String>) -> Self {
        Self {
            data_file: data_file.into(),
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, location: PathBuf) {
        self.entries.insert(normalize_for_lookup(key), location);
    }

    pub fn get(&self, key: &str) -> Option<&PathBuf> {
        self.entries.get(&normalize_for_lookup(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decoded RGBA8 pixels at native resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawTexture {
    pub fn into_image(self) -> Result<RgbaImage, DecodeError> {
        let expected = self.width as usize * self.height as usize * 4;
        let actual = self.rgba.len();
        RgbaImage::from_raw(self.width, self.height, self.rgba).ok_or(DecodeError::BufferSize {
            width: self.width,
            height: self.height,
            expected,
            actual,
        })
    }
}

/// Material color table: 16 rows of 4 RGBA float pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ColorSet(Vec<f32>);

impl ColorSet {
    pub fn new(values: Vec<f32>) -> Result<Self, DecodeError> {
        if values.len() != COLOR_SET_LEN {
            return Err(DecodeError::ColorSetLen(values.len()));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// 4x16 RGBA32F image, one row per color-set row
    pub fn into_image(self) -> Rgba32FImage {
        Rgba32FImage::from_raw(4, 16, self.0).unwrap_or_else(|| Rgba32FImage::new(4, 16))
    }
}

/// Storage of applied modifications
///
/// Mutations are keyed by `full_path` (records) or pack name. Callers
/// re-observe changes through `list_records`.
pub trait ModArchive: Send + Sync {
    fn list_records(&self) -> Result<ModList, ArchiveError>;

    fn set_record_enabled(&self, full_path: &str, enabled: bool) -> Result<(), ArchiveError>;

    fn delete_record(&self, full_path: &str) -> Result<(), ArchiveError>;

    fn delete_pack(&self, name: &str) -> Result<(), ArchiveError>;

    fn set_pack_enabled(&self, name: &str, enabled: bool) -> Result<(), ArchiveError>;

    fn build_index_lookup(&self, data_file: &str) -> Result<IndexLookup, ArchiveError>;

    /// Decode a texture, through `index` when one was prefetched
    fn decode_texture(
        &self,
        record: &ModRecord,
        index: Option<&IndexLookup>,
    ) -> Result<RawTexture, DecodeError>;

    fn decode_color_set(&self, record: &ModRecord) -> Result<ColorSet, DecodeError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory archive that counts how data was accessed
    #[derive(Default)]
    pub(crate) struct MockArchive {
        pub list: Mutex<ModList>,
        pub failing: HashSet<String>,
        pub fail_listing: bool,
        pub index_builds: AtomicUsize,
        pub lazy_decodes: AtomicUsize,
        pub indexed_decodes: AtomicUsize,
    }

    impl MockArchive {
        pub fn new(mods: Vec<ModRecord>) -> Self {
            let mut list = ModList {
                mods,
                ..Default::default()
            };
            list.refresh_counts();
            Self {
                list: Mutex::new(list),
                ..Default::default()
            }
        }

        pub fn failing_on(mut self, full_path: &str) -> Self {
            self.failing.insert(full_path.to_string());
            self
        }

        pub fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl ModArchive for MockArchive {
        fn list_records(&self) -> Result<ModList, ArchiveError> {
            if self.fail_listing {
                return Err(ArchiveError::MissingList(PathBuf::from("mock")));
            }
            Ok(self.list.lock().clone())
        }

        fn set_record_enabled(&self, full_path: &str, enabled: bool) -> Result<(), ArchiveError> {
            let mut list = self.list.lock();
            let record = list
                .mods
                .iter_mut()
                .find(|m| m.full_path == full_path)
                .ok_or_else(|| ArchiveError::UnknownRecord(full_path.to_string()))?;
            record.enabled = enabled;
            Ok(())
        }

        fn delete_record(&self, full_path: &str) -> Result<(), ArchiveError> {
            let mut list = self.list.lock();
            let before = list.mods.len();
            list.mods.retain(|m| m.full_path != full_path);
            if list.mods.len() == before {
                return Err(ArchiveError::UnknownRecord(full_path.to_string()));
            }
            list.refresh_counts();
            Ok(())
        }

        fn delete_pack(&self, name: &str) -> Result<(), ArchiveError> {
            let mut list = self.list.lock();
            list.mods.retain(|m| m.pack_name() != Some(name));
            list.mod_packs.retain(|p| p.name != name);
            list.refresh_counts();
            Ok(())
        }

        fn set_pack_enabled(&self, name: &str, enabled: bool) -> Result<(), ArchiveError> {
            let mut list = self.list.lock();
            for record in list.mods.iter_mut().filter(|m| m.pack_name() == Some(name)) {
                record.enabled = enabled;
            }
            Ok(())
        }

        fn build_index_lookup(&self, data_file: &str) -> Result<IndexLookup, ArchiveError> {
            self.index_builds.fetch_add(1, Ordering::SeqCst);
            Ok(IndexLookup::new(data_file))
        }

        fn decode_texture(
            &self,
            record: &ModRecord,
            index: Option<&IndexLookup>,
        ) -> Result<RawTexture, DecodeError> {
            match index {
                Some(_) => self.indexed_decodes.fetch_add(1, Ordering::SeqCst),
                None => self.lazy_decodes.fetch_add(1, Ordering::SeqCst),
            };
            if self.failing.contains(&record.full_path) {
                return Err(DecodeError::Dds("corrupt".to_string()));
            }
            Ok(RawTexture {
                width: 2,
                height: 2,
                rgba: vec![255; 16],
            })
        }

        fn decode_color_set(&self, record: &ModRecord) -> Result<ColorSet, DecodeError> {
            if self.failing.contains(&record.full_path) {
                return Err(DecodeError::ColorSetSize(0));
            }
            ColorSet::new(vec![0.5; COLOR_SET_LEN])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lookup_is_case_insensitive() {
        let mut index = IndexLookup::new("040000");
        index.insert("Chara/Equipment/X_D.tex", PathBuf::from("/data/x"));
        assert_eq!(index.get("chara/equipment/x_d.tex"), Some(&PathBuf::from("/data/x")));
        assert_eq!(index.len(), 1);
        assert!(index.get("chara/other.tex").is_none());
    }

    #[test]
    fn test_raw_texture_size_mismatch() {
        let texture = RawTexture {
            width: 4,
            height: 4,
            rgba: vec![0; 10],
        };
        assert!(matches!(
            texture.into_image(),
            Err(DecodeError::BufferSize { expected: 64, actual: 10, .. })
        ));
    }

    #[test]
    fn test_color_set_image_shape() {
        assert!(matches!(ColorSet::new(vec![0.0; 12]), Err(DecodeError::ColorSetLen(12))));

        let mut values = vec![0.0; COLOR_SET_LEN];
        values[4] = 1.0;
        let image = ColorSet::new(values).unwrap().into_image();
        assert_eq!(image.dimensions(), (4, 16));
        assert_eq!(image.get_pixel(1, 0).0, [1.0, 0.0, 0.0, 0.0]);
    }
}
