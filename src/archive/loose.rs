//! Loose-file archive
//!
//! Layout:
//! ```text
//! <root>/modlist.json
//! <root>/<dataFile>/modded/<fullPath>     data read while a record is enabled
//! <root>/<dataFile>/original/<fullPath>   data read while it is disabled
//! ```
//! Textures are DDS files, material color sets are raw 512-byte tables.

use super::texture::{decode_dds, parse_color_set};
use super::{ArchiveError, ColorSet, DecodeError, IndexLookup, ModArchive, RawTexture};
use crate::catalog::{ModList, ModRecord};
use crate::paths::{ensure_parent_dirs, is_safe_relative, relative_key, resolve_case_insensitive};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const MOD_LIST_FILE: &str = "modlist.json";
const MODDED_DIR: &str = "modded";
const ORIGINAL_DIR: &str = "original";

pub struct LooseArchive {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the mod list
    write_lock: Mutex<()>,
}

impl LooseArchive {
    /// Open an existing archive directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        let list_path = root.join(MOD_LIST_FILE);
        if !list_path.is_file() {
            return Err(ArchiveError::MissingList(list_path));
        }
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list_path(&self) -> PathBuf {
        self.root.join(MOD_LIST_FILE)
    }

    fn load(&self) -> Result<ModList, ArchiveError> {
        let path = self.list_path();
        let content = fs::read_to_string(&path).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ArchiveError::Parse { path, source })
    }

    fn save(&self, list: &mut ModList) -> Result<(), ArchiveError> {
        list.refresh_counts();
        let path = self.list_path();
        let json = serde_json::to_string_pretty(list).map_err(|source| ArchiveError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ArchiveError::Io { path, source })
    }

    /// Load, apply `edit`, save. The lock covers the whole cycle.
    fn update<F>(&self, edit: F) -> Result<(), ArchiveError>
    where
        F: FnOnce(&mut ModList) -> Result<(), ArchiveError>,
    {
        let _guard = self.write_lock.lock();
        let mut list = self.load()?;
        edit(&mut list)?;
        self.save(&mut list)
    }

    fn partition_dir(&self, data_file: &str) -> Option<PathBuf> {
        is_safe_relative(data_file).then(|| self.root.join(data_file))
    }

    /// Partition of `record`, or None when either of its paths would
    /// resolve outside the archive root
    fn record_partition(&self, record: &ModRecord) -> Option<PathBuf> {
        let partition = self
            .partition_dir(&record.data_file)
            .filter(|_| is_safe_relative(&record.full_path));
        if partition.is_none() {
            warn!(
                "Ignoring data for {} in {}: path leaves the archive",
                record.full_path, record.data_file
            );
        }
        partition
    }

    fn side(record: &ModRecord) -> &'static str {
        if record.enabled {
            MODDED_DIR
        } else {
            ORIGINAL_DIR
        }
    }

    /// Where the active data of `record` lives on disk
    fn locate(&self, record: &ModRecord, index: Option<&IndexLookup>) -> Result<PathBuf, DecodeError> {
        let partition = self
            .record_partition(record)
            .ok_or_else(|| DecodeError::Missing(record.full_path.clone()))?;
        let key = format!("{}/{}", Self::side(record), record.full_path);

        if let Some(index) = index.filter(|i| i.data_file == record.data_file) {
            if let Some(path) = index.get(&key) {
                return Ok(path.clone());
            }
            debug!("Index miss for {}, resolving directly", key);
        }

        resolve_case_insensitive(&partition, &key)
            .filter(|p| p.is_file())
            .ok_or_else(|| DecodeError::Missing(record.full_path.clone()))
    }

    fn read_data(&self, record: &ModRecord, index: Option<&IndexLookup>) -> Result<Vec<u8>, DecodeError> {
        let path = self.locate(record, index)?;
        fs::read(&path).map_err(|source| DecodeError::Io { path, source })
    }

    fn remove_modded_file(&self, record: &ModRecord) {
        let Some(partition) = self.record_partition(record) else {
            return;
        };
        let key = format!("{}/{}", MODDED_DIR, record.full_path);
        if let Some(path) = resolve_case_insensitive(&partition, &key) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    /// Write the modded (and optionally original) data for a record.
    /// Used to import loose files and by tests to lay out fixtures.
    pub fn write_data(&self, record: &ModRecord, modded: &[u8], original: Option<&[u8]>) -> anyhow::Result<()> {
        use anyhow::Context;

        let partition = self
            .record_partition(record)
            .ok_or_else(|| ArchiveError::UnsafePath(format!("{}/{}", record.data_file, record.full_path)))?;
        let mut targets = vec![(partition.join(MODDED_DIR).join(&record.full_path), modded)];
        if let Some(original) = original {
            targets.push((partition.join(ORIGINAL_DIR).join(&record.full_path), original));
        }

        for (path, data) in targets {
            ensure_parent_dirs(&path)
                .with_context(|| format!("Failed to create directory for {}", path.display()))?;
            fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }
}

impl ModArchive for LooseArchive {
    fn list_records(&self) -> Result<ModList, ArchiveError> {
        self.load()
    }

    fn set_record_enabled(&self, full_path: &str, enabled: bool) -> Result<(), ArchiveError> {
        self.update(|list| {
            let record = list
                .mods
                .iter_mut()
                .find(|m| m.full_path == full_path)
                .ok_or_else(|| ArchiveError::UnknownRecord(full_path.to_string()))?;
            record.enabled = enabled;
            Ok(())
        })?;
        info!("{} {}", if enabled { "Enabled" } else { "Disabled" }, full_path);
        Ok(())
    }

    fn delete_record(&self, full_path: &str) -> Result<(), ArchiveError> {
        self.update(|list| {
            let pos = list
                .mods
                .iter()
                .position(|m| m.full_path == full_path)
                .ok_or_else(|| ArchiveError::UnknownRecord(full_path.to_string()))?;
            let record = list.mods.remove(pos);
            self.remove_modded_file(&record);

            // Drop the pack entry once its last record is gone
            if let Some(pack) = record.pack_name() {
                if !list.mods.iter().any(|m| m.pack_name() == Some(pack)) {
                    list.mod_packs.retain(|p| p.name != pack);
                }
            }
            Ok(())
        })?;
        info!("Deleted {}", full_path);
        Ok(())
    }

    fn delete_pack(&self, name: &str) -> Result<(), ArchiveError> {
        let mut removed = 0;
        self.update(|list| {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut list.mods)
                .into_iter()
                .partition(|m| m.pack_name() == Some(name));
            list.mods = kept;

            if gone.is_empty() && list.find_pack(name).is_none() {
                return Err(ArchiveError::UnknownPack(name.to_string()));
            }
            for record in &gone {
                self.remove_modded_file(record);
            }
            removed = gone.len();
            list.mod_packs.retain(|p| p.name != name);
            Ok(())
        })?;
        info!("Deleted pack {} ({} records)", name, removed);
        Ok(())
    }

    fn set_pack_enabled(&self, name: &str, enabled: bool) -> Result<(), ArchiveError> {
        self.update(|list| {
            let mut found = false;
            for record in list.mods.iter_mut().filter(|m| m.pack_name() == Some(name)) {
                record.enabled = enabled;
                found = true;
            }
            if found {
                Ok(())
            } else {
                Err(ArchiveError::UnknownPack(name.to_string()))
            }
        })?;
        info!("{} pack {}", if enabled { "Enabled" } else { "Disabled" }, name);
        Ok(())
    }

    fn build_index_lookup(&self, data_file: &str) -> Result<IndexLookup, ArchiveError> {
        let partition = self
            .partition_dir(data_file)
            .ok_or_else(|| ArchiveError::UnsafePath(data_file.to_string()))?;
        let mut index = IndexLookup::new(data_file);

        if !partition.is_dir() {
            debug!("No partition directory for {}", data_file);
            return Ok(index);
        }

        for entry in WalkDir::new(&partition).follow_links(true) {
            let entry = entry.map_err(|e| ArchiveError::Io {
                path: partition.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = relative_key(&partition, entry.path()) {
                index.insert(&key, entry.path().to_path_buf());
            }
        }

        debug!("Indexed {} files in {}", index.len(), data_file);
        Ok(index)
    }

    fn decode_texture(
        &self,
        record: &ModRecord,
        index: Option<&IndexLookup>,
    ) -> Result<RawTexture, DecodeError> {
        let data = self.read_data(record, index)?;
        decode_dds(&data)
    }

    fn decode_color_set(&self, record: &ModRecord) -> Result<ColorSet, DecodeError> {
        let data = self.read_data(record, None)?;
        parse_color_set(&data)
    }
}
