//! Mod list JSON types
//!
//! Serde definitions for the persisted list of applied modifications.

use serde::{Deserialize, Serialize};

/// Root mod list structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModList {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "modCount", default)]
    pub mod_count: usize,
    #[serde(rename = "modPackCount", default)]
    pub mod_pack_count: usize,
    #[serde(rename = "modPacks", default)]
    pub mod_packs: Vec<ModPackRef>,
    #[serde(rename = "Mods", default)]
    pub mods: Vec<ModRecord>,
}

impl ModList {
    /// Recompute the count fields after records or packs were added/removed
    pub fn refresh_counts(&mut self) {
        self.mod_count = self.mods.len();
        self.mod_pack_count = self.mod_packs.len();
    }

    pub fn find_pack(&self, name: &str) -> Option<&ModPackRef> {
        self.mod_packs.iter().find(|p| p.name == name)
    }
}

/// A named, authored bundle of records imported together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModPackRef {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub url: String,
}

/// Where the modified and original data live inside the archive partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetInfo {
    #[serde(default)]
    pub data_type: i32,
    #[serde(default)]
    pub original_offset: i64,
    #[serde(default)]
    pub mod_offset: i64,
    #[serde(default)]
    pub mod_size: i64,
}

/// A single applied modification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRecord {
    /// Tool that produced the record
    #[serde(default)]
    pub source: String,
    /// Display name of the modded item (not unique)
    pub name: String,
    /// Coarse archive category ("Body", "Earrings", "Minion", ...)
    #[serde(default)]
    pub category: String,
    /// Archive-internal resource path
    pub full_path: String,
    /// Archive partition holding the data
    #[serde(rename = "datFile", default)]
    pub data_file: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mod_pack: Option<ModPackRef>,
    #[serde(default)]
    pub data: OffsetInfo,
}

impl ModRecord {
    pub fn pack_name(&self) -> Option<&str> {
        self.mod_pack.as_ref().map(|p| p.name.as_str())
    }

    pub fn is_material(&self) -> bool {
        self.full_path.contains("material")
    }

    pub fn is_model(&self) -> bool {
        self.full_path.contains(".mdl")
    }
}
