//! Item classification from archive resource paths
//!
//! Every modded resource is identified only by its archive-internal path
//! (e.g. `chara/equipment/e0201/material/v0001/mt_c0101e0201_top_a.mtrl`).
//! This module derives the item's category and numeric model/body ids from
//! that path using a fixed table of buckets, and (in `facets`) the display
//! attributes shown on each preview row.
//!
//! Classification is a pure function of `(name, path)`. A path that matches
//! no bucket is not an error - it simply has no identity.

mod facets;
mod race;

pub use facets::{facets, map_kind, part_label, race_label, type_label, MapKind, RowFacets, TexType};
pub use race::Race;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Item names that select which sub-segment a character path is read from.
pub mod names {
    pub const BODY: &str = "Body";
    pub const HAIR: &str = "Hair";
    pub const FACE: &str = "Face";
    pub const TAIL: &str = "Tail";
    pub const FACE_PAINT: &str = "Face Paint";
    pub const EQUIPMENT_DECALS: &str = "Equipment Decals";
}

/// Top-level item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Gear,
    Character,
    Companions,
    #[serde(rename = "UI")]
    Ui,
    Housing,
}

impl ItemCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ItemCategory::Gear => "Gear",
            ItemCategory::Character => "Character",
            ItemCategory::Companions => "Companions",
            ItemCategory::Ui => "UI",
            ItemCategory::Housing => "Housing",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured identity of a modded item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub category: ItemCategory,
    /// Primary model id (`e0201` -> 201). None when the bucket has no numeric model.
    pub model_id: Option<u32>,
    /// Body/variant id, only read for companion paths
    pub body_id: Option<u32>,
}

/// Why a positional read inside a matched bucket failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("marker '{0}' not found")]
    MissingMarker(&'static str),

    #[error("{len} characters at offset {offset} are out of range")]
    OutOfRange { offset: usize, len: usize },

    #[error("'{0}' is not a number")]
    NotNumeric(String),
}

/// A path matched a known bucket but could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not read model data for {name} ({path}): {reason}")]
pub struct ClassificationError {
    pub name: String,
    pub path: String,
    pub reason: ParseFailure,
}

impl ClassificationError {
    pub fn new(name: &str, path: &str, reason: ParseFailure) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            reason,
        }
    }
}

/// Numeric ids produced by a bucket extractor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ModelIds {
    model: Option<u32>,
    body: Option<u32>,
}

impl ModelIds {
    fn model(id: u32) -> Self {
        Self {
            model: Some(id),
            body: None,
        }
    }
}

/// One classification bucket: a path predicate and the reader for its ids
struct Rule {
    category: ItemCategory,
    matches: fn(&str) -> bool,
    extract: fn(&str, &str) -> Result<ModelIds, ParseFailure>,
}

/// Buckets in priority order. The first matching bucket wins.
const RULES: &[Rule] = &[
    Rule {
        category: ItemCategory::Gear,
        matches: is_equipment_path,
        extract: equipment_ids,
    },
    Rule {
        category: ItemCategory::Gear,
        matches: is_weapon_path,
        extract: weapon_ids,
    },
    Rule {
        category: ItemCategory::Character,
        matches: is_human_path,
        extract: human_ids,
    },
    Rule {
        category: ItemCategory::Character,
        matches: is_common_path,
        extract: common_ids,
    },
    Rule {
        category: ItemCategory::Companions,
        matches: is_monster_path,
        extract: monster_ids,
    },
    Rule {
        category: ItemCategory::Companions,
        matches: is_demihuman_path,
        extract: demihuman_ids,
    },
    Rule {
        category: ItemCategory::Ui,
        matches: is_ui_path,
        extract: ui_ids,
    },
    Rule {
        category: ItemCategory::Housing,
        matches: is_housing_path,
        extract: housing_ids,
    },
];

fn is_equipment_path(path: &str) -> bool {
    path.contains("chara/equipment") || path.contains("chara/accessory")
}

fn is_weapon_path(path: &str) -> bool {
    path.contains("chara/weapon")
}

fn is_human_path(path: &str) -> bool {
    path.contains("chara/human")
}

fn is_common_path(path: &str) -> bool {
    path.contains("chara/common")
}

fn is_monster_path(path: &str) -> bool {
    path.contains("chara/monster")
}

fn is_demihuman_path(path: &str) -> bool {
    path.contains("chara/demihuman")
}

fn is_ui_path(path: &str) -> bool {
    path.contains("ui/")
}

fn is_housing_path(path: &str) -> bool {
    path.contains("/hou/")
}

// `chara/equipment/e0201/...` and `chara/accessory/a0001/...`
fn equipment_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    Ok(ModelIds::model(digits_at(path, 17, 4)?))
}

// `chara/weapon/w0101/...`
fn weapon_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    Ok(ModelIds::model(digits_at(path, 14, 4)?))
}

// `chara/human/c0101/obj/hair/h0005/...`: the segment depends on the item name
fn human_ids(name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    let marker = match name {
        names::BODY => "/body",
        names::HAIR => "/hair",
        names::FACE => "/face",
        names::TAIL => "/tail",
        _ => return Ok(ModelIds::default()),
    };
    Ok(ModelIds::model(digits_after_first(path, marker, 7, 4)?))
}

// `chara/common/texture/decal_face/_decal_5.tex`, `.../decal_equip/-decal_012.tex`
fn common_ids(name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    match name {
        names::FACE_PAINT => Ok(ModelIds::model(digits_after_last(path, "_", 1, 1)?)),
        names::EQUIPMENT_DECALS if path.contains("_stigma") => Ok(ModelIds::default()),
        names::EQUIPMENT_DECALS => Ok(ModelIds::model(digits_after_last(path, "_", 1, 3)?)),
        _ => Ok(ModelIds::default()),
    }
}

// `chara/monster/m0001/obj/body/b0001/...`
fn monster_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    Ok(ModelIds {
        model: Some(digits_at(path, 15, 4)?),
        body: Some(digits_after_first(path, "/body", 7, 4)?),
    })
}

// `chara/demihuman/d1001/obj/equipment/e0001/...`
fn demihuman_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    Ok(ModelIds {
        body: Some(digits_at(path, 17, 4)?),
        model: Some(digits_after_first(path, "t/e", 3, 4)?),
    })
}

// `ui/icon/060000/060001.tex`; uld, map and loading images carry no id
fn ui_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    if path.contains("ui/uld") || path.contains("ui/map") || path.contains("ui/loadingimage") {
        return Ok(ModelIds::model(0));
    }
    Ok(ModelIds::model(digits_after_last(path, "/", 1, 6)?))
}

// `bgcommon/hou/indoor/general/0001/texture/fun_b0_m0001_0a_d.tex`
fn housing_ids(_name: &str, path: &str) -> Result<ModelIds, ParseFailure> {
    Ok(ModelIds::model(digits_after_last(path, "_m", 2, 4)?))
}

/// Slice `len` bytes starting at `offset`
pub(crate) fn slice_at(path: &str, offset: usize, len: usize) -> Result<&str, ParseFailure> {
    offset
        .checked_add(len)
        .and_then(|end| path.get(offset..end))
        .ok_or(ParseFailure::OutOfRange { offset, len })
}

/// Slice `len` bytes starting `skip` bytes after the first occurrence of `marker`
pub(crate) fn slice_after_first<'a>(
    path: &'a str,
    marker: &'static str,
    skip: usize,
    len: usize,
) -> Result<&'a str, ParseFailure> {
    let idx = path.find(marker).ok_or(ParseFailure::MissingMarker(marker))?;
    slice_at(path, idx + skip, len)
}

/// Slice `len` bytes starting `skip` bytes after the last occurrence of `marker`
pub(crate) fn slice_after_last<'a>(
    path: &'a str,
    marker: &'static str,
    skip: usize,
    len: usize,
) -> Result<&'a str, ParseFailure> {
    let idx = path.rfind(marker).ok_or(ParseFailure::MissingMarker(marker))?;
    slice_at(path, idx + skip, len)
}

fn parse_digits(slice: &str) -> Result<u32, ParseFailure> {
    if slice.is_empty() || !slice.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseFailure::NotNumeric(slice.to_string()));
    }
    slice
        .parse()
        .map_err(|_| ParseFailure::NotNumeric(slice.to_string()))
}

fn digits_at(path: &str, offset: usize, len: usize) -> Result<u32, ParseFailure> {
    parse_digits(slice_at(path, offset, len)?)
}

fn digits_after_first(
    path: &str,
    marker: &'static str,
    skip: usize,
    len: usize,
) -> Result<u32, ParseFailure> {
    parse_digits(slice_after_first(path, marker, skip, len)?)
}

fn digits_after_last(
    path: &str,
    marker: &'static str,
    skip: usize,
    len: usize,
) -> Result<u32, ParseFailure> {
    parse_digits(slice_after_last(path, marker, skip, len)?)
}

/// Classify a modded item from its name and archive path.
///
/// Returns `Ok(None)` for paths outside every known bucket, and a
/// `ClassificationError` when a bucket matched but its ids could not be read.
pub fn classify(name: &str, full_path: &str) -> Result<Option<ItemIdentity>, ClassificationError> {
    let Some(rule) = RULES.iter().find(|rule| (rule.matches)(full_path)) else {
        debug!("Unrecognized path for {}: {}", name, full_path);
        return Ok(None);
    };

    let ids = (rule.extract)(name, full_path)
        .map_err(|reason| ClassificationError::new(name, full_path, reason))?;

    Ok(Some(ItemIdentity {
        category: rule.category,
        model_id: ids.model,
        body_id: ids.body,
    }))
}
