//! Row facets: race, texture map, part and type labels for a single record.
//!
//! These are display attributes only. Map, part and type are read from the
//! path alone; race also depends on the item's category.

use super::race::Race;
use super::{slice_after_first, slice_after_last, ClassificationError, ItemCategory, ItemIdentity, ParseFailure};
use std::fmt;

pub const ALL: &str = "All";
pub const MONSTER: &str = "Monster";
pub const NO_VALUE: &str = "--";

/// Texture map kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexType {
    Diffuse,
    Normal,
    Specular,
    Multi,
    ColorSet,
    Mask,
    Vfx,
    Icon,
    Map,
}

impl TexType {
    pub fn name(&self) -> &'static str {
        match self {
            TexType::Diffuse => "Diffuse",
            TexType::Normal => "Normal",
            TexType::Specular => "Specular",
            TexType::Multi => "Multi",
            TexType::ColorSet => "ColorSet",
            TexType::Mask => "Mask",
            TexType::Vfx => "Vfx",
            TexType::Icon => "Icon",
            TexType::Map => "Map",
        }
    }
}

/// What the "Map" column shows for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Texture(TexType),
    /// UI texture that is neither an icon nor a map
    Ui,
    /// `.mdl` model file
    Model,
    Unknown,
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKind::Texture(tex) => f.write_str(tex.name()),
            MapKind::Ui => f.write_str("UI"),
            MapKind::Model => f.write_str("3D"),
            MapKind::Unknown => f.write_str(NO_VALUE),
        }
    }
}

/// Suffix markers checked before the substring markers, in order
const MAP_SUFFIXES: &[(&str, TexType)] = &[
    ("_d.", TexType::Diffuse),
    ("_n.", TexType::Normal),
    ("_s.", TexType::Specular),
    ("_m.", TexType::Multi),
    ("material", TexType::ColorSet),
    ("decal", TexType::Mask),
    ("vfx", TexType::Vfx),
];

/// Part letters: `_b_` or `_b.` -> "b"
const PART_MARKERS: &[(&str, &str, &str)] = &[
    ("_b_", "_b.", "b"),
    ("_c_", "_c.", "c"),
    ("_d_", "_d.", "d"),
];

const TYPE_MARKERS: &[(&str, &str)] = &[
    ("_iri_", "Iris"),
    ("_etc_", "Etc."),
    ("_fac_", "Face"),
    ("_hir_", "Hair"),
    ("_acc_", "Accessory"),
];

/// Texture map classification; first match wins.
pub fn map_kind(path: &str) -> MapKind {
    if let Some((_, tex)) = MAP_SUFFIXES.iter().find(|(marker, _)| path.contains(marker)) {
        return MapKind::Texture(*tex);
    }

    if path.contains("ui/") {
        if path.contains("icon") {
            return MapKind::Texture(TexType::Icon);
        }
        if path.contains("map") {
            return MapKind::Texture(TexType::Map);
        }
        return MapKind::Ui;
    }

    if path.contains(".mdl") {
        return MapKind::Model;
    }

    MapKind::Unknown
}

/// Part letter, or the decal suffix for decal paths. Defaults to "a".
pub fn part_label(path: &str) -> Result<String, ParseFailure> {
    if let Some((_, _, part)) = PART_MARKERS
        .iter()
        .find(|(infix, suffix, _)| path.contains(infix) || path.contains(suffix))
    {
        return Ok((*part).to_string());
    }

    if path.contains("decal") {
        let underscore = path.rfind('_').ok_or(ParseFailure::MissingMarker("_"))?;
        let dot = path.rfind('.').ok_or(ParseFailure::MissingMarker("."))?;
        let start = underscore + 1;
        return path
            .get(start..dot)
            .filter(|_| dot >= start)
            .map(str::to_string)
            .ok_or(ParseFailure::OutOfRange {
                offset: start,
                len: dot.saturating_sub(start),
            });
    }

    Ok("a".to_string())
}

/// Sub-type label. Demihuman paths use the three characters before the last `_`.
pub fn type_label(path: &str) -> Result<String, ParseFailure> {
    if let Some((_, label)) = TYPE_MARKERS.iter().find(|(marker, _)| path.contains(marker)) {
        return Ok((*label).to_string());
    }

    if path.contains("demihuman") {
        let underscore = path.rfind('_').ok_or(ParseFailure::MissingMarker("_"))?;
        let start = underscore
            .checked_sub(3)
            .ok_or(ParseFailure::OutOfRange { offset: 0, len: 3 })?;
        return path
            .get(start..underscore)
            .map(str::to_string)
            .ok_or(ParseFailure::OutOfRange { offset: start, len: 3 });
    }

    Ok(NO_VALUE.to_string())
}

/// Race label for a record of the given identity.
///
/// Items without an identity (unrecognized paths) get `--`.
pub fn race_label(identity: Option<&ItemIdentity>, path: &str) -> Result<String, ParseFailure> {
    let Some(identity) = identity else {
        return Ok(NO_VALUE.to_string());
    };

    let label = match identity.category {
        ItemCategory::Gear if path.contains("equipment") => {
            // Textures and materials live under a variant folder and name the
            // race as `_c0101`, models as `/c0101`
            let code = if path.contains("/v") {
                slice_after_last(path, "_c", 2, 4)?
            } else {
                slice_after_last(path, "/c", 2, 4)?
            };
            Race::display_name(code)
        }
        ItemCategory::Gear => ALL,
        ItemCategory::Character if !path.contains("chara/common") => {
            Race::display_name(slice_after_first(path, "n/c", 3, 4)?)
        }
        ItemCategory::Character => ALL,
        ItemCategory::Companions => MONSTER,
        ItemCategory::Ui | ItemCategory::Housing => ALL,
    };

    Ok(label.to_string())
}

/// All display facets of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFacets {
    pub race: String,
    pub map: MapKind,
    pub part: String,
    pub kind: String,
}

/// Compute every facet for a record, attributing failures to the record.
pub fn facets(
    name: &str,
    path: &str,
    identity: Option<&ItemIdentity>,
) -> Result<RowFacets, ClassificationError> {
    let wrap = |reason| ClassificationError::new(name, path, reason);

    Ok(RowFacets {
        race: race_label(identity, path).map_err(wrap)?,
        map: map_kind(path),
        part: part_label(path).map_err(wrap)?,
        kind: type_label(path).map_err(wrap)?,
    })
}
