//! Preview rows: one per record of the selected item

use crate::archive::{DecodeError, IndexLookup, ModArchive};
use crate::catalog::ModRecord;
use crate::classify::{facets, ClassificationError, ItemIdentity, MapKind, RowFacets};
use image::{DynamicImage, Rgba, Rgba32FImage, RgbaImage};
use std::sync::OnceLock;
use thiserror::Error;

const PLACEHOLDER_SIZE: u32 = 64;
const BORDER_WIDTH: u32 = 2;

/// Enabled/disabled styling of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Enabled,
    Disabled,
}

impl RowStatus {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            RowStatus::Enabled
        } else {
            RowStatus::Disabled
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            RowStatus::Enabled => 1.0,
            RowStatus::Disabled => 0.5,
        }
    }

    pub fn border_color(&self) -> Rgba<u8> {
        match self {
            RowStatus::Enabled => Rgba([0, 160, 0, 255]),
            RowStatus::Disabled => Rgba([200, 0, 0, 255]),
        }
    }

    pub fn fill_color(&self) -> Rgba<u8> {
        match self {
            RowStatus::Enabled => Rgba([0, 0, 0, 0]),
            RowStatus::Disabled => Rgba([128, 128, 128, 255]),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Enabled => "Enabled",
            RowStatus::Disabled => "Disabled",
        }
    }
}

/// Bitmap shown for a row
#[derive(Debug, Clone)]
pub enum PreviewImage {
    Texture(RgbaImage),
    /// Material color table, kept in float precision
    ColorSet(Rgba32FImage),
    /// Models are not rendered
    Placeholder(RgbaImage),
}

impl PreviewImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PreviewImage::Texture(image) | PreviewImage::Placeholder(image) => image.dimensions(),
            PreviewImage::ColorSet(image) => image.dimensions(),
        }
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        match self {
            PreviewImage::Texture(image) | PreviewImage::Placeholder(image) => image.clone(),
            PreviewImage::ColorSet(image) => DynamicImage::ImageRgba32F(image.clone()).to_rgba8(),
        }
    }
}

/// Static model icon: a gray frame with a diagonal cross
pub fn model_placeholder() -> RgbaImage {
    static PLACEHOLDER: OnceLock<RgbaImage> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| {
            let last = PLACEHOLDER_SIZE - 1;
            RgbaImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
                let edge = x < 2 || y < 2 || x > last - 2 || y > last - 2;
                let diagonal = x.abs_diff(y) < 2 || (x + y).abs_diff(last) < 2;
                if edge || diagonal {
                    Rgba([96, 96, 96, 255])
                } else {
                    Rgba([220, 220, 220, 255])
                }
            })
        })
        .clone()
}

#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub race: String,
    pub map: MapKind,
    pub part: String,
    pub kind: String,
    pub status: RowStatus,
    pub image: PreviewImage,
    pub record: ModRecord,
}

impl PreviewRow {
    pub fn new(record: ModRecord, facets: RowFacets, image: PreviewImage) -> Self {
        Self {
            race: facets.race,
            map: facets.map,
            part: facets.part,
            kind: facets.kind,
            status: RowStatus::from_enabled(record.enabled),
            image,
            record,
        }
    }

    /// Mirror a toggle made through the archive
    pub fn set_enabled(&mut self, enabled: bool) {
        self.record.enabled = enabled;
        self.status = RowStatus::from_enabled(enabled);
    }

    /// Image framed in the status border, fill behind transparent pixels,
    /// alpha scaled by the status opacity
    pub fn render(&self) -> RgbaImage {
        let source = self.image.to_rgba8();
        let (width, height) = source.dimensions();
        let border = self.status.border_color();
        let fill = self.status.fill_color();
        let opacity = self.status.opacity();

        RgbaImage::from_fn(width + BORDER_WIDTH * 2, height + BORDER_WIDTH * 2, |x, y| {
            let inside = x >= BORDER_WIDTH
                && y >= BORDER_WIDTH
                && x < width + BORDER_WIDTH
                && y < height + BORDER_WIDTH;
            if !inside {
                return border;
            }

            let px = source.get_pixel(x - BORDER_WIDTH, y - BORDER_WIDTH);
            let pixel = if px[3] == 0 { fill } else { *px };
            let alpha = (pixel[3] as f32 * opacity).round() as u8;
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        })
    }
}

/// A record that could not be turned into a row. Siblings are unaffected.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Could not load {name} ({path}): {source}")]
    Decode {
        name: String,
        path: String,
        #[source]
        source: DecodeError,
    },
}

impl ItemError {
    fn decode(record: &ModRecord, source: DecodeError) -> Self {
        ItemError::Decode {
            name: record.name.clone(),
            path: record.full_path.clone(),
            source,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ItemError::Classification(e) => &e.path,
            ItemError::Decode { path, .. } => path,
        }
    }
}

/// Builds one row per record: facets from the path, image from the archive
pub struct PreviewRowBuilder<'a, A: ModArchive + ?Sized> {
    archive: &'a A,
}

impl<'a, A: ModArchive + ?Sized> PreviewRowBuilder<'a, A> {
    pub fn new(archive: &'a A) -> Self {
        Self { archive }
    }

    /// Materials show their color set, models a placeholder, everything
    /// else the decoded texture at native size.
    pub fn build(
        &self,
        record: &ModRecord,
        identity: Option<&ItemIdentity>,
        index: Option<&IndexLookup>,
    ) -> Result<PreviewRow, ItemError> {
        let facets = facets(&record.name, &record.full_path, identity)?;

        let image = if record.is_material() {
            let colors = self
                .archive
                .decode_color_set(record)
                .map_err(|e| ItemError::decode(record, e))?;
            PreviewImage::ColorSet(colors.into_image())
        } else if record.is_model() {
            PreviewImage::Placeholder(model_placeholder())
        } else {
            let texture = self
                .archive
                .decode_texture(record, index)
                .and_then(|t| t.into_image())
                .map_err(|e| ItemError::decode(record, e))?;
            PreviewImage::Texture(texture)
        };

        Ok(PreviewRow::new(record.clone(), facets, image))
    }
}
