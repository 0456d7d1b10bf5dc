//! Texture and color-set decoding for archive data
//!
//! DDS decoding goes through image_dds. Color sets are stored as 256
//! little-endian half floats (16 rows of 4 RGBA pixels).

use super::{ColorSet, DecodeError, RawTexture, COLOR_SET_LEN};
use half::f16;
use image_dds::ddsfile::Dds;
use std::io::Cursor;
use tracing::debug;

/// Byte size of a stored color set
pub const COLOR_SET_BYTES: usize = COLOR_SET_LEN * 2;

/// Decode a DDS file to RGBA8 at its native resolution (mip 0)
pub fn decode_dds(data: &[u8]) -> Result<RawTexture, DecodeError> {
    let dds = Dds::read(Cursor::new(data)).map_err(|e| DecodeError::Dds(e.to_string()))?;

    let rgba = image_dds::image_from_dds(&dds, 0).map_err(|e| {
        debug!("image_dds failed (dxgi {:?}): {}", dds.get_dxgi_format(), e);
        DecodeError::Dds(e.to_string())
    })?;

    let (width, height) = rgba.dimensions();
    Ok(RawTexture {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// IEEE 754 half precision to f32
pub fn half_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Parse a stored color set: exactly 512 bytes of little-endian halves
pub fn parse_color_set(data: &[u8]) -> Result<ColorSet, DecodeError> {
    if data.len() != COLOR_SET_BYTES {
        return Err(DecodeError::ColorSetSize(data.len()));
    }

    let values = data
        .chunks_exact(2)
        .map(|pair| half_to_f32(u16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    ColorSet::new(values)
}

#[cfg(test)]
pub(crate) fn encode_test_dds(image: &image::RgbaImage) -> Vec<u8> {
    use image_dds::{ImageFormat, Mipmaps, Quality, SurfaceRgba8};

    let dds = SurfaceRgba8::from_image(image)
        .encode(ImageFormat::Rgba8Unorm, Quality::Fast, Mipmaps::Disabled)
        .unwrap()
        .to_dds()
        .unwrap();
    let mut out = Vec::new();
    dds.write(&mut out).unwrap();
    out
}

#[cfg(test)]
pub(crate) fn encode_test_color_set(value: u16) -> Vec<u8> {
    std::iter::repeat(value.to_le_bytes())
        .take(COLOR_SET_LEN)
        .flatten()
        .collect()
}
