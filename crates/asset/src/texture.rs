//! Image decoding into tightly packed RGBA8 pixels.

use corelib::{MeshError, MeshResult};

use crate::source::ResourceSource;

pub const BYTES_PER_PIXEL: u32 = 4;

/// Decoded image, rows top to bottom, ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap raw RGBA8 pixels; `None` if the length does not match the size.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let texture = Self {
            width,
            height,
            pixels,
        };
        texture.is_valid().then_some(texture)
    }

    /// Decode PNG or JPEG bytes. `name` only labels errors and logs.
    pub fn decode(name: &str, bytes: &[u8]) -> MeshResult<Self> {
        let decode_error = |reason: String| MeshError::ImageDecode {
            name: name.to_owned(),
            reason,
        };

        let rgba = image::load_from_memory(bytes)
            .map_err(|e| decode_error(e.to_string()))?
            .into_rgba8();
        let (width, height) = rgba.dimensions();
        let texture = Self::from_rgba8(width, height, rgba.into_raw())
            .ok_or_else(|| decode_error(format!("empty image ({width}x{height})")))?;

        log::debug!("Decoded '{}': {}x{}", name, width, height);
        Ok(texture)
    }

    /// Read and decode a texture resource.
    pub fn load(source: &dyn ResourceSource, name: &str) -> MeshResult<Self> {
        let bytes = source.read_bytes(name)?;
        Self::decode(name, &bytes)
    }

    /// Opaque white/gray checkerboard of 8-pixel squares, for primitives
    /// rendered without an asset.
    pub fn checkerboard(size: u32) -> Self {
        let size = size.max(1);
        let pixels = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x / 8 + y / 8) % 2 == 0))
            .flat_map(|light| if light { [255, 255, 255, 255] } else { [128, 128, 128, 255] })
            .collect();
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    /// Non-empty, with exactly one RGBA8 texel per pixel.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() as u64
                == u64::from(self.width) * u64::from(self.height) * u64::from(BYTES_PER_PIXEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_to_rgba() {
        let bytes = png_bytes(3, 2, [10, 20, 30, 255]);
        let tex = TextureData::decode("tiny.png", &bytes).unwrap();
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(tex.pixels.len(), 3 * 2 * 4);
        assert_eq!(&tex.pixels[..4], &[10, 20, 30, 255]);
        assert!(tex.is_valid());
        assert_eq!(tex.bytes_per_row(), 12);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = TextureData::decode("junk.png", b"not an image").unwrap_err();
        assert!(matches!(err, MeshError::ImageDecode { name, .. } if name == "junk.png"));
    }

    #[test]
    fn load_reads_from_source() {
        let src = MemorySource::new().with("wood.png", png_bytes(1, 1, [1, 2, 3, 4]));
        let tex = TextureData::load(&src, "wood.png").unwrap();
        assert_eq!(tex.pixels, vec![1, 2, 3, 4]);
        assert!(matches!(
            TextureData::load(&src, "grass.jpg"),
            Err(MeshError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn from_rgba8_checks_length() {
        assert!(TextureData::from_rgba8(2, 1, vec![0; 8]).is_some());
        assert!(TextureData::from_rgba8(2, 1, vec![0; 7]).is_none());
        assert!(TextureData::from_rgba8(0, 0, Vec::new()).is_none());
    }

    #[test]
    fn checkerboard_alternates() {
        let tex = TextureData::checkerboard(16);
        assert!(tex.is_valid());
        assert_eq!(&tex.pixels[..4], &[255, 255, 255, 255]);
        // First pixel of the second square in row 0.
        let px = 8 * 4;
        assert_eq!(&tex.pixels[px..px + 4], &[128, 128, 128, 255]);
        // First pixel of row 8.
        let px = 8 * 16 * 4;
        assert_eq!(&tex.pixels[px..px + 4], &[128, 128, 128, 255]);
    }
}
