//! Image decoding
//!
//! Turns fetched bytes into RGBA pixels via the image crate.

use image::{DynamicImage, GenericImageView};

use crate::LoadError;

/// A decoded image ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// RGBA pixel data
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl DecodedImage {
    /// Create from raw RGBA data
    pub fn from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self { pixels, width, height }
    }

    /// Memory size in bytes
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels.get(idx..idx + 4)?.try_into().ok()
    }
}

impl From<DynamicImage> for DecodedImage {
    fn from(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let rgba = img.into_rgba8();
        Self::from_rgba(rgba.into_raw(), width, height)
    }
}

/// Decode an encoded image (PNG, JPEG, GIF, WebP)
pub fn decode(data: &[u8]) -> Result<DecodedImage, LoadError> {
    image::load_from_memory(data)
        .map(DecodedImage::from)
        .map_err(|e| LoadError::Decode(e.to_string()))
}
