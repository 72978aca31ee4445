/// Decoded bitmaps held by the session
///
/// A `Picture` is an RGBA buffer behind an `Arc`, so handing it to the
/// display, the histogram and an upload task never copies pixels.

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{StudioError, StudioResult};

#[derive(Clone)]
pub struct Picture {
    pixels: Arc<RgbaImage>,
}

impl Picture {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Decode any format the image crate knows (PNG, JPEG, WebP, ...)
    pub fn decode(bytes: &[u8]) -> StudioResult<Self> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(image.to_rgba8()))
    }

    /// Decode off the UI thread
    pub async fn decode_async(bytes: Vec<u8>) -> StudioResult<Self> {
        tokio::task::spawn_blocking(move || Self::decode(&bytes))
            .await
            .map_err(|e| StudioError::decode(format!("Task join error: {}", e)))?
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Same underlying buffer (not just equal pixels)
    pub fn same_as(&self, other: &Picture) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Full-resolution lossless encoding for re-upload and download
    pub fn encode_png(&self) -> StudioResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8((*self.pixels).clone()).write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub async fn encode_png_async(&self) -> StudioResult<Vec<u8>> {
        let picture = self.clone();
        tokio::task::spawn_blocking(move || picture.encode_png())
            .await
            .map_err(|e| StudioError::decode(format!("Task join error: {}", e)))?
    }
}

impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Picture({}x{})", self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_round_trip_preserves_dimensions() {
        let picture = Picture::from_rgba(RgbaImage::from_pixel(37, 21, Rgba([10, 20, 30, 128])));
        let png = picture.encode_png().unwrap();
        let back = Picture::decode(&png).unwrap();

        assert_eq!(back.dimensions(), (37, 21));
        assert_eq!(back.rgba().get_pixel(5, 5), &Rgba([10, 20, 30, 128]));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = Picture::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, StudioError::Decode(_)));
    }

    #[test]
    fn test_clones_share_pixels() {
        let a = Picture::from_rgba(RgbaImage::new(2, 2));
        let b = a.clone();
        let c = Picture::from_rgba(RgbaImage::new(2, 2));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
