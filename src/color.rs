/// Background colors and local compositing
///
/// This is the one image operation done in-process: fill a canvas with a
/// flat color and draw the cut-out on top of it. Everything else goes to
/// the processing backend.

use image::{Rgba, RgbaImage};
use std::fmt;

use crate::error::{StudioError, StudioResult};
use crate::state::picture::Picture;

/// Opaque sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb` (any case). Returns `None` otherwise.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Lenient parse used by the color picker: anything unparseable is white
    pub fn from_hex(hex: &str) -> Self {
        Self::parse_hex(hex).unwrap_or(Self::WHITE)
    }

    /// `r,g,b` as the processing backend expects in `bg_color`
    pub fn to_form_value(self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_iced(self) -> iced::Color {
        iced::Color::from_rgb8(self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Background presets offered next to the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// Show the cut-out as-is
    Transparent,
    Color(Rgb),
    /// Open the custom color field; nothing is applied yet
    Custom,
}

impl Background {
    pub const PRESETS: [Background; 4] = [
        Background::Transparent,
        Background::Color(Rgb::WHITE),
        Background::Color(Rgb::BLACK),
        Background::Custom,
    ];

    pub fn label(&self) -> String {
        match self {
            Background::Transparent => "Transparent".to_string(),
            Background::Color(Rgb::WHITE) => "White".to_string(),
            Background::Color(Rgb::BLACK) => "Black".to_string(),
            Background::Color(rgb) => rgb.to_hex(),
            Background::Custom => "Custom".to_string(),
        }
    }
}

/// Composite `picture` over a flat `color`, same size as the picture.
///
/// Standard "over" with straight alpha; the result is fully opaque.
pub fn composite_over(picture: &Picture, color: Rgb) -> RgbaImage {
    let src = picture.rgba();
    let mut out = RgbaImage::from_pixel(src.width(), src.height(), Rgba([color.r, color.g, color.b, 255]));

    for (dst, px) in out.pixels_mut().zip(src.pixels()) {
        let alpha = px[3] as u32;
        let blend = |fg: u8, bg: u8| ((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgba([
            blend(px[0], color.r),
            blend(px[1], color.g),
            blend(px[2], color.b),
            255,
        ]);
    }

    out
}

/// Background compositing off the UI thread
pub async fn composite_async(picture: Picture, color: Rgb) -> StudioResult<Picture> {
    tokio::task::spawn_blocking(move || Picture::from_rgba(composite_over(&picture, color)))
        .await
        .map_err(|e| StudioError::decode(format!("Task join error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgb::parse_hex("#ff0000"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(Rgb::parse_hex("00FF7f"), Some(Rgb::new(0, 255, 127)));
        assert_eq!(Rgb::parse_hex("#fff"), None);
        assert_eq!(Rgb::parse_hex("#gg0000"), None);
    }

    #[test]
    fn test_unparseable_falls_back_to_white() {
        assert_eq!(Rgb::from_hex("teal"), Rgb::WHITE);
    }

    #[test]
    fn test_form_value() {
        assert_eq!(Rgb::new(12, 34, 56).to_form_value(), "12,34,56");
    }

    #[test]
    fn test_composite_keeps_size_and_fills_transparency() {
        let mut src = RgbaImage::new(3, 2);
        src.put_pixel(0, 0, Rgba([0, 0, 255, 255])); // opaque blue
        src.put_pixel(1, 0, Rgba([0, 0, 255, 128])); // half blue
        let picture = Picture::from_rgba(src);

        let out = composite_over(&picture, Rgb::new(255, 0, 0));
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(2, 1), &Rgba([255, 0, 0, 255]));

        let half = out.get_pixel(1, 0);
        assert_eq!(half[3], 255);
        assert!((126..=128).contains(&half[0]) && (126..=128).contains(&half[2]));
    }

    #[test]
    fn test_last_color_wins() {
        let picture = Picture::from_rgba(RgbaImage::new(2, 2));
        let first = composite_over(&picture, Rgb::from_hex("#ff0000"));
        let second = composite_over(&Picture::from_rgba(first), Rgb::from_hex("#00ff00"));
        // Opaque input: the second background is hidden, so composite from
        // the cut-out each time, as the app does
        assert_eq!(second.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        let from_cutout = composite_over(&picture, Rgb::from_hex("#00ff00"));
        assert_eq!(from_cutout.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }
}
