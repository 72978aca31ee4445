use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::widget::{image, stack, Canvas};
use iced::{Color, Element, Length, Point, Rectangle, Renderer, Size, Theme};

use crate::state::picture::Picture;
use crate::Message;

/// Checkerboard tile edge in pixels
pub const TILE: u32 = 20;

const TILE_LIGHT: Color = Color::WHITE;
/// #e0e0e0
const TILE_DARK: Color = Color::from_rgb(224.0 / 255.0, 224.0 / 255.0, 224.0 / 255.0);

/// Canvas size for a `width × height` bitmap inside a `max_width × max_height` viewport.
///
/// Aspect ratio is kept and the bitmap is never upscaled.
pub fn fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let scale = 1f64
        .min(max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64);
    let scaled = |side: u32| ((side as f64 * scale).floor() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Dark checkerboard tiles covering `width × height`, as `(x, y, w, h)`.
///
/// A tile is dark when `x / TILE + y / TILE` is even; edge tiles are clipped.
pub fn dark_tiles(width: u32, height: u32) -> impl Iterator<Item = (u32, u32, u32, u32)> {
    (0..height.div_ceil(TILE)).flat_map(move |row| {
        (0..width.div_ceil(TILE))
            .filter(move |col| (row + col) % 2 == 0)
            .map(move |col| {
                let (x, y) = (col * TILE, row * TILE);
                (x, y, TILE.min(width - x), TILE.min(height - y))
            })
    })
}

/// Transparency backdrop drawn under the displayed picture
#[derive(Debug, Clone, Copy)]
pub struct Checkerboard;

impl Program<Message> for Checkerboard {
    type State = PressState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), TILE_LIGHT);

        for (x, y, w, h) in dark_tiles(bounds.width as u32, bounds.height as u32) {
            frame.fill_rectangle(
                Point::new(x as f32, y as f32),
                Size::new(w as f32, h as f32),
                TILE_DARK,
            );
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        // Click on the picture flips the before/after comparison
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if cursor.is_over(bounds) {
                    state.pressed = true;
                    return (canvas::event::Status::Captured, None);
                }
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if std::mem::take(&mut state.pressed) && cursor.is_over(bounds) {
                    return (canvas::event::Status::Captured, Some(Message::ToggleCompare));
                }
            }
            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }
}

/// Press tracking so a drag that ends elsewhere is not a click
#[derive(Debug, Clone, Default)]
pub struct PressState {
    pub pressed: bool,
}

/// Displayed picture plus the GPU handle built from it.
///
/// The handle is rebuilt only when the displayed picture changes.
#[derive(Debug, Clone)]
pub struct Display {
    pub picture: Picture,
    pub handle: image::Handle,
    pub size: (u32, u32),
}

impl Display {
    pub fn new(picture: Picture, max_width: u32, max_height: u32) -> Self {
        let (width, height) = picture.dimensions();
        let handle = image::Handle::from_rgba(width, height, picture.rgba().as_raw().clone());
        Self {
            size: fit(width, height, max_width, max_height),
            picture,
            handle,
        }
    }

    pub fn shows(&self, picture: &Picture) -> bool {
        self.picture.same_as(picture)
    }

    pub fn view(&self) -> Element<'_, Message> {
        let (width, height) = (self.size.0 as f32, self.size.1 as f32);

        let backdrop = Canvas::new(Checkerboard)
            .width(Length::Fixed(width))
            .height(Length::Fixed(height));
        let picture = image(self.handle.clone())
            .width(Length::Fixed(width))
            .height(Length::Fixed(height));

        stack![backdrop, picture].into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_scales_down_to_viewport() {
        assert_eq!(fit(1600, 1200, 800, 600), (800, 600));
        assert_eq!(fit(2000, 500, 800, 600), (800, 200));
        assert_eq!(fit(300, 1200, 800, 600), (150, 600));
    }

    #[test]
    fn test_fit_never_upscales() {
        assert_eq!(fit(320, 240, 800, 600), (320, 240));
    }

    #[test]
    fn test_fit_floors_and_keeps_one_pixel() {
        assert_eq!(fit(1000, 3, 800, 600), (800, 2));
        assert_eq!(fit(10_000, 1, 800, 600), (800, 1));
        assert_eq!(fit(0, 0, 800, 600), (1, 1));
    }

    #[test]
    fn test_checkerboard_pattern() {
        let tiles: Vec<_> = dark_tiles(50, 30).collect();
        // 3 columns x 2 rows, dark where col + row is even
        assert_eq!(
            tiles,
            vec![
                (0, 0, 20, 20),
                (40, 0, 10, 20),
                (20, 20, 20, 10),
            ]
        );
    }

    #[test]
    fn test_display_size_follows_fit() {
        let picture = Picture::from_rgba(::image::RgbaImage::new(1000, 500));
        let display = Display::new(picture.clone(), 800, 600);
        assert_eq!(display.size, (800, 400));
        assert!(display.shows(&picture));
    }
}
