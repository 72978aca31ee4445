/// RGB histogram of the displayed picture
use iced::widget::canvas::{self, Stroke};
use iced::{Color, Point, Rectangle};
use image::RgbaImage;

use crate::Message;

#[derive(Debug, Clone)]
pub struct Histogram {
    /// [R[256], G[256], B[256]]
    pub data: [[u32; 256]; 3],
}

impl Histogram {
    /// Count channel values of every visible pixel; fully transparent pixels
    /// carry no color and are skipped.
    pub fn from_image(pixels: &RgbaImage) -> Self {
        let mut data = [[0u32; 256]; 3];
        for px in pixels.pixels().filter(|px| px[3] > 0) {
            for (channel, bins) in data.iter_mut().enumerate() {
                bins[px[channel] as usize] += 1;
            }
        }
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|channel| channel.iter().all(|&c| c == 0))
    }
}

impl canvas::Program<Message> for Histogram {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let max_value = self
            .data
            .iter()
            .flat_map(|channel| channel.iter())
            .copied()
            .max()
            .unwrap_or(0);
        if max_value == 0 {
            return vec![frame.into_geometry()];
        }

        let (width, height) = (bounds.width, bounds.height);
        let bar_width = width / 256.0;
        let colors = [
            Color::from_rgba(1.0, 0.0, 0.0, 0.5),
            Color::from_rgba(0.0, 1.0, 0.0, 0.5),
            Color::from_rgba(0.0, 0.0, 1.0, 0.5),
        ];

        for (channel, bins) in self.data.iter().enumerate() {
            let mut builder = canvas::path::Builder::new();
            for (i, &count) in bins.iter().enumerate().filter(|&(_, &count)| count > 0) {
                let x = i as f32 * bar_width;
                builder.move_to(Point::new(x, height));
                builder.line_to(Point::new(x, height - count as f32 / max_value as f32 * height));
            }

            frame.stroke(
                &builder.build(),
                Stroke::default()
                    .with_color(colors[channel])
                    .with_width(bar_width.max(1.0)),
            );
        }

        vec![frame.into_geometry()]
    }
}
