/// Widgets and view builders
///
/// - `canvas.rs` - fitted display with the transparency checkerboard
/// - `histogram.rs` - RGB histogram under the canvas
/// - `notify.rs` - toast notifications
/// - `panels.rs` - page layouts

pub mod canvas;
pub mod histogram;
pub mod notify;
pub mod panels;
