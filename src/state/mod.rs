/// State management module
///
/// Everything the UI renders from lives here:
/// - Decoded bitmaps shared between roles (picture.rs)
/// - The editing session and request tickets (session.rs)
/// - Editing panel values (controls.rs)
/// - Image-to-3D job tracking (generation.rs)

pub mod controls;
pub mod generation;
pub mod picture;
pub mod session;
