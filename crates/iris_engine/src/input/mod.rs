//! Input helpers used by the viewer

pub mod picking;

pub use picking::{cursor_to_pixel, MouseState};
