//! Framebuffer rendering pipeline
//!
//! Device surface, the static glyph table and the rasterizer that
//! composes a text line out of 8x8 cells. The clock loop drives this
//! module once per tick.

pub mod font;
pub mod render;
pub mod surface;

pub use surface::{Geometry, Surface, SurfaceError};

/// Glyph cell width, pixels
pub const FONT_WIDTH: usize = 8;

/// Glyph cell height, pixels
pub const FONT_HEIGHT: usize = 8;

/// Upper bound on a composed line; at most `MAX_TEXT_LEN - 1`
/// characters are ever drawn.
pub const MAX_TEXT_LEN: usize = 128;
