//! Glyph rasterization onto the mapped frame.
//!
//! Everything here works on the frame byte slice plus a [`Geometry`],
//! and decomposes into [`write_pixel_block`], the one primitive that
//! stores into pixel memory. Coordinates are in pixels; offsets are in
//! bytes.

use crate::fb::font;
use crate::fb::surface::Geometry;
use crate::fb::{FONT_HEIGHT, FONT_WIDTH};

/// Set one pixel's worth of bytes at `offset` to all-ones (on) or
/// all-zeroes (off).
///
/// Sole write path into the frame. Slice indexing keeps it in bounds;
/// callers are responsible for only producing offsets inside the band
/// they own.
#[inline]
pub fn write_pixel_block(frame: &mut [u8], offset: usize, bytes_per_pixel: usize, on: bool) {
    let fill = if on { 0xFF } else { 0x00 };
    frame[offset..offset + bytes_per_pixel].fill(fill);
}

/// Draw one 8x8 glyph cell with its top-left corner at pixel `(x, y)`.
///
/// Bit 0 of each glyph row is the leftmost pixel. Off bits are written
/// too, so the cell fully overwrites whatever was there. The caller
/// guarantees the cell lies inside the frame.
pub fn draw_char(frame: &mut [u8], geo: &Geometry, x: usize, y: usize, ch: u8) {
    let bpp = geo.bytes_per_pixel();
    let glyph = font::glyph(ch);
    let mut offset = y * geo.line_length + x * bpp;

    for &row in glyph {
        for col in 0..FONT_WIDTH {
            write_pixel_block(frame, offset, bpp, row & (1u8 << col) != 0);
            offset += bpp;
        }
        // Down one scan line, back to the glyph's left edge.
        offset += geo.line_length - FONT_WIDTH * bpp;
    }
}

/// Zero the full-stride band of `FONT_HEIGHT` scan lines starting at
/// row `y`.
///
/// Run before every redraw so a shorter line leaves no stale glyphs.
pub fn clear_line(frame: &mut [u8], geo: &Geometry, y: usize) {
    let start = y * geo.line_length;
    frame[start..start + FONT_HEIGHT * geo.line_length].fill(0);
}

/// Draw `text` with character `i` at horizontal pixel `x + 8 * i`.
///
/// Characters are drawn last to first; each cell is independent and
/// non-overlapping, so the order is invisible but deterministic. Cells
/// that would run past the end of the scan line are skipped.
pub fn draw_line(frame: &mut [u8], geo: &Geometry, x: usize, y: usize, text: &str) {
    let bpp = geo.bytes_per_pixel();

    for (i, ch) in text.bytes().enumerate().rev() {
        let px = x + i * FONT_WIDTH;
        if (px + FONT_WIDTH) * bpp > geo.line_length {
            continue;
        }
        draw_char(frame, geo, px, y, ch);
    }
}
