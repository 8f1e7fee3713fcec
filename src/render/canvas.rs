//! Raster canvas
//!
//! Alpha-blended drawing primitives over an `image::RgbImage`.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{MasteringError, Result};
use crate::render::font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

/// RGB colour
pub type Color = [u8; 3];

/// Drawing surface
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Create a canvas filled with `background`
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(background)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Colour at a pixel, `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width() && y < self.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    /// Blend `color` into one pixel; coordinates outside the canvas are ignored
    #[inline]
    pub fn blend(&mut self, x: i64, y: i64, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for (dst, &src) in pixel.0.iter_mut().zip(color.iter()) {
            *dst = (*dst as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8;
        }
    }

    /// Line between two points (Bresenham)
    pub fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Color, alpha: f32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.blend(x, y, color, alpha);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Vertical span, inclusive at both ends, in either order
    pub fn vspan(&mut self, x: i64, y0: i64, y1: i64, color: Color, alpha: f32) {
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in top..=bottom {
            self.blend(x, y, color, alpha);
        }
    }

    /// Horizontal span, inclusive at both ends, in either order
    pub fn hspan(&mut self, y: i64, x0: i64, x1: i64, color: Color, alpha: f32) {
        let (left, right) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        for x in left..=right {
            self.blend(x, y, color, alpha);
        }
    }

    /// Draw `text` with its top-left corner at (x, y)
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: Color, scale: u32) {
        let scale = scale.max(1);
        let mut pen_x = x;

        for c in text.chars() {
            let glyph = font::glyph(c);
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if !font::is_lit(&glyph, col, row) {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            self.blend(
                                pen_x + (col * scale + sx) as i64,
                                y + (row * scale + sy) as i64,
                                color,
                                1.0,
                            );
                        }
                    }
                }
            }
            pen_x += (ADVANCE * scale) as i64;
        }
    }

    /// Draw `text` horizontally centred on `cx`
    pub fn text_centered(&mut self, cx: i64, y: i64, text: &str, color: Color, scale: u32) {
        let width = font::text_width(text, scale.max(1)) as i64;
        self.text(cx - width / 2, y, text, color, scale);
    }

    /// Draw `text` ending at `right`
    pub fn text_right(&mut self, right: i64, y: i64, text: &str, color: Color, scale: u32) {
        let width = font::text_width(text, scale.max(1)) as i64;
        self.text(right - width, y, text, color, scale);
    }

    /// Encode the canvas as PNG
    ///
    /// # Errors
    /// * `Render` - If the encoder fails
    pub fn into_png(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| MasteringError::Render {
                reason: format!("PNG encoding failed: {}", e),
            })?;
        Ok(bytes)
    }
}
