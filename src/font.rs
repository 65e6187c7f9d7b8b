/// Glyph rasterization.
///
/// The console does not know how glyphs look; it hands a [`Pen`] and one
/// character to a [`GlyphRasterizer`], which paints the cell and advances
/// the pen. [`Font8x16`] is the built-in rasterizer: the `font8x8` basic set
/// with every glyph row drawn twice to fill an 8x16 cell.

use font8x8::UnicodeFonts;

use crate::framebuffer::Framebuffer;

pub const CHAR_WIDTH: usize = 8;
pub const CHAR_HEIGHT: usize = 16;

/// Text insertion point and active colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub x: usize,
    pub y: usize,
    pub fg: u32,
    pub bg: u32,
}

pub trait GlyphRasterizer {
    /// Paint `c` in the cell at the pen position and advance the pen.
    fn put_char(&self, fb: &mut Framebuffer<'_>, pen: &mut Pen, c: char);
}

impl<R: GlyphRasterizer + ?Sized> GlyphRasterizer for &R {
    fn put_char(&self, fb: &mut Framebuffer<'_>, pen: &mut Pen, c: char) {
        (**self).put_char(fb, pen, c)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Font8x16;

impl GlyphRasterizer for Font8x16 {
    fn put_char(&self, fb: &mut Framebuffer<'_>, pen: &mut Pen, c: char) {
        let glyph = font8x8::BASIC_FONTS
            .get(c)
            .or_else(|| font8x8::BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);

        for row in 0..CHAR_HEIGHT {
            let bits = glyph[row / 2];
            for col in 0..CHAR_WIDTH {
                // LSB is the leftmost pixel.
                let color = if (bits >> col) & 1 != 0 { pen.fg } else { pen.bg };
                fb.put_pixel(pen.x + col, pen.y + row, color);
            }
        }
        pen.x += CHAR_WIDTH;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FramebufferInfo;
    use alloc::vec;

    #[test]
    fn space_paints_background_and_advances() {
        let mut mem = vec![0u8; 16 * 16 * 4];
        let info = FramebufferInfo { width: 16, height: 16, bits_per_pixel: 32, stride: 64 };
        let mut fb = Framebuffer::new(&mut mem, info).unwrap();
        let mut pen = Pen { x: 8, y: 0, fg: 1, bg: 2 };
        Font8x16.put_char(&mut fb, &mut pen, ' ');
        assert_eq!(pen.x, 16);
        assert_eq!(pen.y, 0);
        for y in 0..16 {
            assert_eq!(fb.pixel(7, y), Some(0));
            for x in 8..16 {
                assert_eq!(fb.pixel(x, y), Some(2));
            }
        }
    }

    #[test]
    fn glyph_uses_foreground_and_clips() {
        let mut mem = vec![0u8; 4 * 8 * 4];
        let info = FramebufferInfo { width: 4, height: 8, bits_per_pixel: 32, stride: 16 };
        let mut fb = Framebuffer::new(&mut mem, info).unwrap();
        let mut pen = Pen { x: 0, y: 0, fg: 0xFFFF_FFFF, bg: 0 };
        Font8x16.put_char(&mut fb, &mut pen, '#');
        assert_eq!(pen.x, CHAR_WIDTH);
        let lit = (0..8)
            .flat_map(|y| (0..4).map(move |x| (x, y)))
            .filter(|&(x, y)| fb.pixel(x, y) == Some(0xFFFF_FFFF))
            .count();
        assert!(lit > 0);
    }
}
