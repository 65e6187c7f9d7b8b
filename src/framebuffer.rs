/// Linear framebuffer surface.
///
/// Wraps the pixel memory handed over by the bootloader. Pixels are 32-bit
/// packed ARGB values laid out row-major with an explicit row stride, so a
/// pixel lives at `y * (stride / 4) + x` in u32 units.

use core::fmt;

use crate::tga::DecodedImage;

const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub width: usize,
    pub height: usize,
    pub bits_per_pixel: usize,
    /// Bytes from the start of one row to the start of the next.
    pub stride: usize,
}

impl FramebufferInfo {
    /// Converts the bootloader descriptor, whose stride is counted in pixels.
    pub fn from_boot(info: &bootloader_api::info::FrameBufferInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            bits_per_pixel: info.bytes_per_pixel * 8,
            stride: info.stride * info.bytes_per_pixel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceError {
    UnsupportedDepth(usize),
    StrideTooSmall { stride: usize, row_bytes: usize },
    BufferTooSmall { len: usize, required: usize },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::UnsupportedDepth(bpp) => write!(f, "unsupported depth {} bpp", bpp),
            SurfaceError::StrideTooSmall { stride, row_bytes } => {
                write!(f, "stride {} shorter than a row of {} bytes", stride, row_bytes)
            }
            SurfaceError::BufferTooSmall { len, required } => {
                write!(f, "buffer of {} bytes, need {}", len, required)
            }
        }
    }
}

pub struct Framebuffer<'a> {
    buffer: &'a mut [u8],
    info: FramebufferInfo,
}

impl<'a> Framebuffer<'a> {
    pub fn new(buffer: &'a mut [u8], info: FramebufferInfo) -> Result<Self, SurfaceError> {
        if info.bits_per_pixel != BYTES_PER_PIXEL * 8 {
            return Err(SurfaceError::UnsupportedDepth(info.bits_per_pixel));
        }
        let row_bytes = info.width * BYTES_PER_PIXEL;
        if info.stride < row_bytes {
            return Err(SurfaceError::StrideTooSmall {
                stride: info.stride,
                row_bytes,
            });
        }
        let required = info.stride * info.height;
        if buffer.len() < required {
            return Err(SurfaceError::BufferTooSmall {
                len: buffer.len(),
                required,
            });
        }
        Ok(Self { buffer, info })
    }

    pub fn info(&self) -> &FramebufferInfo {
        &self.info
    }

    pub fn width(&self) -> usize {
        self.info.width
    }

    pub fn height(&self) -> usize {
        self.info.height
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        (y * (self.info.stride / BYTES_PER_PIXEL) + x) * BYTES_PER_PIXEL
    }

    /// Writes `color` without checking `x`/`y` against the visible area.
    ///
    /// An `x` past the width lands in row padding or the next row. Panics if
    /// the offset falls outside the pixel memory.
    #[inline]
    pub fn plot(&mut self, x: usize, y: usize, color: u32) {
        let offset = self.offset(x, y);
        self.buffer[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color.to_ne_bytes());
    }

    /// Clipped write. Returns whether the pixel was inside the surface.
    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, color: u32) -> bool {
        if x >= self.info.width || y >= self.info.height {
            return false;
        }
        self.plot(x, y, color);
        true
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.info.width || y >= self.info.height {
            return None;
        }
        let offset = self.offset(x, y);
        let mut raw = [0u8; BYTES_PER_PIXEL];
        raw.copy_from_slice(&self.buffer[offset..offset + BYTES_PER_PIXEL]);
        Some(u32::from_ne_bytes(raw))
    }

    pub fn fill(&mut self, color: u32) {
        for y in 0..self.info.height {
            for x in 0..self.info.width {
                self.plot(x, y, color);
            }
        }
    }

    /// Scroll the surface up by `rows` pixels, clearing the vacated bottom
    /// rows to `bg`.
    pub fn scroll_up(&mut self, rows: usize, bg: u32) {
        let rows = rows.min(self.info.height);
        let stride = self.info.stride;
        let total = self.info.height * stride;
        let src_start = rows * stride;

        if src_start < total {
            self.buffer.copy_within(src_start..total, 0);
        }
        for y in self.info.height - rows..self.info.height {
            for x in 0..self.info.width {
                self.plot(x, y, bg);
            }
        }
    }

    /// Copy a decoded image with its top-left corner at (`x`, `y`), clipped
    /// to the surface. Returns the number of pixels written.
    pub fn blit(&mut self, x: usize, y: usize, image: &DecodedImage) -> usize {
        let mut written = 0;
        for (row, line) in image.pixels().chunks_exact(image.width()).enumerate() {
            for (col, &color) in line.iter().enumerate() {
                if self.put_pixel(x + col, y + row, color) {
                    written += 1;
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn info(width: usize, height: usize, stride: usize) -> FramebufferInfo {
        FramebufferInfo {
            width,
            height,
            bits_per_pixel: 32,
            stride,
        }
    }

    #[test]
    fn rejects_inconsistent_geometry() {
        let mut mem = vec![0u8; 64];
        assert_eq!(
            Framebuffer::new(&mut mem, info(4, 2, 12)).err(),
            Some(SurfaceError::StrideTooSmall { stride: 12, row_bytes: 16 })
        );
        assert_eq!(
            Framebuffer::new(&mut mem, info(4, 5, 16)).err(),
            Some(SurfaceError::BufferTooSmall { len: 64, required: 80 })
        );
        let mut depth = info(4, 4, 16);
        depth.bits_per_pixel = 24;
        assert_eq!(
            Framebuffer::new(&mut mem, depth).err(),
            Some(SurfaceError::UnsupportedDepth(24))
        );
    }

    #[test]
    fn plot_touches_exactly_one_pixel() {
        // Row padding of two pixels.
        let mut mem = vec![0u8; 6 * 4 * 3];
        let mut fb = Framebuffer::new(&mut mem, info(4, 3, 24)).unwrap();
        for y in 0..3 {
            for x in 0..4 {
                fb.fill(0);
                fb.plot(x, y, 0xDEAD_BEEF);
                for yy in 0..3 {
                    for xx in 0..4 {
                        let expected = if (xx, yy) == (x, y) { 0xDEAD_BEEF } else { 0 };
                        assert_eq!(fb.pixel(xx, yy), Some(expected));
                    }
                }
            }
        }
        drop(fb);
        let touched = mem.chunks_exact(4).filter(|p| p.iter().any(|&b| b != 0)).count();
        assert_eq!(touched, 1);
    }

    #[test]
    fn put_pixel_clips() {
        let mut mem = vec![0u8; 4 * 4 * 2];
        let mut fb = Framebuffer::new(&mut mem, info(4, 2, 16)).unwrap();
        assert!(!fb.put_pixel(4, 0, 1));
        assert!(!fb.put_pixel(0, 2, 1));
        assert!(fb.put_pixel(3, 1, 1));
        assert_eq!(fb.pixel(4, 0), None);
    }

    #[test]
    fn scroll_moves_rows_and_clears_bottom() {
        let mut mem = vec![0u8; 2 * 4 * 3];
        let mut fb = Framebuffer::new(&mut mem, info(2, 3, 8)).unwrap();
        for y in 0..3 {
            for x in 0..2 {
                fb.plot(x, y, y as u32 + 1);
            }
        }
        fb.scroll_up(1, 0xAA);
        assert_eq!(fb.pixel(0, 0), Some(2));
        assert_eq!(fb.pixel(1, 1), Some(3));
        assert_eq!(fb.pixel(0, 2), Some(0xAA));
    }
}
