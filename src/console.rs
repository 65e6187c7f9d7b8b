/// Text console rendered on the framebuffer.
///
/// Maintains the pen (pixel position plus colors) and applies newline,
/// carriage return, line wrapping, backspace, and scrolling on top of a
/// glyph rasterizer. Decoded TGA images can be blitted through it as well.

use core::fmt;
use spin::Mutex;

use crate::font::{Font8x16, GlyphRasterizer, Pen, CHAR_HEIGHT, CHAR_WIDTH};
use crate::framebuffer::Framebuffer;
use crate::tga::{self, DecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub foreground: u32,
    pub background: u32,
    /// Leading glyph cells of every line that backspace refuses to erase.
    pub prompt_margin_cells: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            foreground: 0xFFFF_FFFF, // White text
            background: 0xFF00_0000, // Black background
            prompt_margin_cells: 6,
        }
    }
}

pub struct Console<'a, R: GlyphRasterizer> {
    fb: Framebuffer<'a>,
    font: R,
    pen: Pen,
    prompt_margin_cells: usize,
}

pub static CONSOLE: Mutex<Option<Console<'static, Font8x16>>> = Mutex::new(None);

impl<'a, R: GlyphRasterizer> Console<'a, R> {
    /// Takes over the surface and paints it with the configured background.
    pub fn new(fb: Framebuffer<'a>, font: R, config: ConsoleConfig) -> Self {
        let mut console = Self {
            fb,
            font,
            pen: Pen {
                x: 0,
                y: 0,
                fg: config.foreground,
                bg: config.background,
            },
            prompt_margin_cells: config.prompt_margin_cells,
        };
        console.change_background(config.background);
        console
    }

    pub fn framebuffer(&self) -> &Framebuffer<'a> {
        &self.fb
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer<'a> {
        &mut self.fb
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.pen.x, self.pen.y)
    }

    pub fn reset_cursor(&mut self) {
        self.pen.x = 0;
        self.pen.y = 0;
    }

    pub fn foreground(&self) -> u32 {
        self.pen.fg
    }

    pub fn set_foreground(&mut self, color: u32) {
        self.pen.fg = color;
    }

    pub fn background(&self) -> u32 {
        self.pen.bg
    }

    pub fn set_prompt_margin(&mut self, cells: usize) {
        self.prompt_margin_cells = cells;
    }

    /// Fill the whole surface with `color` and use it as text background.
    pub fn change_background(&mut self, color: u32) {
        self.pen.bg = color;
        self.fb.fill(color);
    }

    pub fn clear(&mut self) {
        self.fb.fill(self.pen.bg);
        self.reset_cursor();
    }

    pub fn put_char(&mut self, c: char) {
        match c {
            '\n' => self.newline(),
            '\r' => self.pen.x = 0,
            '\u{8}' => self.backspace(),
            c => {
                self.font.put_char(&mut self.fb, &mut self.pen, c);
                if self.pen.x >= self.fb.width() {
                    self.newline();
                }
            }
        }
    }

    pub fn print(&mut self, s: &str) {
        for c in s.chars() {
            self.put_char(c);
        }
    }

    /// Run `f` with the foreground temporarily set to `color`.
    pub fn with_foreground<T>(&mut self, color: u32, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.pen.fg;
        self.pen.fg = color;
        let result = f(self);
        self.pen.fg = saved;
        result
    }

    pub fn print_with_color(&mut self, s: &str, color: u32) {
        self.with_foreground(color, |console| console.print(s));
    }

    /// Decode a TGA image and draw it with its top-left corner at (`x`, `y`).
    ///
    /// Returns the number of pixels that landed on the surface. Nothing is
    /// drawn when decoding fails.
    pub fn display_image(
        &mut self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        source: &[u8],
        clear_cursor_after: bool,
    ) -> Result<usize, DecodeError> {
        let image = tga::decode(source, width, height).map_err(|err| {
            log::warn!("console: cannot display {}x{} image: {}", width, height, err);
            err
        })?;
        log::debug!("console: image {}x{} at ({}, {})", image.width(), image.height(), x, y);
        let written = self.fb.blit(x, y, &image);
        drop(image);
        if clear_cursor_after {
            self.reset_cursor();
        }
        Ok(written)
    }

    fn newline(&mut self) {
        self.pen.x = 0;
        if self.pen.y + 2 * CHAR_HEIGHT <= self.fb.height() {
            self.pen.y += CHAR_HEIGHT;
        } else {
            self.fb.scroll_up(CHAR_HEIGHT, self.pen.bg);
        }
    }

    fn at_origin(&self) -> bool {
        self.pen.x == 0 && self.pen.y == 0
    }

    /// Move one cell back, wrapping to the last cell of the previous line.
    fn step_back(&mut self) {
        if self.pen.x > 0 {
            self.pen.x = self.pen.x.saturating_sub(CHAR_WIDTH);
        } else {
            let cols = (self.fb.width() / CHAR_WIDTH).max(1);
            self.pen.x = (cols - 1) * CHAR_WIDTH;
            self.pen.y = self.pen.y.saturating_sub(CHAR_HEIGHT);
        }
    }

    fn backspace(&mut self) {
        if self.pen.x < self.prompt_margin_cells * CHAR_WIDTH || self.at_origin() {
            return;
        }
        self.step_back();

        // Erase with whatever color the cell currently shows.
        let mut eraser = self.pen;
        eraser.bg = self.fb.pixel(self.pen.x, self.pen.y).unwrap_or(self.pen.bg);
        self.font.put_char(&mut self.fb, &mut eraser, ' ');
        self.pen.x = eraser.x;
        self.pen.y = eraser.y;

        if !self.at_origin() {
            self.step_back();
        }
    }
}

impl<R: GlyphRasterizer> fmt::Write for Console<'_, R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}

pub fn init(fb: Framebuffer<'static>, config: ConsoleConfig) {
    *CONSOLE.lock() = Some(Console::new(fb, Font8x16, config));
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::console::_print(::core::format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", ::core::format_args!($($arg)*)));
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        if let Some(console) = CONSOLE.lock().as_mut() {
            let _ = console.write_fmt(args);
        }
    });
}
