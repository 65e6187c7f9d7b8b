//! Framebuffer console for a bootloader_api kernel.
//!
//! Owns the linear framebuffer reported at boot, renders a monospace text
//! stream onto it, and decodes TGA images for blitting.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod console;
pub mod font;
pub mod framebuffer;
pub mod heap;
pub mod serial;
pub mod tga;

pub use console::{Console, ConsoleConfig};
pub use framebuffer::{Framebuffer, FramebufferInfo};
pub use tga::{DecodeError, DecodedImage};

pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}
