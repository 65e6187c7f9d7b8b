#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use bootloader_api::{entry_point, BootInfo, BootloaderConfig};
#[cfg(target_os = "none")]
use core::panic::PanicInfo;

#[cfg(target_os = "none")]
pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(bootloader_api::config::Mapping::Dynamic);
    config
};

#[cfg(target_os = "none")]
entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

/// Four colored bars, 32x4, run-length encoded true-color with top-left origin.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
const SPLASH: [u8; 34] = [
    0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 32, 0, 4, 0, 24, 0x20,
    0x9F, 0x40, 0x40, 0xE0, // red
    0x9F, 0x40, 0xC0, 0xE0, // amber
    0x9F, 0x40, 0xC0, 0x40, // green
    0x9F, 0xE0, 0x80, 0x40, // blue
];
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
const SPLASH_SIZE: (usize, usize) = (32, 4);

#[cfg(target_os = "none")]
fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    use fbcon::{console, heap, serial, Framebuffer, FramebufferInfo};

    serial::init();
    if serial::init_logger(log::LevelFilter::Debug).is_err() {
        fbcon::serial_println!("logger already installed");
    }

    let regions = &boot_info.memory_regions;
    let offset = boot_info.physical_memory_offset.into_option();
    if let Err(err) = unsafe { heap::init(offset, regions) } {
        panic!("heap initialization failed: {}", err);
    }

    // Without a framebuffer there is nowhere to draw.
    let Some(boot_fb) = boot_info.framebuffer.as_mut() else {
        log::error!("no framebuffer in boot info, halting");
        fbcon::hlt_loop();
    };
    let info = FramebufferInfo::from_boot(&boot_fb.info());
    log::info!(
        "framebuffer found at {:p}: {}x{} {} bpp, stride {}",
        boot_fb.buffer().as_ptr(),
        info.width,
        info.height,
        info.bits_per_pixel,
        info.stride
    );
    let fb = match Framebuffer::new(boot_fb.buffer_mut(), info) {
        Ok(fb) => fb,
        Err(err) => {
            log::error!("unusable framebuffer: {}", err);
            fbcon::hlt_loop();
        }
    };
    console::init(fb, console::ConsoleConfig::default());

    fbcon::println!("fbcon: framebuffer console ready");
    x86_64::instructions::interrupts::without_interrupts(|| {
        if let Some(console) = console::CONSOLE.lock().as_mut() {
            let (w, h) = SPLASH_SIZE;
            let x = console.framebuffer().width().saturating_sub(w) / 2;
            if let Err(err) = console.display_image(x, 2 * fbcon::font::CHAR_HEIGHT, w, h, &SPLASH, false) {
                log::warn!("splash not shown: {}", err);
            }
            console.print_with_color("> ", 0xFF40_C040);
        }
    });

    fbcon::hlt_loop();
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    fbcon::serial_println!("{}", info);
    fbcon::hlt_loop()
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("fbcon is a kernel image; build it for x86_64-unknown-none");
}
