/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Common libraries for the ESP32-C3 boot ROM.

--*/

#![cfg_attr(target_arch = "riscv32", no_std)]

mod console;
pub use console::*;
mod deep_sleep;
pub use deep_sleep::*;
pub mod download;
pub mod efuse;
pub use efuse::Efuses;
pub mod flash;
pub use flash::*;
mod fuse_layout;
pub use fuse_layout::*;
pub mod hil;
pub mod image_verifier;
pub use image_verifier::ImageVerifier;
mod reset_reason;
pub use reset_reason::*;
mod rom;
pub use rom::*;
mod strap;
pub use strap::*;

// Boot flow modules
mod download_boot;
mod flash_boot;
pub use download_boot::DownloadBoot;
pub use flash_boot::FlashBoot;

#[cfg(test)]
mod testing;

use romtime::RomError;

/// Last stop for errors the ROM cannot boot past.
pub trait FatalErrorHandler {
    fn fatal_error(&mut self, error: RomError) -> !;
}

static mut FATAL_ERROR_HANDLER: Option<&'static mut dyn FatalErrorHandler> = None;

/// Installs the handler [`fatal_error`] hands off to.
///
/// SAFETY: nothing else may hold a reference to `handler` afterwards. Install
/// it once, early in `main`.
pub fn set_fatal_error_handler(handler: &'static mut dyn FatalErrorHandler) {
    unsafe {
        FATAL_ERROR_HANDLER = Some(handler);
    }
}

#[panic_handler]
#[inline(never)]
#[cfg(target_arch = "riscv32")]
fn rom_panic(_: &core::panic::PanicInfo) -> ! {
    fatal_error(RomError::ROM_PANIC)
}

/// Stops the boot. Without a handler the core spins until a watchdog resets
/// the chip.
#[inline(never)]
#[allow(clippy::empty_loop)]
pub fn fatal_error(error: RomError) -> ! {
    #[allow(static_mut_refs)]
    match unsafe { FATAL_ERROR_HANDLER.as_mut() } {
        Some(handler) => handler.fatal_error(error),
        None => loop {},
    }
}
