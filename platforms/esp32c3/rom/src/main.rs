/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    Entry point of the ESP32-C3 boot ROM: wires the register drivers into
    the boot flows and carries out the chosen outcome.

--*/

#![cfg_attr(target_arch = "riscv32", no_std)]
#![no_main]

#[cfg(target_arch = "riscv32")]
mod hal;
#[cfg(target_arch = "riscv32")]
mod trap;

#[cfg(target_arch = "riscv32")]
use core::arch::global_asm;

// Include the startup assembly code
#[cfg(target_arch = "riscv32")]
global_asm!(include_str!("start.s"));

#[cfg(target_arch = "riscv32")]
mod rom {
    use crate::hal::{Esp32c3Soc, RawBus, RomConsole, SpiFlash, UartPort, UsbPort};
    use c3_config::flash::DEFAULT_FLASH_GEOMETRY;
    use c3_config::ESP32C3_MEMORY_MAP;
    use c3_rom_common::download::command::MAX_FRAME_LEN;
    use c3_rom_common::download::LoaderBuffers;
    use c3_rom_common::{
        rom_start, set_fatal_error_handler, BootOutcome, FatalErrorHandler, RomEnv,
        RomParameters,
    };
    use core::fmt::Write;
    use core::mem::MaybeUninit;
    use core::ptr::addr_of_mut;
    use miniz_oxide::inflate::core::{DecompressorOxide, TINFL_LZ_DICT_SIZE};
    use romtime::{HexWord, RomError};

    static mut CONSOLE: RomConsole = RomConsole::new();
    static mut FATAL_ERROR_HANDLER: RomFatalErrorHandler = RomFatalErrorHandler;

    static mut FRAME: [u8; MAX_FRAME_LEN] = [0; MAX_FRAME_LEN];
    static mut DICTIONARY: [u8; TINFL_LZ_DICT_SIZE] = [0; TINFL_LZ_DICT_SIZE];
    static mut INFLATER: MaybeUninit<DecompressorOxide> = MaybeUninit::uninit();

    struct RomFatalErrorHandler;

    impl FatalErrorHandler for RomFatalErrorHandler {
        #[allow(clippy::empty_loop)]
        fn fatal_error(&mut self, error: RomError) -> ! {
            romtime::println!("fatal error 0x{}", HexWord(error.code()));
            // the flash boot watchdog, if armed, resets the chip
            loop {}
        }
    }

    pub fn run() -> ! {
        // SAFETY: single threaded, and each static is handed out exactly once
        let (buffers, console, handler) = unsafe {
            let inflater = (*addr_of_mut!(INFLATER)).write(DecompressorOxide::new());
            (
                LoaderBuffers {
                    frame: &mut *addr_of_mut!(FRAME),
                    dictionary: &mut *addr_of_mut!(DICTIONARY),
                    inflater,
                },
                &mut *addr_of_mut!(CONSOLE),
                &mut *addr_of_mut!(FATAL_ERROR_HANDLER),
            )
        };
        romtime::set_printer(console);
        set_fatal_error_handler(handler);

        let mut soc = Esp32c3Soc::new();
        let flash = SpiFlash::new(&DEFAULT_FLASH_GEOMETRY);
        let mut bus = RawBus::new(&ESP32C3_MEMORY_MAP);
        let mut uart = UartPort::new();
        let mut usb = UsbPort::new();

        let outcome = {
            let mut env = RomEnv::new(
                &mut soc,
                &flash,
                &mut bus,
                &mut uart,
                &mut usb,
                &ESP32C3_MEMORY_MAP,
                buffers,
            );
            rom_start(&mut env, &RomParameters::default())
        };

        match outcome {
            BootOutcome::Jump { entry, .. } => {
                // SAFETY: the boot flows only return entries inside IRAM or
                // RTC fast memory holding code they just loaded or checked
                let entry: extern "C" fn() -> ! =
                    unsafe { core::mem::transmute(entry as usize) };
                entry()
            }
            BootOutcome::Restart => {
                soc.rtc().software_system_reset();
                #[allow(clippy::empty_loop)]
                loop {}
            }
            BootOutcome::Halt(err) => c3_rom_common::fatal_error(err),
        }
    }
}

/// Main entry point called from assembly startup code
#[cfg(target_arch = "riscv32")]
#[no_mangle]
pub extern "C" fn main() -> ! {
    rom::run()
}

// Dummy main for non-RISC-V targets (for cargo check on host)
#[cfg(not(target_arch = "riscv32"))]
#[no_mangle]
pub extern "C" fn main() {
    println!("ESP32-C3 ROM (host build - no-op; see c3-hw-model)");
}
