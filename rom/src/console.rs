// Licensed under the Apache-2.0 license

//! Which channels the ROM prints on, and the boot banner.

use crate::efuse::Efuses;
use crate::reset_reason::ResetReason;
use crate::rom::RomParameters;
use crate::strap::Straps;
use core::fmt::Write;
use romtime::PrintTargets;

/// RTC store 4 pattern written by applications to silence the next boot.
pub const ROM_LOG_DISABLED: u32 = (1 << 0) | (1 << 16);

pub fn rom_log_disabled(store4: u32) -> bool {
    store4 & ROM_LOG_DISABLED == ROM_LOG_DISABLED
}

pub fn print_policy(efuses: &Efuses, straps: &Straps, store4: u32) -> PrintTargets {
    if rom_log_disabled(store4) {
        return PrintTargets::NONE;
    }
    PrintTargets {
        uart: efuses.uart_print_control().allows(straps.gpio8()),
        usb: !efuses.dis_usb_serial_jtag_rom_print() && !efuses.dis_usb_serial_jtag(),
    }
}

pub fn print_banner(params: &RomParameters, reason: ResetReason, straps: &Straps) {
    romtime::println!("{}", params.rom_version);
    romtime::println!("Build:{}", params.build_date);
    romtime::println!(
        "rst:0x{:x} ({}),boot:0x{:x} ({})",
        reason as u32,
        reason.name(),
        straps.raw(),
        straps.boot_mode().name()
    );
}
