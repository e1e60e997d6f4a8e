// Licensed under the Apache-2.0 license

use c3_rom_common::fatal_error;
use core::fmt::Write;
use riscv_csr::csr::{ReadWriteRiscvCsr, MCAUSE, MEPC, MTVAL};
use romtime::{HexWord, RomError};
use tock_registers::interfaces::Readable;

/// Called from `_trap_vector` on a fresh stack. The ROM never enables
/// interrupts, so every trap is an exception.
#[no_mangle]
pub extern "C" fn trap_handler() -> ! {
    let mcause = ReadWriteRiscvCsr::<usize, (), MCAUSE>::new().get();
    let mepc = ReadWriteRiscvCsr::<usize, (), MEPC>::new().get();
    let mtval = ReadWriteRiscvCsr::<usize, (), MTVAL>::new().get();
    romtime::println!(
        "Exception mcause=0x{} mepc=0x{} mtval=0x{}",
        HexWord(mcause as u32),
        HexWord(mepc as u32),
        HexWord(mtval as u32)
    );
    fatal_error(RomError::ROM_TRAP)
}
