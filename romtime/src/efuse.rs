// Licensed under the Apache-2.0 license

use crate::static_ref::StaticRef;
use tock_registers::interfaces::Readable;
use tock_registers::register_structs;
use tock_registers::registers::ReadOnly;

pub const EFUSE_BASE: StaticRef<EfuseRegisters> =
    unsafe { StaticRef::new(0x6000_8800 as *const EfuseRegisters) };

/// Number of 32-bit words in eFuse block 0.
pub const BLOCK0_WORDS: usize = 6;

register_structs! {
    pub EfuseRegisters {
        (0x000 => _reserved0),
        (0x02C => rd_wr_dis: ReadOnly<u32>),
        (0x030 => rd_repeat_data: [ReadOnly<u32>; 5]),
        (0x044 => @END),
    }
}

pub struct EfuseRegs {
    registers: StaticRef<EfuseRegisters>,
}

impl EfuseRegs {
    pub const fn new(registers: StaticRef<EfuseRegisters>) -> Self {
        EfuseRegs { registers }
    }

    /// Block 0 as loaded by the eFuse controller: the write-disable word
    /// followed by the five repeat-data words.
    pub fn block0(&self) -> [u32; BLOCK0_WORDS] {
        let mut words = [0u32; BLOCK0_WORDS];
        words[0] = self.registers.rd_wr_dis.get();
        for (word, reg) in words[1..]
            .iter_mut()
            .zip(self.registers.rd_repeat_data.iter())
        {
            *word = reg.get();
        }
        words
    }
}
