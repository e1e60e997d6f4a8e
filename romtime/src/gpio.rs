// Licensed under the Apache-2.0 license

use crate::static_ref::StaticRef;
use tock_registers::interfaces::Readable;
use tock_registers::register_structs;
use tock_registers::registers::ReadOnly;

pub const GPIO_BASE: StaticRef<GpioRegisters> =
    unsafe { StaticRef::new(0x6000_4000 as *const GpioRegisters) };

register_structs! {
    pub GpioRegisters {
        (0x000 => _reserved0),
        (0x038 => strap: ReadOnly<u32>),
        (0x03C => @END),
    }
}

/// Latched strapping pin levels.
pub struct GpioStrap {
    registers: StaticRef<GpioRegisters>,
}

impl GpioStrap {
    pub const fn new(registers: StaticRef<GpioRegisters>) -> Self {
        GpioStrap { registers }
    }

    /// Strapping word as latched at reset; only the low 16 bits are defined.
    pub fn strapping(&self) -> u32 {
        self.registers.strap.get() & 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strapping_masks_upper_half() {
        let mut mem = [0u32; 0x3C / 4];
        mem[0x38 / 4] = 0xabcd_000c;
        let gpio =
            GpioStrap::new(unsafe { StaticRef::new(mem.as_mut_ptr() as *const GpioRegisters) });
        assert_eq!(gpio.strapping(), 0xc);
    }
}
