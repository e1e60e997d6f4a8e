// Licensed under the Apache-2.0 license

use crate::static_ref::StaticRef;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

pub const USB_SERIAL_JTAG_BASE: StaticRef<UsbSerialJtagRegisters> =
    unsafe { StaticRef::new(0x6004_3000 as *const UsbSerialJtagRegisters) };

/// Polls of the IN endpoint before a byte is dropped; no host may be
/// attached.
const TX_SPIN_LIMIT: u32 = 10_000;

register_structs! {
    pub UsbSerialJtagRegisters {
        (0x000 => ep1: ReadWrite<u32, EP1::Register>),
        (0x004 => ep1_conf: ReadWrite<u32, EP1_CONF::Register>),
        (0x008 => @END),
    }
}

register_bitfields![u32,
    EP1 [
        RDWR_BYTE OFFSET(0) NUMBITS(8) [],
    ],
    EP1_CONF [
        WR_DONE OFFSET(0) NUMBITS(1) [],
        SERIAL_IN_EP_DATA_FREE OFFSET(1) NUMBITS(1) [],
        SERIAL_OUT_EP_DATA_AVAIL OFFSET(2) NUMBITS(1) [],
    ],
];

pub struct UsbSerialJtag {
    registers: StaticRef<UsbSerialJtagRegisters>,
}

impl UsbSerialJtag {
    pub const fn new(registers: StaticRef<UsbSerialJtagRegisters>) -> Self {
        UsbSerialJtag { registers }
    }

    pub fn read_byte(&self) -> Option<u8> {
        if !self
            .registers
            .ep1_conf
            .is_set(EP1_CONF::SERIAL_OUT_EP_DATA_AVAIL)
        {
            return None;
        }
        Some(self.registers.ep1.read(EP1::RDWR_BYTE) as u8)
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            let mut spins = 0;
            while !self
                .registers
                .ep1_conf
                .is_set(EP1_CONF::SERIAL_IN_EP_DATA_FREE)
            {
                spins += 1;
                if spins >= TX_SPIN_LIMIT {
                    return;
                }
            }
            self.registers.ep1.set(b as u32);
        }
        self.flush();
    }

    pub fn flush(&self) {
        self.registers.ep1_conf.write(EP1_CONF::WR_DONE::SET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_host_drops_output() {
        let mut mem = [0u32; 2];
        let usb = UsbSerialJtag::new(unsafe {
            StaticRef::new(mem.as_mut_ptr() as *const UsbSerialJtagRegisters)
        });
        assert_eq!(usb.read_byte(), None);
        usb.write_bytes(b"hi");
        assert_eq!(mem[0], 0);
    }

    #[test]
    fn test_rx_available() {
        let mut mem = [0x41u32, 0b100];
        let usb = UsbSerialJtag::new(unsafe {
            StaticRef::new(mem.as_mut_ptr() as *const UsbSerialJtagRegisters)
        });
        assert_eq!(usb.read_byte(), Some(b'A'));
    }
}
