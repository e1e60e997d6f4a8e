// Licensed under the Apache-2.0 license

use crate::static_ref::StaticRef;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

pub const UART0_BASE: StaticRef<UartRegisters> =
    unsafe { StaticRef::new(0x6000_0000 as *const UartRegisters) };

/// APB clock feeding the UART divider.
pub const UART_CLK_HZ: u32 = 40_000_000;
const TX_FIFO_SIZE: u32 = 128;

register_structs! {
    pub UartRegisters {
        (0x000 => fifo: ReadWrite<u32, FIFO::Register>),
        (0x004 => _reserved0),
        (0x014 => clkdiv: ReadWrite<u32, CLKDIV::Register>),
        (0x018 => _reserved1),
        (0x01C => status: ReadOnly<u32, STATUS::Register>),
        (0x020 => @END),
    }
}

register_bitfields![u32,
    FIFO [
        RXFIFO_RD_BYTE OFFSET(0) NUMBITS(8) [],
    ],
    CLKDIV [
        CLKDIV OFFSET(0) NUMBITS(12) [],
        FRAG OFFSET(20) NUMBITS(4) [],
    ],
    STATUS [
        RXFIFO_CNT OFFSET(0) NUMBITS(10) [],
        TXFIFO_CNT OFFSET(16) NUMBITS(10) [],
    ],
];

pub struct Uart {
    registers: StaticRef<UartRegisters>,
}

impl Uart {
    pub const fn new(registers: StaticRef<UartRegisters>) -> Self {
        Uart { registers }
    }

    pub fn rx_count(&self) -> u32 {
        self.registers.status.read(STATUS::RXFIFO_CNT)
    }

    pub fn read_byte(&self) -> Option<u8> {
        if self.rx_count() == 0 {
            return None;
        }
        Some(self.registers.fifo.read(FIFO::RXFIFO_RD_BYTE) as u8)
    }

    pub fn write_byte(&self, byte: u8) {
        while self.registers.status.read(STATUS::TXFIFO_CNT) >= TX_FIFO_SIZE - 1 {}
        self.registers.fifo.set(byte as u32);
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Programs the fractional divider for `baud` from a `clk_hz` source.
    pub fn set_baud_rate(&self, clk_hz: u32, baud: u32) {
        let (div, frag) = baud_divider(clk_hz, baud);
        self.registers
            .clkdiv
            .write(CLKDIV::CLKDIV.val(div) + CLKDIV::FRAG.val(frag));
    }
}

/// Integer and 1/16th fractional parts of `clk_hz / baud`.
pub fn baud_divider(clk_hz: u32, baud: u32) -> (u32, u32) {
    let baud = baud.max(1);
    let div16 = ((clk_hz as u64) << 4) / baud as u64;
    ((div16 >> 4) as u32, (div16 & 0xf) as u32)
}
