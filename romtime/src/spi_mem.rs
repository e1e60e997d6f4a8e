// Licensed under the Apache-2.0 license

//! SPI1 user-command access to the external flash.
//!
//! Every operation is issued as a single user transaction: an 8-bit
//! command, an optional 24-bit address and up to 64 bytes of data through
//! the W0..W15 buffer.

use crate::static_ref::StaticRef;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

pub const SPI1_BASE: StaticRef<SpiMemRegisters> =
    unsafe { StaticRef::new(0x6000_2000 as *const SpiMemRegisters) };

/// Bytes moved per user transaction.
pub const SPI_BUFFER_LEN: usize = 64;
pub const FLASH_PAGE_LEN: usize = 256;

const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_READ_DATA: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_READ_ID: u8 = 0x9f;
const STATUS_WIP: u32 = 1 << 0;
const BUSY_SPIN_LIMIT: u32 = 0x0100_0000;

register_structs! {
    pub SpiMemRegisters {
        (0x000 => cmd: ReadWrite<u32, CMD::Register>),
        (0x004 => addr: ReadWrite<u32>),
        (0x008 => _reserved0),
        (0x018 => user: ReadWrite<u32, USER::Register>),
        (0x01C => user1: ReadWrite<u32, USER1::Register>),
        (0x020 => user2: ReadWrite<u32, USER2::Register>),
        (0x024 => mosi_dlen: ReadWrite<u32>),
        (0x028 => miso_dlen: ReadWrite<u32>),
        (0x02C => _reserved1),
        (0x058 => w: [ReadWrite<u32>; 16]),
        (0x098 => @END),
    }
}

register_bitfields![u32,
    CMD [
        USR OFFSET(18) NUMBITS(1) [],
    ],
    USER [
        USR_MOSI OFFSET(27) NUMBITS(1) [],
        USR_MISO OFFSET(28) NUMBITS(1) [],
        USR_DUMMY OFFSET(29) NUMBITS(1) [],
        USR_ADDR OFFSET(30) NUMBITS(1) [],
        USR_COMMAND OFFSET(31) NUMBITS(1) [],
    ],
    USER1 [
        USR_DUMMY_CYCLELEN OFFSET(0) NUMBITS(6) [],
        USR_ADDR_BITLEN OFFSET(26) NUMBITS(6) [],
    ],
    USER2 [
        USR_COMMAND_VALUE OFFSET(0) NUMBITS(16) [],
        USR_COMMAND_BITLEN OFFSET(28) NUMBITS(4) [],
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiMemError {
    /// Transaction or busy poll never completed.
    Timeout,
    /// Request crosses a page or exceeds the transfer buffer.
    Length,
}

pub struct SpiMem {
    registers: StaticRef<SpiMemRegisters>,
}

impl SpiMem {
    pub const fn new(registers: StaticRef<SpiMemRegisters>) -> Self {
        SpiMem { registers }
    }

    fn transact(
        &self,
        command: u8,
        addr: Option<u32>,
        mosi: &[u8],
        miso: &mut [u8],
    ) -> Result<(), SpiMemError> {
        if mosi.len() > SPI_BUFFER_LEN || miso.len() > SPI_BUFFER_LEN {
            return Err(SpiMemError::Length);
        }
        self.registers.user.write(
            USER::USR_COMMAND::SET
                + USER::USR_ADDR.val(addr.is_some() as u32)
                + USER::USR_MOSI.val(!mosi.is_empty() as u32)
                + USER::USR_MISO.val(!miso.is_empty() as u32),
        );
        self.registers.user2.write(
            USER2::USR_COMMAND_VALUE.val(command as u32) + USER2::USR_COMMAND_BITLEN.val(7),
        );
        if let Some(addr) = addr {
            self.registers
                .user1
                .modify(USER1::USR_ADDR_BITLEN.val(23));
            self.registers.addr.set(addr << 8);
        }
        if !mosi.is_empty() {
            self.registers.mosi_dlen.set(mosi.len() as u32 * 8 - 1);
            for (reg, chunk) in self.registers.w.iter().zip(mosi.chunks(4)) {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                reg.set(u32::from_le_bytes(word));
            }
        }
        if !miso.is_empty() {
            self.registers.miso_dlen.set(miso.len() as u32 * 8 - 1);
        }
        self.registers.cmd.modify(CMD::USR::SET);
        let mut spins = 0;
        while self.registers.cmd.is_set(CMD::USR) {
            spins += 1;
            if spins >= BUSY_SPIN_LIMIT {
                return Err(SpiMemError::Timeout);
            }
        }
        for (reg, chunk) in self.registers.w.iter().zip(miso.chunks_mut(4)) {
            let word = reg.get().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Ok(())
    }

    pub fn read_id(&self) -> Result<u32, SpiMemError> {
        let mut id = [0u8; 3];
        self.transact(CMD_READ_ID, None, &[], &mut id)?;
        Ok(u32::from_le_bytes([id[0], id[1], id[2], 0]))
    }

    pub fn read_status(&self) -> Result<u32, SpiMemError> {
        let mut status = [0u8; 1];
        self.transact(CMD_READ_STATUS, None, &[], &mut status)?;
        Ok(status[0] as u32)
    }

    pub fn wait_idle(&self) -> Result<(), SpiMemError> {
        for _ in 0..BUSY_SPIN_LIMIT {
            if self.read_status()? & STATUS_WIP == 0 {
                return Ok(());
            }
        }
        Err(SpiMemError::Timeout)
    }

    pub fn write_enable(&self) -> Result<(), SpiMemError> {
        self.transact(CMD_WRITE_ENABLE, None, &[], &mut [])
    }

    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), SpiMemError> {
        let mut addr = addr;
        for chunk in buf.chunks_mut(SPI_BUFFER_LEN) {
            self.transact(CMD_READ_DATA, Some(addr), &[], chunk)?;
            addr += chunk.len() as u32;
        }
        Ok(())
    }

    /// Programs at most [`SPI_BUFFER_LEN`] bytes that stay inside one page.
    pub fn page_program(&self, addr: u32, data: &[u8]) -> Result<(), SpiMemError> {
        let page_left = FLASH_PAGE_LEN - (addr as usize % FLASH_PAGE_LEN);
        if data.len() > page_left {
            return Err(SpiMemError::Length);
        }
        self.write_enable()?;
        self.transact(CMD_PAGE_PROGRAM, Some(addr), data, &mut [])?;
        self.wait_idle()
    }

    /// Writes `data` at `addr`, splitting on page and buffer boundaries.
    pub fn write(&self, addr: u32, data: &[u8]) -> Result<(), SpiMemError> {
        let mut addr = addr;
        let mut data = data;
        while !data.is_empty() {
            let page_left = FLASH_PAGE_LEN - (addr as usize % FLASH_PAGE_LEN);
            let n = data.len().min(page_left).min(SPI_BUFFER_LEN);
            self.page_program(addr, &data[..n])?;
            addr += n as u32;
            data = &data[n..];
        }
        Ok(())
    }

    pub fn sector_erase(&self, addr: u32) -> Result<(), SpiMemError> {
        self.write_enable()?;
        self.transact(CMD_SECTOR_ERASE, Some(addr), &[], &mut [])?;
        self.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spi(mem: &mut [u32; 0x98 / 4]) -> SpiMem {
        SpiMem::new(unsafe { StaticRef::new(mem.as_mut_ptr() as *const SpiMemRegisters) })
    }

    #[test]
    fn test_oversize_transfer_rejected() {
        let mut mem = [0u32; 0x98 / 4];
        let spi = spi(&mut mem);
        assert_eq!(
            spi.page_program(0xf0, &[0u8; 32]),
            Err(SpiMemError::Length)
        );
    }

    #[test]
    fn test_read_setup() {
        // with no hardware the USR bit stays set until the spin limit
        let mut mem = [0u32; 0x98 / 4];
        let spi = spi(&mut mem);
        let mut buf = [0u8; 4];
        assert_eq!(spi.read(0x1000, &mut buf), Err(SpiMemError::Timeout));
        assert_eq!(mem[0x4 / 4], 0x1000 << 8);
        assert_eq!(mem[0x28 / 4], 31);
        assert_eq!(mem[0x20 / 4] & 0xffff, 0x03);
    }
}
