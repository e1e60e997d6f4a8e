// Licensed under the Apache-2.0 license

//! Hardware interfaces the boot flows are written against. The platform ROM
//! implements them over the real registers; the hardware model implements
//! them in software.

use c3_config::flash::FlashGeometry;
use core::result::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum FlashDrvError {
    /// Address or length outside the device.
    INVAL,
    /// Device did not respond.
    BUSY,
    FAIL,
}

pub trait FlashStorage {
    /// Read from the flash storage, filling the provided buffer with data.
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError>;

    /// Write the full contents of the buffer, starting at `address`. The
    /// target range must have been erased.
    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError>;

    /// Erase `length` bytes starting at `address`.
    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError>;

    /// Size of the flash storage in bytes.
    fn capacity(&self) -> usize;

    /// Bring the flash out of power-down and into a readable state.
    fn attach(&self) -> Result<(), FlashDrvError> {
        Ok(())
    }

    fn set_params(&self, _geometry: &FlashGeometry) -> Result<(), FlashDrvError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The peer went away. Only host models report this.
    Closed,
}

pub trait SerialPort {
    /// Non-blocking read of one byte.
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError>;
    fn write_bytes(&mut self, bytes: &[u8]);
    fn set_baud_rate(&mut self, baud: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    Unmapped(u32),
}

/// Byte-addressed access to on-chip memory and registers.
pub trait SystemBus {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BusError>;
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BusError>;

    fn read_u32(&mut self, addr: u32) -> Result<u32, BusError> {
        let mut word = [0u8; 4];
        self.read(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), BusError> {
        self.write(addr, &value.to_le_bytes())
    }
}

/// Chip-level state consulted by the boot decision tree.
pub trait Soc {
    /// Raw reset cause code of the CPU.
    fn reset_cause(&self) -> u32;
    /// Raw strapping word latched at reset.
    fn strapping(&self) -> u32;
    fn efuse_block0(&self) -> [u32; 6];
    fn rtc_store(&self, index: usize) -> u32;
    /// Force-download request latched in the RTC domain.
    fn force_download_requested(&self) -> bool;
    fn clear_force_download(&mut self);
    fn chip_revision(&self) -> u32;
    fn delay_us(&mut self, us: u32);
    /// Arm the RTC watchdog so a hung flash boot resets the chip after
    /// `timeout_cycles` slow clock cycles.
    fn arm_flash_boot_watchdog(&mut self, timeout_cycles: u32);
}
