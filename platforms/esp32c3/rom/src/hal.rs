// Licensed under the Apache-2.0 license

//! Hardware bindings for the boot flows: the `c3_rom_common::hil` traits
//! implemented over the romtime register drivers.

use c3_config::{MemoryMap, MemoryRegion};
use c3_rom_common::hil::{
    BusError, FlashDrvError, FlashStorage, SerialError, SerialPort, Soc, SystemBus,
};
use c3_config::flash::FlashGeometry;
use core::cell::Cell;
use romtime::efuse::EFUSE_BASE;
use romtime::gpio::GPIO_BASE;
use romtime::rtc_cntl::RTC_CNTL_BASE;
use romtime::spi_mem::{SpiMemError, SPI1_BASE};
use romtime::uart::{UART0_BASE, UART_CLK_HZ};
use romtime::usb_serial_jtag::USB_SERIAL_JTAG_BASE;
use romtime::{ConsoleSink, EfuseRegs, GpioStrap, PrintTargets, RtcCntl, SpiMem, Uart, UsbSerialJtag};

/// APB peripheral window reachable with READ_REG/WRITE_REG.
pub const PERIPHERALS: MemoryRegion = MemoryRegion::new(0x6000_0000, 0x10_0000);

/// CPU runs from the 40 MHz crystal while in ROM.
const CPU_CLK_MHZ: u32 = 40;
/// Cycles per iteration of the delay loop.
const DELAY_LOOP_CYCLES: u32 = 4;

pub struct Esp32c3Soc {
    rtc: RtcCntl,
    gpio: GpioStrap,
    efuse: EfuseRegs,
}

impl Esp32c3Soc {
    pub const fn new() -> Self {
        Esp32c3Soc {
            rtc: RtcCntl::new(RTC_CNTL_BASE),
            gpio: GpioStrap::new(GPIO_BASE),
            efuse: EfuseRegs::new(EFUSE_BASE),
        }
    }

    pub fn rtc(&self) -> &RtcCntl {
        &self.rtc
    }
}

impl Soc for Esp32c3Soc {
    fn reset_cause(&self) -> u32 {
        self.rtc.reset_cause()
    }

    fn strapping(&self) -> u32 {
        self.gpio.strapping()
    }

    fn efuse_block0(&self) -> [u32; 6] {
        self.efuse.block0()
    }

    fn rtc_store(&self, index: usize) -> u32 {
        self.rtc.store(index)
    }

    fn force_download_requested(&self) -> bool {
        self.rtc.force_download_requested()
    }

    fn clear_force_download(&mut self) {
        self.rtc.clear_force_download()
    }

    /// The wafer revision lives in eFuse block 1, which the ROM never reads.
    fn chip_revision(&self) -> u32 {
        0
    }

    fn delay_us(&mut self, us: u32) {
        let loops = us.saturating_mul(CPU_CLK_MHZ) / DELAY_LOOP_CYCLES;
        for i in 0..loops {
            core::hint::black_box(i);
        }
    }

    fn arm_flash_boot_watchdog(&mut self, timeout_cycles: u32) {
        self.rtc.arm_flash_boot_watchdog(timeout_cycles)
    }
}

/// External SPI NOR flash behind SPI1.
pub struct SpiFlash {
    spi: SpiMem,
    capacity: Cell<usize>,
    sector_size: Cell<usize>,
}

impl SpiFlash {
    pub const fn new(geometry: &FlashGeometry) -> Self {
        SpiFlash {
            spi: SpiMem::new(SPI1_BASE),
            capacity: Cell::new(geometry.total_size as usize),
            sector_size: Cell::new(geometry.sector_size as usize),
        }
    }

    fn check(&self, address: usize, length: usize) -> Result<u32, FlashDrvError> {
        match address.checked_add(length) {
            Some(end) if end <= self.capacity.get() => Ok(address as u32),
            _ => Err(FlashDrvError::INVAL),
        }
    }
}

fn map_spi_error(err: SpiMemError) -> FlashDrvError {
    match err {
        SpiMemError::Timeout => FlashDrvError::BUSY,
        SpiMemError::Length => FlashDrvError::FAIL,
    }
}

impl FlashStorage for SpiFlash {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        let addr = self.check(address, buffer.len())?;
        self.spi.read(addr, buffer).map_err(map_spi_error)
    }

    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        let addr = self.check(address, buffer.len())?;
        self.spi.write(addr, buffer).map_err(map_spi_error)
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        let sector = self.sector_size.get();
        if address % sector != 0 || length % sector != 0 {
            return Err(FlashDrvError::INVAL);
        }
        let start = self.check(address, length)?;
        for offset in (0..length).step_by(sector) {
            self.spi
                .sector_erase(start + offset as u32)
                .map_err(map_spi_error)?;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn attach(&self) -> Result<(), FlashDrvError> {
        self.spi.wait_idle().map_err(map_spi_error)
    }

    fn set_params(&self, geometry: &FlashGeometry) -> Result<(), FlashDrvError> {
        self.capacity.set(geometry.total_size as usize);
        self.sector_size.set(geometry.sector_size as usize);
        Ok(())
    }
}

pub struct UartPort(Uart);

impl UartPort {
    pub const fn new() -> Self {
        UartPort(Uart::new(UART0_BASE))
    }
}

impl SerialPort for UartPort {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        Ok(self.0.read_byte())
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.write_bytes(bytes)
    }

    fn set_baud_rate(&mut self, baud: u32) {
        self.0.set_baud_rate(UART_CLK_HZ, baud)
    }
}

pub struct UsbPort(UsbSerialJtag);

impl UsbPort {
    pub const fn new() -> Self {
        UsbPort(UsbSerialJtag::new(USB_SERIAL_JTAG_BASE))
    }
}

impl SerialPort for UsbPort {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        Ok(self.0.read_byte())
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.write_bytes(bytes);
        self.0.flush();
    }

    // USB has no line rate
    fn set_baud_rate(&mut self, _baud: u32) {}
}

/// Direct access to on-chip memory. Peripheral registers only take aligned
/// word accesses; the mask ROM is read-only.
pub struct RawBus {
    memory_map: &'static MemoryMap,
}

impl RawBus {
    pub const fn new(memory_map: &'static MemoryMap) -> Self {
        RawBus { memory_map }
    }

    fn in_memory(&self, addr: u32, len: usize) -> bool {
        let m = self.memory_map;
        [m.iram, m.dram, m.rtc_fast]
            .iter()
            .any(|r| r.contains_range(addr, len as u32))
    }

    fn in_registers(&self, addr: u32, len: usize) -> bool {
        PERIPHERALS.contains_range(addr, len as u32) && addr % 4 == 0 && len % 4 == 0
    }
}

impl SystemBus for RawBus {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BusError> {
        if self.in_registers(addr, buf.len()) {
            for (i, chunk) in buf.chunks_exact_mut(4).enumerate() {
                let reg = (addr as usize + i * 4) as *const u32;
                let word = unsafe { core::ptr::read_volatile(reg) };
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            return Ok(());
        }
        if !self.in_memory(addr, buf.len())
            && !self.memory_map.rom.contains_range(addr, buf.len() as u32)
        {
            return Err(BusError::Unmapped(addr));
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile((addr as usize + i) as *const u8) };
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BusError> {
        if self.in_registers(addr, data.len()) {
            for (i, chunk) in data.chunks_exact(4).enumerate() {
                let reg = (addr as usize + i * 4) as *mut u32;
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                unsafe { core::ptr::write_volatile(reg, word) };
            }
            return Ok(());
        }
        if !self.in_memory(addr, data.len()) {
            return Err(BusError::Unmapped(addr));
        }
        for (i, byte) in data.iter().enumerate() {
            unsafe { core::ptr::write_volatile((addr as usize + i) as *mut u8, *byte) };
        }
        Ok(())
    }
}

/// Console fan-out to UART0 and USB-Serial-JTAG.
pub struct RomConsole {
    uart: Uart,
    usb: UsbSerialJtag,
}

impl RomConsole {
    pub const fn new() -> Self {
        RomConsole {
            uart: Uart::new(UART0_BASE),
            usb: UsbSerialJtag::new(USB_SERIAL_JTAG_BASE),
        }
    }
}

impl ConsoleSink for RomConsole {
    fn write_str(&mut self, targets: PrintTargets, s: &str) {
        if targets.uart {
            self.uart.write_bytes(s.as_bytes());
        }
        if targets.usb {
            self.usb.write_bytes(s.as_bytes());
            self.usb.flush();
        }
    }
}
