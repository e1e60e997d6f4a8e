// Licensed under the Apache-2.0 license

//! Software model of an ESP32-C3 that runs the boot flows of
//! `c3-rom-common` on the host.
//!
//! The model does not execute RISC-V code. A boot ends where the ROM would
//! hand over: the [`BootReport`] names the outcome and the entry point, and
//! the model keeps whatever the ROM left in RAM, flash and the RTC domain so
//! a test can inspect it or reset into the next stage.

mod bus;
mod serial;
mod soc;

pub use bus::{ModelBus, PERIPHERALS};
pub use serial::{HostSerial, DEFAULT_BAUD};
pub use soc::{ModelSoc, RTC_STORE_COUNT};

use anyhow::{bail, Result};
use c3_config::{MemoryMap, ESP32C3_MEMORY_MAP};
use c3_rom_common::download::command::MAX_FRAME_LEN;
use c3_rom_common::download::LoaderBuffers;
use c3_rom_common::efuse::BLOCK0_WORDS;
use c3_rom_common::hil::SystemBus;
use c3_rom_common::{
    rom_start, BootOutcome, RomEnv, RomParameters, SimpleFlash, RTC_MEMORY_CRC,
    RTC_STORE_WAKE_CRC, RTC_STORE_WAKE_ENTRY,
};
use miniz_oxide::inflate::core::{DecompressorOxide, TINFL_LZ_DICT_SIZE};

pub const DEFAULT_FLASH_SIZE: usize = 4 * 1024 * 1024;

/// Power-on state of the modelled chip.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub reset_cause: u32,
    pub strapping: u32,
    pub efuses: [u32; BLOCK0_WORDS],
    pub rtc_stores: [u32; RTC_STORE_COUNT],
    pub force_download: bool,
    pub chip_revision: u32,
    /// Initial flash contents, padded with erased bytes to `flash_size`.
    pub flash: Vec<u8>,
    pub flash_size: usize,
    /// Echo the ROM console to stdout as well as capturing it.
    pub echo_console: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            reset_cause: 1,
            // GPIO8 and GPIO9 high: SPI boot
            strapping: 0xc,
            efuses: [0; BLOCK0_WORDS],
            rtc_stores: [0; RTC_STORE_COUNT],
            force_download: false,
            chip_revision: 3,
            flash: Vec::new(),
            flash_size: DEFAULT_FLASH_SIZE,
            echo_console: false,
        }
    }
}

/// What one run of the ROM did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub outcome: BootOutcome,
    /// Console output, lines terminated with `\r\n`.
    pub log: String,
    pub elapsed_us: u64,
    pub watchdog_armed: bool,
}

pub struct ModelChip {
    soc: ModelSoc,
    flash: Vec<u8>,
    bus: ModelBus,
    pub uart: HostSerial,
    pub usb: HostSerial,
    memory_map: &'static MemoryMap,
    echo_console: bool,
    frame: Vec<u8>,
    dictionary: Box<[u8; TINFL_LZ_DICT_SIZE]>,
    inflater: Box<DecompressorOxide>,
}

impl ModelChip {
    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.flash.len() > config.flash_size {
            bail!(
                "flash contents are {} bytes, flash is {} bytes",
                config.flash.len(),
                config.flash_size
            );
        }
        let mut flash = config.flash;
        flash.resize(config.flash_size, 0xff);
        Ok(ModelChip {
            soc: ModelSoc {
                reset_cause: config.reset_cause,
                strapping: config.strapping,
                efuses: config.efuses,
                rtc_stores: config.rtc_stores,
                force_download: config.force_download,
                chip_revision: config.chip_revision,
                ..Default::default()
            },
            flash,
            bus: ModelBus::new(&ESP32C3_MEMORY_MAP),
            uart: HostSerial::default(),
            usb: HostSerial::default(),
            memory_map: &ESP32C3_MEMORY_MAP,
            echo_console: config.echo_console,
            frame: vec![0u8; MAX_FRAME_LEN],
            dictionary: Box::new([0u8; TINFL_LZ_DICT_SIZE]),
            inflater: Box::default(),
        })
    }

    /// Runs the ROM from the reset vector until it hands over.
    pub fn run_rom(&mut self, params: &RomParameters) -> BootReport {
        log::info!(
            "running ROM: reset cause 0x{:x}, strapping 0x{:x}",
            self.soc.reset_cause,
            self.soc.strapping
        );
        self.inflater.init();
        romtime::capture::start(self.echo_console);
        let flash = SimpleFlash::new(&mut self.flash);
        let outcome = {
            let mut env = RomEnv::new(
                &mut self.soc,
                &flash,
                &mut self.bus,
                &mut self.uart,
                &mut self.usb,
                self.memory_map,
                LoaderBuffers {
                    frame: &mut self.frame,
                    dictionary: &mut self.dictionary,
                    inflater: &mut self.inflater,
                },
            );
            rom_start(&mut env, params)
        };
        let log = romtime::capture::take();
        log::info!("ROM finished: {outcome:?}");
        BootReport {
            outcome,
            log,
            elapsed_us: self.soc.elapsed_us,
            watchdog_armed: self.soc.watchdog.is_some(),
        }
    }

    /// Resets the CPU with `cause`. RAM, flash, eFuses and the RTC domain
    /// keep their contents; the watchdog and UART baud rate do not.
    pub fn reset(&mut self, cause: u32) {
        log::debug!("reset, cause 0x{cause:x}");
        self.soc.reset_cause = cause;
        self.soc.elapsed_us = 0;
        self.soc.watchdog = None;
        self.uart.reset();
        self.usb.reset();
    }

    /// Places `code` at `entry` in RTC fast memory and records the entry and
    /// memory CRC the way an application does before entering deep sleep.
    pub fn seed_rtc_wake_stub(&mut self, entry: u32, code: &[u8]) -> Result<()> {
        let rtc = self.memory_map.rtc_fast;
        if !rtc.contains_range(entry, code.len() as u32) {
            bail!("wake stub 0x{entry:08x}+0x{:x} is outside RTC fast memory", code.len());
        }
        if self.bus.write(entry, code).is_err() {
            bail!("wake stub write to 0x{entry:08x} failed");
        }
        let crc = self.rtc_memory_crc()?;
        self.soc.rtc_stores[RTC_STORE_WAKE_ENTRY] = entry;
        self.soc.rtc_stores[RTC_STORE_WAKE_CRC] = crc;
        Ok(())
    }

    pub fn rtc_memory_crc(&self) -> Result<u32> {
        let rtc = self.memory_map.rtc_fast;
        let Some(mem) = self.bus.peek(rtc.start, rtc.size as usize) else {
            bail!("RTC fast memory is not modelled");
        };
        Ok(RTC_MEMORY_CRC.checksum(&mem))
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    pub fn read_memory(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        self.bus.peek(addr, len)
    }

    pub fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if self.bus.write(addr, data).is_err() {
            bail!("0x{addr:08x}+0x{:x} is not backed by the model", data.len());
        }
        Ok(())
    }

    pub fn soc(&self) -> &ModelSoc {
        &self.soc
    }

    pub fn soc_mut(&mut self) -> &mut ModelSoc {
        &mut self.soc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c3_builder::ImageBuilder;
    use c3_rom_common::JumpKind;
    use romtime::RomError;

    const ENTRY: u32 = 0x4038_0000;
    const DEEP_SLEEP: u32 = 5;

    fn image() -> Vec<u8> {
        ImageBuilder::new(ENTRY)
            .segment(0x3fc8_a000, vec![0xa5; 0x40])
            .segment(ENTRY, vec![0x13, 0, 0, 0, 0x6f, 0, 0, 0])
            .build()
            .unwrap()
    }

    fn flashed() -> ModelChip {
        ModelChip::new(ModelConfig {
            flash: image(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_flash_boot() {
        let mut chip = flashed();
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: ENTRY,
                kind: JumpKind::Application
            }
        );
        assert!(report.watchdog_armed);
        assert!(report.log.ends_with("entry 0x40380000\r\n"));
        assert_eq!(chip.read_memory(0x3fc8_a000, 0x40), Some(vec![0xa5; 0x40]));
    }

    #[test]
    fn test_blank_flash_halts() {
        let mut chip = ModelChip::new(ModelConfig::default()).unwrap();
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::IMAGE_BAD_MAGIC)
        );
        assert_eq!(report.log.matches("invalid header: 0xffffffff").count(), 3);
    }

    #[test]
    fn test_wake_stub_after_deep_sleep() {
        let mut chip = flashed();
        chip.run_rom(&RomParameters::default());
        chip.seed_rtc_wake_stub(0x5000_0200, &[0x13, 0, 0, 0]).unwrap();
        chip.reset(DEEP_SLEEP);
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: 0x5000_0200,
                kind: JumpKind::WakeStub
            }
        );
        assert!(!report.watchdog_armed);

        // application scribbled over RTC memory without updating the CRC
        chip.write_memory(0x5000_0000, &[1]).unwrap();
        chip.reset(DEEP_SLEEP);
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: ENTRY,
                kind: JumpKind::Application
            }
        );
    }

    #[test]
    fn test_oversized_flash_rejected() {
        let config = ModelConfig {
            flash: vec![0; 0x2000],
            flash_size: 0x1000,
            ..Default::default()
        };
        assert!(ModelChip::new(config).is_err());
    }
}
