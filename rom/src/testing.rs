// Licensed under the Apache-2.0 license

//! In-memory stand-ins for the hardware traits, shared by the unit tests.

use crate::download::LoaderBuffers;
use crate::flash::SimpleFlash;
use crate::hil::{BusError, SerialError, SerialPort, Soc, SystemBus};
use crate::rom::{rom_start, BootOutcome, RomEnv, RomParameters};
use c3_config::{MemoryRegion, ESP32C3_MEMORY_MAP};
use miniz_oxide::inflate::core::{DecompressorOxide, TINFL_LZ_DICT_SIZE};
use std::collections::VecDeque;

pub const PERIPHERALS: MemoryRegion = MemoryRegion::new(0x6000_0000, 0x10_0000);

#[derive(Debug, Default)]
pub struct FakeSoc {
    pub reset_cause: u32,
    pub strapping: u32,
    pub efuses: [u32; 6],
    pub stores: [u32; 8],
    pub force_download: bool,
    pub revision: u32,
    pub delayed_us: u64,
    pub watchdog: Option<u32>,
}

impl FakeSoc {
    pub fn booting(reset_cause: u32, strapping: u32) -> Self {
        FakeSoc {
            reset_cause,
            strapping,
            ..Default::default()
        }
    }
}

impl Soc for FakeSoc {
    fn reset_cause(&self) -> u32 {
        self.reset_cause
    }

    fn strapping(&self) -> u32 {
        self.strapping
    }

    fn efuse_block0(&self) -> [u32; 6] {
        self.efuses
    }

    fn rtc_store(&self, index: usize) -> u32 {
        self.stores[index]
    }

    fn force_download_requested(&self) -> bool {
        self.force_download
    }

    fn clear_force_download(&mut self) {
        self.force_download = false;
    }

    fn chip_revision(&self) -> u32 {
        self.revision
    }

    fn delay_us(&mut self, us: u32) {
        self.delayed_us += us as u64;
    }

    fn arm_flash_boot_watchdog(&mut self, timeout_cycles: u32) {
        self.watchdog = Some(timeout_cycles);
    }
}

/// IRAM, DRAM, RTC fast memory and a peripheral window, each backed by its
/// own vector.
pub struct FakeBus {
    regions: Vec<(MemoryRegion, Vec<u8>)>,
}

impl FakeBus {
    pub fn new() -> Self {
        let map = ESP32C3_MEMORY_MAP;
        let regions = [map.iram, map.dram, map.rtc_fast, PERIPHERALS]
            .into_iter()
            .map(|r| (r, vec![0u8; r.size as usize]))
            .collect();
        FakeBus { regions }
    }

    fn slice(&mut self, addr: u32, len: usize) -> Result<&mut [u8], BusError> {
        self.regions
            .iter_mut()
            .find(|(r, _)| r.contains_range(addr, len as u32))
            .map(|(r, mem)| {
                let start = (addr - r.start) as usize;
                &mut mem[start..start + len]
            })
            .ok_or(BusError::Unmapped(addr))
    }

    pub fn peek(&mut self, addr: u32, len: usize) -> Vec<u8> {
        self.slice(addr, len).unwrap().to_vec()
    }

    pub fn poke(&mut self, addr: u32, data: &[u8]) {
        self.slice(addr, data.len()).unwrap().copy_from_slice(data);
    }

    pub fn poke_u32(&mut self, addr: u32, value: u32) {
        self.poke(addr, &value.to_le_bytes());
    }
}

impl SystemBus for FakeBus {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BusError> {
        buf.copy_from_slice(self.slice(addr, buf.len())?);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BusError> {
        self.slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }
}

/// Serial port fed from a queue. Reports `Closed` once the queue drains.
#[derive(Debug, Default)]
pub struct FakeSerial {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub baud: u32,
}

impl FakeSerial {
    pub fn with_input(bytes: &[u8]) -> Self {
        FakeSerial {
            input: bytes.iter().copied().collect(),
            ..Default::default()
        }
    }
}

impl SerialPort for FakeSerial {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        self.input.pop_front().map(Some).ok_or(SerialError::Closed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn set_baud_rate(&mut self, baud: u32) {
        self.baud = baud;
    }
}

/// Everything a boot needs, owned in one place.
pub struct Fixture {
    pub soc: FakeSoc,
    pub flash: Vec<u8>,
    pub bus: FakeBus,
    pub uart: FakeSerial,
    pub usb: FakeSerial,
    frame: Vec<u8>,
    dictionary: Box<[u8; TINFL_LZ_DICT_SIZE]>,
    inflater: Box<DecompressorOxide>,
}

impl Fixture {
    pub fn new(soc: FakeSoc) -> Self {
        Fixture {
            soc,
            flash: vec![0xff; 0x10000],
            bus: FakeBus::new(),
            uart: FakeSerial::default(),
            usb: FakeSerial::default(),
            frame: vec![0u8; crate::download::command::MAX_FRAME_LEN],
            dictionary: Box::new([0u8; TINFL_LZ_DICT_SIZE]),
            inflater: Box::default(),
        }
    }

    pub fn with_env<T>(&mut self, f: impl FnOnce(&mut RomEnv) -> T) -> T {
        let flash = SimpleFlash::new(&mut self.flash);
        let mut env = RomEnv::new(
            &mut self.soc,
            &flash,
            &mut self.bus,
            &mut self.uart,
            &mut self.usb,
            &ESP32C3_MEMORY_MAP,
            LoaderBuffers {
                frame: &mut self.frame,
                dictionary: &mut self.dictionary,
                inflater: &mut self.inflater,
            },
        );
        f(&mut env)
    }

    /// Runs the ROM and returns its outcome with the captured console log.
    pub fn boot(&mut self, params: &RomParameters) -> (BootOutcome, String) {
        romtime::capture::start(false);
        let outcome = self.with_env(|env| rom_start(env, params));
        (outcome, romtime::capture::take())
    }
}

/// Image with one DRAM and one IRAM segment, entry in IRAM.
pub fn sample_image(hash_appended: bool) -> Vec<u8> {
    use c3_image::{
        checksum_offset, checksum_update, ChipId, ExtendedHeader, FlashSize, ImageHeader,
        SpiConfig, SpiMode, SpiSpeed, CHECKSUM_SEED, IMAGE_MAGIC, WP_PIN_DISABLED,
    };
    use sha2::{Digest, Sha256};
    use zerocopy::little_endian::{U16, U32};
    use zerocopy::IntoBytes;

    let segments: [(u32, Vec<u8>); 2] = [
        (0x3fc8_8000, (0..0x120u32).map(|i| i as u8).collect()),
        (SAMPLE_ENTRY, vec![0x13, 0x00, 0x00, 0x00, 0x6f, 0x00, 0x00, 0x00]),
    ];
    let header = ImageHeader {
        magic: IMAGE_MAGIC,
        segment_count: segments.len() as u8,
        spi_mode: SpiMode::Dio as u8,
        spi_config: SpiConfig::new(SpiSpeed::Mhz80, FlashSize::Mb4),
        entry: U32::new(SAMPLE_ENTRY),
    };
    let extended = ExtendedHeader {
        wp_pin: WP_PIN_DISABLED,
        chip_id: U16::new(ChipId::Esp32C3.into()),
        hash_appended: hash_appended as u8,
        ..Default::default()
    };
    let mut image = header.as_bytes().to_vec();
    image.extend_from_slice(extended.as_bytes());
    let mut checksum = CHECKSUM_SEED;
    for (addr, data) in &segments {
        image.extend_from_slice(&addr.to_le_bytes());
        image.extend_from_slice(&(data.len() as u32).to_le_bytes());
        image.extend_from_slice(data);
        checksum = checksum_update(checksum, data);
    }
    image.resize(checksum_offset(image.len()), 0);
    image.push(checksum);
    if hash_appended {
        let digest = Sha256::digest(&image);
        image.extend_from_slice(&digest);
    }
    image
}

pub const SAMPLE_ENTRY: u32 = 0x4038_0000;
