// Licensed under the Apache-2.0 license

use anyhow::{anyhow, bail, Context, Result};
use c3_config::ESP32C3_MEMORY_MAP;
use c3_image::{
    checksum_offset, checksum_update, ChipId, ExtendedHeader, FlashSize, ImageHeader, SpiConfig,
    SpiMode, SpiSpeed, CHECKSUM_SEED, IMAGE_MAGIC, MAX_SEGMENTS, WP_PIN_DISABLED,
};
use elf::abi::PT_LOAD;
use elf::endian::AnyEndian;
use elf::ElfBytes;
use sha2::{Digest, Sha256};
use zerocopy::little_endian::{U16, U32};
use zerocopy::IntoBytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub load_addr: u32,
    pub data: Vec<u8>,
}

/// Builds application images in the layout flash boot expects: image
/// header, extended header, segments, checksum byte at the end of a 16-byte
/// line, optional SHA-256 digest.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    entry: u32,
    segments: Vec<Segment>,
    spi_mode: SpiMode,
    spi_speed: SpiSpeed,
    flash_size: FlashSize,
    chip_id: ChipId,
    wp_pin: u8,
    hash_appended: bool,
}

impl ImageBuilder {
    pub fn new(entry: u32) -> Self {
        ImageBuilder {
            entry,
            segments: Vec::new(),
            spi_mode: SpiMode::Dio,
            spi_speed: SpiSpeed::Mhz80,
            flash_size: FlashSize::Mb4,
            chip_id: ChipId::Esp32C3,
            wp_pin: WP_PIN_DISABLED,
            hash_appended: false,
        }
    }

    /// Builder seeded from the loadable program headers of an ELF file.
    pub fn from_elf(bytes: &[u8]) -> Result<Self> {
        let elf_file = ElfBytes::<AnyEndian>::minimal_parse(bytes).context("parsing ELF")?;
        let entry = u32::try_from(elf_file.ehdr.e_entry).context("entry point above 4 GiB")?;
        let phdrs = elf_file
            .segments()
            .ok_or_else(|| anyhow!("ELF has no program headers"))?;
        let mut builder = ImageBuilder::new(entry);
        for phdr in phdrs.iter().filter(|p| p.p_type == PT_LOAD && p.p_filesz != 0) {
            let load_addr = u32::try_from(phdr.p_paddr).context("load address above 4 GiB")?;
            let data = elf_file
                .segment_data(&phdr)
                .with_context(|| format!("reading segment at 0x{load_addr:08x}"))?;
            log::debug!("ELF segment 0x{load_addr:08x} len 0x{:x}", data.len());
            builder = builder.segment(load_addr, data.to_vec());
        }
        builder.segments.sort_by_key(|s| s.load_addr);
        Ok(builder)
    }

    pub fn segment(mut self, load_addr: u32, data: Vec<u8>) -> Self {
        self.segments.push(Segment { load_addr, data });
        self
    }

    pub fn spi_mode(mut self, mode: SpiMode) -> Self {
        self.spi_mode = mode;
        self
    }

    pub fn spi_speed(mut self, speed: SpiSpeed) -> Self {
        self.spi_speed = speed;
        self
    }

    pub fn flash_size(mut self, size: FlashSize) -> Self {
        self.flash_size = size;
        self
    }

    pub fn chip_id(mut self, chip_id: ChipId) -> Self {
        self.chip_id = chip_id;
        self
    }

    pub fn wp_pin(mut self, wp_pin: u8) -> Self {
        self.wp_pin = wp_pin;
        self
    }

    pub fn hash_appended(mut self, hash_appended: bool) -> Self {
        self.hash_appended = hash_appended;
        self
    }

    pub fn entry(&self) -> u32 {
        self.entry
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        if self.segments.len() > MAX_SEGMENTS {
            bail!(
                "{} segments, the ROM loads at most {MAX_SEGMENTS}",
                self.segments.len()
            );
        }
        let map = &ESP32C3_MEMORY_MAP;
        for segment in &self.segments {
            if !map.is_loadable(segment.load_addr, segment.data.len() as u32) {
                bail!(
                    "segment 0x{:08x}+0x{:x} is not in RAM the ROM may load",
                    segment.load_addr,
                    segment.data.len()
                );
            }
        }
        if !map.is_executable(self.entry) {
            log::warn!("entry 0x{:08x} is not executable; flash boot will reject it", self.entry);
        }

        let header = ImageHeader {
            magic: IMAGE_MAGIC,
            segment_count: self.segments.len() as u8,
            spi_mode: self.spi_mode as u8,
            spi_config: SpiConfig::new(self.spi_speed, self.flash_size),
            entry: U32::new(self.entry),
        };
        let extended = ExtendedHeader {
            wp_pin: self.wp_pin,
            chip_id: U16::new(self.chip_id.into()),
            hash_appended: self.hash_appended as u8,
            ..Default::default()
        };
        let mut image = header.as_bytes().to_vec();
        image.extend_from_slice(extended.as_bytes());

        let mut checksum = CHECKSUM_SEED;
        for segment in &self.segments {
            // segment lengths stay word multiples
            let mut data = segment.data.clone();
            data.resize(data.len().next_multiple_of(4), 0);
            image.extend_from_slice(&segment.load_addr.to_le_bytes());
            image.extend_from_slice(&(data.len() as u32).to_le_bytes());
            checksum = checksum_update(checksum, &data);
            image.extend_from_slice(&data);
        }
        image.resize(checksum_offset(image.len()), 0);
        image.push(checksum);
        if self.hash_appended {
            let digest = Sha256::digest(&image);
            image.extend_from_slice(&digest);
        }
        Ok(image)
    }
}
