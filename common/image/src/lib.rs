// Licensed under the Apache-2.0 license

//! Application image format understood by the boot ROM.
//!
//! ```text
//! +----------------+----------------------+-----------------------------+
//! | ImageHeader 8B | ExtendedHeader 16B   | SegmentHeader 8B + data ... |
//! +----------------+----------------------+-----------------------------+
//! | 0x00 padding up to the last byte of a 16-byte line | checksum byte |
//! +-----------------------------------------------------------------+
//! | SHA-256 of everything above (only when hash_appended == 1)      |
//! +-----------------------------------------------------------------+
//! ```

#![cfg_attr(target_arch = "riscv32", no_std)]

use bitfield::bitfield;
use core::fmt;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const IMAGE_MAGIC: u8 = 0xe9;
pub const MAX_SEGMENTS: usize = 16;
pub const CHECKSUM_SEED: u8 = 0xef;
pub const WP_PIN_DISABLED: u8 = 0xee;
pub const DIGEST_LEN: usize = 32;
pub const IMAGE_HEADER_LEN: usize = core::mem::size_of::<ImageHeader>();
pub const EXTENDED_HEADER_LEN: usize = core::mem::size_of::<ExtendedHeader>();
pub const SEGMENT_HEADER_LEN: usize = core::mem::size_of::<SegmentHeader>();
/// Offset of the first segment header.
pub const SEGMENTS_OFFSET: usize = IMAGE_HEADER_LEN + EXTENDED_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// Not enough bytes for the structure being parsed.
    Truncated,
    BadMagic(u8),
    TooManySegments(u8),
    UnsupportedChip(u16),
    BadSpiMode(u8),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Truncated => write!(f, "image truncated"),
            ImageError::BadMagic(m) => write!(f, "bad magic 0x{m:02x}"),
            ImageError::TooManySegments(n) => write!(f, "{n} segments (max {MAX_SEGMENTS})"),
            ImageError::UnsupportedChip(id) => write!(f, "unsupported chip id 0x{id:04x}"),
            ImageError::BadSpiMode(m) => write!(f, "bad SPI mode {m}"),
        }
    }
}

/// Chip identifiers carried in the extended header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChipId {
    Esp32C3 = 0x0005,
}

impl From<ChipId> for u16 {
    fn from(id: ChipId) -> u16 {
        id as u16
    }
}

/// SPI flash read mode requested by the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpiMode {
    Qio = 0,
    Qout = 1,
    Dio = 2,
    Dout = 3,
    FastRead = 4,
    SlowRead = 5,
}

impl SpiMode {
    pub fn name(&self) -> &'static str {
        match self {
            SpiMode::Qio => "QIO",
            SpiMode::Qout => "QOUT",
            SpiMode::Dio => "DIO",
            SpiMode::Dout => "DOUT",
            SpiMode::FastRead => "FAST_READ",
            SpiMode::SlowRead => "SLOW_READ",
        }
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = ImageError;

    fn try_from(value: u8) -> Result<Self, ImageError> {
        match value {
            0 => Ok(SpiMode::Qio),
            1 => Ok(SpiMode::Qout),
            2 => Ok(SpiMode::Dio),
            3 => Ok(SpiMode::Dout),
            4 => Ok(SpiMode::FastRead),
            5 => Ok(SpiMode::SlowRead),
            _ => Err(ImageError::BadSpiMode(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiSpeed {
    Mhz40,
    Mhz26,
    Mhz20,
    Mhz80,
}

impl SpiSpeed {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(SpiSpeed::Mhz40),
            0x1 => Some(SpiSpeed::Mhz26),
            0x2 => Some(SpiSpeed::Mhz20),
            0xf => Some(SpiSpeed::Mhz80),
            _ => None,
        }
    }

    pub fn nibble(&self) -> u8 {
        match self {
            SpiSpeed::Mhz40 => 0x0,
            SpiSpeed::Mhz26 => 0x1,
            SpiSpeed::Mhz20 => 0x2,
            SpiSpeed::Mhz80 => 0xf,
        }
    }

    /// Divider applied to the 80 MHz SPI source clock.
    pub fn clock_divider(&self) -> u32 {
        match self {
            SpiSpeed::Mhz80 => 1,
            SpiSpeed::Mhz40 => 2,
            SpiSpeed::Mhz26 => 3,
            SpiSpeed::Mhz20 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashSize {
    Mb1,
    Mb2,
    Mb4,
    Mb8,
    Mb16,
}

impl FlashSize {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(FlashSize::Mb1),
            1 => Some(FlashSize::Mb2),
            2 => Some(FlashSize::Mb4),
            3 => Some(FlashSize::Mb8),
            4 => Some(FlashSize::Mb16),
            _ => None,
        }
    }

    pub fn nibble(&self) -> u8 {
        match self {
            FlashSize::Mb1 => 0,
            FlashSize::Mb2 => 1,
            FlashSize::Mb4 => 2,
            FlashSize::Mb8 => 3,
            FlashSize::Mb16 => 4,
        }
    }

    pub fn bytes(&self) -> u32 {
        (1024 * 1024) << self.nibble()
    }
}

bitfield! {
    /// Packed SPI configuration byte of the image header.
    /// Bits 3:0: flash speed
    /// Bits 7:4: flash size
    #[repr(C)]
    #[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, PartialEq, Eq, Default)]
    pub struct SpiConfig(u8);
    impl Debug;
    pub u8, speed, set_speed: 3, 0;
    pub u8, size, set_size: 7, 4;
}

impl SpiConfig {
    pub fn new(speed: SpiSpeed, size: FlashSize) -> Self {
        let mut cfg = SpiConfig(0);
        cfg.set_speed(speed.nibble());
        cfg.set_size(size.nibble());
        cfg
    }

    pub fn spi_speed(&self) -> Option<SpiSpeed> {
        SpiSpeed::from_nibble(self.speed())
    }

    pub fn flash_size(&self) -> Option<FlashSize> {
        FlashSize::from_nibble(self.size())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ImageHeader {
    pub magic: u8,
    pub segment_count: u8,
    pub spi_mode: u8,
    pub spi_config: SpiConfig,
    pub entry: U32,
}

impl ImageHeader {
    /// Parses and validates the fixed header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        let (header, _) = Self::read_from_prefix(bytes).map_err(|_| ImageError::Truncated)?;
        if header.magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic(header.magic));
        }
        if header.segment_count as usize > MAX_SEGMENTS {
            return Err(ImageError::TooManySegments(header.segment_count));
        }
        SpiMode::try_from(header.spi_mode)?;
        Ok(header)
    }

    pub fn spi_mode(&self) -> SpiMode {
        // validated by parse(); fall back to the slowest mode for hand-built headers
        SpiMode::try_from(self.spi_mode).unwrap_or(SpiMode::SlowRead)
    }

    pub fn entry(&self) -> u32 {
        self.entry.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ExtendedHeader {
    pub wp_pin: u8,
    pub spi_pin_drv: [u8; 3],
    pub chip_id: U16,
    pub min_chip_rev: u8,
    pub min_chip_rev_full: U16,
    pub max_chip_rev_full: U16,
    pub reserved: [u8; 4],
    pub hash_appended: u8,
}

impl ExtendedHeader {
    pub fn parse(bytes: &[u8], expected_chip: ChipId) -> Result<Self, ImageError> {
        let (ext, _) = Self::read_from_prefix(bytes).map_err(|_| ImageError::Truncated)?;
        if ext.chip_id.get() != u16::from(expected_chip) {
            return Err(ImageError::UnsupportedChip(ext.chip_id.get()));
        }
        Ok(ext)
    }

    pub fn hash_appended(&self) -> bool {
        self.hash_appended == 1
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SegmentHeader {
    pub load_addr: U32,
    pub data_len: U32,
}

impl SegmentHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        Self::read_from_prefix(bytes)
            .map(|(segment, _)| segment)
            .map_err(|_| ImageError::Truncated)
    }

    pub fn load_addr(&self) -> u32 {
        self.load_addr.get()
    }

    pub fn data_len(&self) -> u32 {
        self.data_len.get()
    }
}

/// Folds `data` into a running image checksum. Start from [`CHECKSUM_SEED`].
pub fn checksum_update(state: u8, data: &[u8]) -> u8 {
    data.iter().fold(state, |acc, b| acc ^ b)
}

/// Offset of the checksum byte for an image whose last segment ends at
/// `segments_end`: the last byte of the 16-byte line containing
/// `segments_end`.
pub const fn checksum_offset(segments_end: usize) -> usize {
    segments_end | 0xf
}

/// One segment as located inside a complete image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentInfo {
    pub load_addr: u32,
    pub data_len: u32,
    /// Offset of the segment data within the image.
    pub data_offset: usize,
}

/// Result of walking a complete image held in memory.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    pub header: ImageHeader,
    pub extended: ExtendedHeader,
    pub segments: [SegmentInfo; MAX_SEGMENTS],
    pub segment_count: usize,
    pub checksum_offset: usize,
    pub stored_checksum: u8,
    pub calculated_checksum: u8,
    /// Range of the appended digest, if the image carries one.
    pub digest_offset: Option<usize>,
    /// Total image length including checksum and digest.
    pub len: usize,
}

impl ImageSummary {
    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments[..self.segment_count]
    }

    pub fn checksum_ok(&self) -> bool {
        self.stored_checksum == self.calculated_checksum
    }

    /// Bytes covered by the appended digest.
    pub fn hashed_len(&self) -> usize {
        self.checksum_offset + 1
    }
}

/// Walks all headers of an in-memory image and computes its checksum.
pub fn summarize(bytes: &[u8], chip: ChipId) -> Result<ImageSummary, ImageError> {
    let header = ImageHeader::parse(bytes)?;
    let extended = ExtendedHeader::parse(
        bytes.get(IMAGE_HEADER_LEN..).ok_or(ImageError::Truncated)?,
        chip,
    )?;
    let mut segments = [SegmentInfo::default(); MAX_SEGMENTS];
    let mut offset = SEGMENTS_OFFSET;
    let mut checksum = CHECKSUM_SEED;
    for slot in segments.iter_mut().take(header.segment_count as usize) {
        let segment = SegmentHeader::parse(bytes.get(offset..).ok_or(ImageError::Truncated)?)?;
        let data_offset = offset + SEGMENT_HEADER_LEN;
        let data_end = data_offset
            .checked_add(segment.data_len() as usize)
            .ok_or(ImageError::Truncated)?;
        let data = bytes
            .get(data_offset..data_end)
            .ok_or(ImageError::Truncated)?;
        checksum = checksum_update(checksum, data);
        *slot = SegmentInfo {
            load_addr: segment.load_addr(),
            data_len: segment.data_len(),
            data_offset,
        };
        offset = data_end;
    }
    let checksum_offset = checksum_offset(offset);
    let stored_checksum = *bytes.get(checksum_offset).ok_or(ImageError::Truncated)?;
    let mut len = checksum_offset + 1;
    let digest_offset = if extended.hash_appended() {
        if bytes.len() < len + DIGEST_LEN {
            return Err(ImageError::Truncated);
        }
        let at = len;
        len += DIGEST_LEN;
        Some(at)
    } else {
        None
    };
    Ok(ImageSummary {
        header,
        extended,
        segments,
        segment_count: header.segment_count as usize,
        checksum_offset,
        stored_checksum,
        calculated_checksum: checksum,
        digest_offset,
        len,
    })
}
