// Licensed under the Apache-2.0 license

use c3_image::ImageError;
use core::num::NonZeroU32;

/// ROM error code. The upper half names the subsystem, the lower half the
/// failure within it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RomError(NonZeroU32);

pub type RomResult<T> = Result<T, RomError>;

impl RomError {
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("RomError cannot be 0"),
        }
    }

    pub const ROM_INVALID_BOOT_MODE: RomError = Self::new_const(0x0001_0002);
    pub const ROM_PANIC: RomError = Self::new_const(0x0001_0003);
    pub const ROM_TRAP: RomError = Self::new_const(0x0001_0004);

    pub const EFUSE_LAYOUT_TOO_LARGE: RomError = Self::new_const(0x0002_0001);

    pub const IMAGE_TRUNCATED: RomError = Self::new_const(0x0003_0001);
    pub const IMAGE_BAD_MAGIC: RomError = Self::new_const(0x0003_0002);
    pub const IMAGE_TOO_MANY_SEGMENTS: RomError = Self::new_const(0x0003_0003);
    pub const IMAGE_UNSUPPORTED_CHIP: RomError = Self::new_const(0x0003_0004);
    pub const IMAGE_BAD_SPI_MODE: RomError = Self::new_const(0x0003_0005);

    pub const FLASH_BOOT_READ_FAILED: RomError = Self::new_const(0x0004_0001);
    pub const FLASH_BOOT_SEGMENT_OUT_OF_FLASH: RomError = Self::new_const(0x0004_0002);
    pub const FLASH_BOOT_SEGMENT_NOT_LOADABLE: RomError = Self::new_const(0x0004_0003);
    pub const FLASH_BOOT_CHECKSUM_MISMATCH: RomError = Self::new_const(0x0004_0004);
    pub const FLASH_BOOT_DIGEST_MISMATCH: RomError = Self::new_const(0x0004_0005);
    pub const FLASH_BOOT_SECURE_BOOT_FAILED: RomError = Self::new_const(0x0004_0006);
    pub const FLASH_BOOT_INVALID_ENTRY: RomError = Self::new_const(0x0004_0007);
    pub const FLASH_BOOT_RAM_WRITE_FAILED: RomError = Self::new_const(0x0004_0008);

    pub const DOWNLOAD_NO_USER_CODE: RomError = Self::new_const(0x0005_0001);
    pub const DOWNLOAD_CHANNELS_CLOSED: RomError = Self::new_const(0x0005_0002);

    pub const DEEP_SLEEP_DISABLED: RomError = Self::new_const(0x0006_0001);
    pub const DEEP_SLEEP_CRC_MISMATCH: RomError = Self::new_const(0x0006_0002);
    pub const DEEP_SLEEP_INVALID_ENTRY: RomError = Self::new_const(0x0006_0003);
    pub const DEEP_SLEEP_READ_FAILED: RomError = Self::new_const(0x0006_0004);

    pub const fn code(&self) -> u32 {
        self.0.get()
    }
}

impl From<RomError> for u32 {
    fn from(error: RomError) -> u32 {
        error.code()
    }
}

impl From<ImageError> for RomError {
    fn from(error: ImageError) -> RomError {
        match error {
            ImageError::Truncated => RomError::IMAGE_TRUNCATED,
            ImageError::BadMagic(_) => RomError::IMAGE_BAD_MAGIC,
            ImageError::TooManySegments(_) => RomError::IMAGE_TOO_MANY_SEGMENTS,
            ImageError::UnsupportedChip(_) => RomError::IMAGE_UNSUPPORTED_CHIP,
            ImageError::BadSpiMode(_) => RomError::IMAGE_BAD_SPI_MODE,
        }
    }
}

impl core::fmt::Debug for RomError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RomError(0x{:08x})", self.code())
    }
}
