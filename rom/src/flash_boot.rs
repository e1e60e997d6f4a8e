// Licensed under the Apache-2.0 license

//! Load the application image from SPI flash into RAM.

use crate::hil::FlashStorage;
use crate::reset_reason::ResetReason;
use crate::rom::{BootFlow, BootOutcome, JumpKind, RomEnv, RomParameters};
use c3_config::flash::BOOT_IMAGE_OFFSET;
use c3_image::{
    checksum_offset, checksum_update, ChipId, ExtendedHeader, ImageHeader, SegmentHeader,
    CHECKSUM_SEED, DIGEST_LEN, IMAGE_HEADER_LEN, SEGMENTS_OFFSET, SEGMENT_HEADER_LEN,
};
use core::fmt::Write;
use romtime::{HexBytes, HexWord, RomError, RomResult};
use sha2::{Digest, Sha256};

const COPY_CHUNK: usize = 256;

/// Sequential reader over the image that hashes everything it hands out.
struct ImageReader<'a> {
    flash: &'a dyn FlashStorage,
    base: usize,
    pos: usize,
    hasher: Sha256,
}

impl<'a> ImageReader<'a> {
    fn new(flash: &'a dyn FlashStorage, base: usize) -> Self {
        ImageReader {
            flash,
            base,
            pos: base,
            hasher: Sha256::new(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> RomResult<()> {
        self.flash
            .read(buf, self.pos)
            .map_err(|_| RomError::FLASH_BOOT_READ_FAILED)?;
        self.hasher.update(&*buf);
        self.pos += buf.len();
        Ok(())
    }

    fn fits(&self, len: usize) -> bool {
        self.pos
            .checked_add(len)
            .is_some_and(|end| end <= self.flash.capacity())
    }

    /// Bytes consumed so far, relative to the start of the image.
    fn offset(&self) -> usize {
        self.pos - self.base
    }
}

pub struct FlashBoot;

impl BootFlow for FlashBoot {
    fn run(env: &mut RomEnv, params: &RomParameters) -> BootOutcome {
        let power_on = ResetReason::from_raw(env.soc.reset_cause()).is_some_and(|r| r.is_power_on());
        if power_on {
            let tpuw_ms = env.efuses.flash_tpuw_ms();
            env.soc.delay_us(tpuw_ms * 1000);
        }
        env.soc
            .arm_flash_boot_watchdog(env.efuses.flash_boot_watchdog_cycles());

        let mut last_error = RomError::FLASH_BOOT_READ_FAILED;
        for _ in 0..=params.flash_boot_retries {
            match load_image(env, params) {
                Ok(entry) => {
                    romtime::println!("entry 0x{}", HexWord(entry));
                    return BootOutcome::Jump {
                        entry,
                        kind: JumpKind::Application,
                    };
                }
                Err(err) => last_error = err,
            }
        }
        // the armed watchdog resets the chip from here
        BootOutcome::Halt(last_error)
    }
}

/// Copies every segment into RAM and checks the image. Returns the entry
/// point.
fn load_image(env: &mut RomEnv, params: &RomParameters) -> RomResult<u32> {
    env.flash
        .attach()
        .map_err(|_| RomError::FLASH_BOOT_READ_FAILED)?;
    let mut reader = ImageReader::new(env.flash, BOOT_IMAGE_OFFSET as usize);

    let mut head = [0u8; SEGMENTS_OFFSET];
    reader.read(&mut head)?;
    let parsed = ImageHeader::parse(&head).and_then(|header| {
        let extended = ExtendedHeader::parse(&head[IMAGE_HEADER_LEN..], ChipId::Esp32C3)?;
        Ok((header, extended))
    });
    let (header, extended) = match parsed {
        Ok(headers) => headers,
        Err(err) => {
            let first = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
            romtime::println!("invalid header: 0x{}", HexWord(first));
            return Err(err.into());
        }
    };
    romtime::println!("SPIWP:0x{:x}", extended.wp_pin);
    romtime::println!(
        "mode:{}, clock div:{}",
        header.spi_mode().name(),
        header
            .spi_config
            .spi_speed()
            .map_or(1, |speed| speed.clock_divider())
    );

    let mut checksum = CHECKSUM_SEED;
    let mut chunk = [0u8; COPY_CHUNK];
    for _ in 0..header.segment_count {
        let mut raw = [0u8; SEGMENT_HEADER_LEN];
        reader.read(&mut raw)?;
        let segment = SegmentHeader::parse(&raw)?;
        let (addr, len) = (segment.load_addr(), segment.data_len());
        if !reader.fits(len as usize) {
            return Err(RomError::FLASH_BOOT_SEGMENT_OUT_OF_FLASH);
        }
        romtime::println!("load:0x{},len:0x{:x}", HexWord(addr), len);
        if !env.memory_map.is_loadable(addr, len) {
            return Err(RomError::FLASH_BOOT_SEGMENT_NOT_LOADABLE);
        }
        let mut copied = 0;
        while copied < len {
            let n = (len - copied).min(COPY_CHUNK as u32) as usize;
            reader.read(&mut chunk[..n])?;
            checksum = checksum_update(checksum, &chunk[..n]);
            env.bus
                .write(addr + copied, &chunk[..n])
                .map_err(|_| RomError::FLASH_BOOT_RAM_WRITE_FAILED)?;
            copied += n as u32;
        }
    }

    // padding up to the checksum byte, 1 to 16 bytes
    let tail_len = checksum_offset(reader.offset()) + 1 - reader.offset();
    let tail = &mut chunk[..tail_len];
    reader.read(tail)?;
    let stored = tail[tail_len - 1];
    if stored != checksum {
        romtime::println!(
            "Checksum failure. Calculated 0x{:02x} stored 0x{:02x}",
            checksum,
            stored
        );
        return Err(RomError::FLASH_BOOT_CHECKSUM_MISMATCH);
    }

    let mut image_len = reader.offset();
    let digest_at = reader.pos;
    let digest: [u8; DIGEST_LEN] = reader.hasher.finalize().into();
    if extended.hash_appended() {
        let mut appended = [0u8; DIGEST_LEN];
        env.flash
            .read(&mut appended, digest_at)
            .map_err(|_| RomError::FLASH_BOOT_READ_FAILED)?;
        image_len += DIGEST_LEN;
        if appended != digest {
            romtime::println!("SHA-256 comparison failed:");
            romtime::println!("Calculated: {}", HexBytes(&digest));
            romtime::println!("Expected: {}", HexBytes(&appended));
            return Err(RomError::FLASH_BOOT_DIGEST_MISMATCH);
        }
    }

    if env.efuses.secure_boot_enabled() {
        let verified = params
            .image_verifier
            .is_some_and(|v| v.verify(&digest, image_len, env.flash, &env.efuses));
        if !verified {
            romtime::println!("secure boot check fail");
            return Err(RomError::FLASH_BOOT_SECURE_BOOT_FAILED);
        }
    }

    let entry = header.entry();
    if !env.memory_map.is_executable(entry) {
        romtime::println!("invalid entry 0x{}", HexWord(entry));
        return Err(RomError::FLASH_BOOT_INVALID_ENTRY);
    }
    Ok(entry)
}
