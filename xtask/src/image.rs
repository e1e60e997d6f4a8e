// Licensed under the Apache-2.0 license

use anyhow::{Context, Result};
use c3_builder::ImageBuilder;
use c3_image::{summarize, ChipId, FlashSize, SpiMode, SpiSpeed, DIGEST_LEN};
use clap::ValueEnum;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::Path;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SpiModeArg {
    Qio,
    Qout,
    Dio,
    Dout,
}

impl From<SpiModeArg> for SpiMode {
    fn from(arg: SpiModeArg) -> Self {
        match arg {
            SpiModeArg::Qio => SpiMode::Qio,
            SpiModeArg::Qout => SpiMode::Qout,
            SpiModeArg::Dio => SpiMode::Dio,
            SpiModeArg::Dout => SpiMode::Dout,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SpiSpeedArg {
    #[value(name = "20m")]
    Mhz20,
    #[value(name = "26m")]
    Mhz26,
    #[value(name = "40m")]
    Mhz40,
    #[value(name = "80m")]
    Mhz80,
}

impl From<SpiSpeedArg> for SpiSpeed {
    fn from(arg: SpiSpeedArg) -> Self {
        match arg {
            SpiSpeedArg::Mhz20 => SpiSpeed::Mhz20,
            SpiSpeedArg::Mhz26 => SpiSpeed::Mhz26,
            SpiSpeedArg::Mhz40 => SpiSpeed::Mhz40,
            SpiSpeedArg::Mhz80 => SpiSpeed::Mhz80,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FlashSizeArg {
    #[value(name = "1MB")]
    Mb1,
    #[value(name = "2MB")]
    Mb2,
    #[value(name = "4MB")]
    Mb4,
    #[value(name = "8MB")]
    Mb8,
    #[value(name = "16MB")]
    Mb16,
}

impl From<FlashSizeArg> for FlashSize {
    fn from(arg: FlashSizeArg) -> Self {
        match arg {
            FlashSizeArg::Mb1 => FlashSize::Mb1,
            FlashSizeArg::Mb2 => FlashSize::Mb2,
            FlashSizeArg::Mb4 => FlashSize::Mb4,
            FlashSizeArg::Mb8 => FlashSize::Mb8,
            FlashSizeArg::Mb16 => FlashSize::Mb16,
        }
    }
}

pub struct ImageBuildArgs<'a> {
    pub elf: &'a Path,
    pub output: &'a Path,
    pub spi_mode: SpiMode,
    pub spi_speed: SpiSpeed,
    pub flash_size: FlashSize,
    pub hash: bool,
}

pub fn image_build(args: ImageBuildArgs) -> Result<()> {
    let elf = std::fs::read(args.elf).with_context(|| format!("reading {}", args.elf.display()))?;
    let image = ImageBuilder::from_elf(&elf)?
        .spi_mode(args.spi_mode)
        .spi_speed(args.spi_speed)
        .flash_size(args.flash_size)
        .hash_appended(args.hash)
        .build()?;
    std::fs::write(args.output, &image)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("wrote {} bytes to {}", image.len(), args.output.display());
    Ok(())
}

pub fn image_info(file: &Path, offset: u32) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let image = bytes
        .get(offset as usize..)
        .with_context(|| format!("offset 0x{offset:x} is past the end of the file"))?;
    print!("{}", describe(image)?);
    Ok(())
}

/// Human-readable summary of an image.
pub fn describe(image: &[u8]) -> Result<String> {
    let summary = summarize(image, ChipId::Esp32C3).map_err(|e| anyhow::anyhow!("{e}"))?;
    let header = &summary.header;
    let mut out = String::new();
    writeln!(out, "entry: 0x{:08x}", header.entry())?;
    writeln!(out, "spi mode: {}", header.spi_mode().name())?;
    match (header.spi_config.spi_speed(), header.spi_config.flash_size()) {
        (Some(speed), Some(size)) => writeln!(out, "spi: {speed:?}, {} bytes", size.bytes())?,
        _ => writeln!(
            out,
            "spi config: speed 0x{:x}, size 0x{:x} (unknown)",
            header.spi_config.speed(),
            header.spi_config.size()
        )?,
    }
    writeln!(out, "wp pin: 0x{:02x}", summary.extended.wp_pin)?;
    writeln!(out, "segments: {}", summary.segment_count)?;
    for (i, segment) in summary.segments().iter().enumerate() {
        writeln!(
            out,
            "  {i}: load 0x{:08x} len 0x{:06x} at file offset 0x{:x}",
            segment.load_addr, segment.data_len, segment.data_offset
        )?;
    }
    writeln!(
        out,
        "checksum: 0x{:02x} ({})",
        summary.stored_checksum,
        if summary.checksum_ok() {
            "valid".to_string()
        } else {
            format!("invalid, calculated 0x{:02x}", summary.calculated_checksum)
        }
    )?;
    if let Some(at) = summary.digest_offset {
        let stored = &image[at..at + DIGEST_LEN];
        let calculated = Sha256::digest(&image[..summary.hashed_len()]);
        let state = if stored == calculated.as_slice() {
            "valid"
        } else {
            "invalid"
        };
        writeln!(out, "digest: {} ({state})", hex::encode(stored))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let mut image = ImageBuilder::new(0x4038_0000)
            .segment(0x4038_0000, vec![0x13, 0, 0, 0])
            .hash_appended(true)
            .build()
            .unwrap();
        let text = describe(&image).unwrap();
        assert!(text.contains("entry: 0x40380000\n"));
        assert!(text.contains("spi mode: DIO\n"));
        assert!(text.contains("  0: load 0x40380000 len 0x000004"));
        assert!(text.contains("(valid)\n"));
        assert!(!text.contains("invalid"));

        // flip a data byte: both checks fail
        image[0x20] ^= 0xff;
        let text = describe(&image).unwrap();
        assert!(text.contains("checksum: 0x"));
        assert!(text.contains("invalid, calculated"));
        assert!(text.ends_with("(invalid)\n"));
    }

    #[test]
    fn test_describe_rejects_non_image() {
        assert!(describe(&[0u8; 64]).is_err());
    }
}
