// Licensed under the Apache-2.0 license

use anyhow::{bail, Context, Result};
use c3_hw_model::{BootReport, ModelChip, ModelConfig};
use c3_rom_common::efuse::BLOCK0_WORDS;
use c3_rom_common::{BootOutcome, RomParameters};
use std::path::Path;

pub struct SimulateArgs<'a> {
    pub flash: Option<&'a Path>,
    pub reset_cause: u32,
    pub strapping: u32,
    pub efuses: &'a [u32],
    pub force_download: bool,
    pub uart_input: Option<&'a Path>,
    pub usb_input: Option<&'a Path>,
}

fn read(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display())),
        None => Ok(Vec::new()),
    }
}

pub fn simulate(args: SimulateArgs) -> Result<BootReport> {
    if args.efuses.len() > BLOCK0_WORDS {
        bail!("eFuse block 0 has {BLOCK0_WORDS} words");
    }
    let mut efuses = [0u32; BLOCK0_WORDS];
    efuses[..args.efuses.len()].copy_from_slice(args.efuses);

    let mut chip = ModelChip::new(ModelConfig {
        reset_cause: args.reset_cause,
        strapping: args.strapping,
        efuses,
        force_download: args.force_download,
        flash: read(args.flash)?,
        echo_console: true,
        ..Default::default()
    })?;
    chip.uart.send(&read(args.uart_input)?);
    chip.usb.send(&read(args.usb_input)?);

    let report = chip.run_rom(&RomParameters::default());
    match report.outcome {
        BootOutcome::Jump { entry, kind } => {
            println!("\n--> jump to 0x{entry:08x} ({kind:?})")
        }
        BootOutcome::Restart => println!("\n--> software reset"),
        BootOutcome::Halt(err) => {
            println!("\n--> halted with 0x{:08x}, waiting for watchdog", err.code())
        }
    }
    log::info!(
        "{} us in delays, watchdog {}",
        report.elapsed_us,
        if report.watchdog_armed { "armed" } else { "off" }
    );
    if !chip.uart.output().is_empty() {
        log::info!("UART0 responses: {}", hex::encode(chip.uart.output()));
    }
    if !chip.usb.output().is_empty() {
        log::info!("USB responses: {}", hex::encode(chip.usb.output()));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use c3_builder::{ImageBuilder, LoaderClient};
    use c3_rom_common::JumpKind;
    use std::io::Write;

    #[test]
    fn test_simulate_flash_boot_from_file() {
        let image = ImageBuilder::new(0x4038_0000)
            .segment(0x4038_0000, vec![0x13, 0, 0, 0])
            .build()
            .unwrap();
        let mut flash = tempfile::NamedTempFile::new().unwrap();
        flash.write_all(&image).unwrap();
        let report = simulate(SimulateArgs {
            flash: Some(flash.path()),
            reset_cause: 1,
            strapping: 0xc,
            efuses: &[],
            force_download: false,
            uart_input: None,
            usb_input: None,
        })
        .unwrap();
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: 0x4038_0000,
                kind: JumpKind::Application
            }
        );
    }

    #[test]
    fn test_simulate_download_session_from_file() {
        let mut client = LoaderClient::new();
        client
            .sync()
            .load_ram(0x4038_0000, &[0x13, 0, 0, 0])
            .mem_end(true, 0x4038_0000);
        let mut session = tempfile::NamedTempFile::new().unwrap();
        session.write_all(client.wire()).unwrap();
        let report = simulate(SimulateArgs {
            flash: None,
            reset_cause: 1,
            strapping: 0x4,
            efuses: &[],
            force_download: false,
            uart_input: Some(session.path()),
            usb_input: None,
        })
        .unwrap();
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: 0x4038_0000,
                kind: JumpKind::RamLoader
            }
        );
    }

    #[test]
    fn test_too_many_efuse_words() {
        let args = SimulateArgs {
            flash: None,
            reset_cause: 1,
            strapping: 0xc,
            efuses: &[0; 7],
            force_download: false,
            uart_input: None,
            usb_input: None,
        };
        assert!(simulate(args).is_err());
    }
}
