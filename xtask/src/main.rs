// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod image;
mod simulate;

use image::{FlashSizeArg, SpiModeArg, SpiSpeedArg};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Xtask {
    /// Log at debug level
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    xtask: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an ELF file into a flash boot image
    ImageBuild {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        elf: PathBuf,

        /// Output image file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = SpiModeArg::Dio)]
        spi_mode: SpiModeArg,

        #[arg(long, value_enum, default_value_t = SpiSpeedArg::Mhz80)]
        spi_speed: SpiSpeedArg,

        #[arg(long, value_enum, default_value_t = FlashSizeArg::Mb4)]
        flash_size: FlashSizeArg,

        /// Append a SHA-256 digest of the image
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Print the headers of an image and check its checksum and digest
    ImageInfo {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Offset of the image in the file
        #[arg(long, value_parser = maybe_hex::<u32>, default_value_t = 0)]
        offset: u32,
    },
    /// Boot the chip model and print the ROM log and outcome
    Simulate {
        /// Flash contents, written at offset 0
        #[arg(long, value_name = "FILE")]
        flash: Option<PathBuf>,

        /// Raw reset cause
        #[arg(long, value_parser = maybe_hex::<u32>, default_value_t = 1)]
        reset_cause: u32,

        /// Strapping word (bit 1 = GPIO2, bit 2 = GPIO8, bit 3 = GPIO9)
        #[arg(long, value_parser = maybe_hex::<u32>, default_value_t = 0xc)]
        strapping: u32,

        /// eFuse block 0 words, lowest first
        #[arg(long = "efuse", value_parser = maybe_hex::<u32>, num_args = 1..=6)]
        efuses: Vec<u32>,

        /// Latch a force-download request in the RTC domain
        #[arg(long, default_value_t = false)]
        force_download: bool,

        /// Bytes the host sends on UART0, e.g. a captured loader session
        #[arg(long, value_name = "FILE")]
        uart_input: Option<PathBuf>,

        /// Bytes the host sends on USB-Serial-JTAG
        #[arg(long, value_name = "FILE")]
        usb_input: Option<PathBuf>,
    },
}

fn main() {
    let cli = Xtask::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    let result = match cli.xtask {
        Commands::ImageBuild {
            elf,
            output,
            spi_mode,
            spi_speed,
            flash_size,
            hash,
        } => image::image_build(image::ImageBuildArgs {
            elf: &elf,
            output: &output,
            spi_mode: spi_mode.into(),
            spi_speed: spi_speed.into(),
            flash_size: flash_size.into(),
            hash,
        }),
        Commands::ImageInfo { file, offset } => image::image_info(&file, offset),
        Commands::Simulate {
            flash,
            reset_cause,
            strapping,
            efuses,
            force_download,
            uart_input,
            usb_input,
        } => simulate::simulate(simulate::SimulateArgs {
            flash: flash.as_deref(),
            reset_cause,
            strapping,
            efuses: &efuses,
            force_download,
            uart_input: uart_input.as_deref(),
            usb_input: usb_input.as_deref(),
        })
        .map(|_| ()),
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    });
}
