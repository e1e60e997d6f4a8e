// Licensed under the Apache-2.0 license

//! End-to-end boots of the ROM on the hardware model, driven the way a host
//! flashing tool drives a real chip.

mod test_boot_modes;
mod test_flash_download;
mod test_ram_loader;
mod test_secure_download;

#[cfg(test)]
mod test {
    use c3_builder::{parse_responses, ImageBuilder, LoaderClient, LoaderResponse};
    use c3_hw_model::{BootReport, ModelChip, ModelConfig};
    use c3_rom_common::efuse::BLOCK0_WORDS;
    use c3_rom_common::RomParameters;
    use simple_logger::SimpleLogger;
    use std::sync::Once;

    pub const APP_ENTRY: u32 = 0x4038_0000;
    pub const APP_DATA: u32 = 0x3fc8_c000;

    pub const POWER_ON: u32 = 1;
    /// Reset cause after the ROM requested a software system reset.
    pub const SOFTWARE_RESET: u32 = 3;

    /// GPIO9 low, GPIO8 high.
    pub const STRAP_DOWNLOAD: u32 = 0x4;
    /// GPIO9 high.
    pub const STRAP_SPI_BOOT: u32 = 0xc;

    static LOGGER: Once = Once::new();

    pub fn init_logging() {
        LOGGER.call_once(|| {
            // another test binary in the process may have installed one
            let _ = SimpleLogger::new()
                .with_level(log::LevelFilter::Info)
                .init();
        });
    }

    /// Application image with a data segment and a small code segment.
    pub fn app_image() -> Vec<u8> {
        ImageBuilder::new(APP_ENTRY)
            .segment(APP_DATA, (0..0x900u32).map(|i| (i % 251) as u8).collect())
            .segment(APP_ENTRY, vec![0x13, 0, 0, 0, 0x6f, 0, 0, 0])
            .hash_appended(true)
            .build()
            .unwrap()
    }

    pub fn download_chip(efuses: [u32; BLOCK0_WORDS]) -> ModelChip {
        init_logging();
        ModelChip::new(ModelConfig {
            strapping: STRAP_DOWNLOAD,
            efuses,
            ..Default::default()
        })
        .unwrap()
    }

    /// Feeds a host session into UART0, boots, and returns the responses.
    pub fn run_session(
        chip: &mut ModelChip,
        client: &LoaderClient,
    ) -> (BootReport, Vec<LoaderResponse>) {
        chip.uart.send(client.wire());
        let report = chip.run_rom(&RomParameters::default());
        let responses = parse_responses(&chip.uart.take_output()).unwrap();
        (report, responses)
    }
}
