// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{app_image, download_chip, run_session, APP_ENTRY, SOFTWARE_RESET};
    use c3_builder::LoaderClient;
    use c3_rom_common::download::{LoaderError, Opcode};
    use c3_rom_common::efuse::{burn, BLOCK0_WORDS, DIS_DOWNLOAD_MODE, ENABLE_SECURITY_DOWNLOAD};
    use c3_rom_common::{BootOutcome, JumpKind, RomParameters};
    use romtime::RomError;

    fn secure_efuses() -> [u32; BLOCK0_WORDS] {
        let mut words = [0; BLOCK0_WORDS];
        burn(&mut words, &ENABLE_SECURITY_DOWNLOAD, 1);
        words
    }

    #[test]
    fn test_flash_writes_allowed_ram_and_registers_refused() {
        let image = app_image();
        let mut chip = download_chip(secure_efuses());
        let mut client = LoaderClient::new();
        client
            .sync()
            .get_security_info()
            .mem_begin(4, 1, 0x1800, APP_ENTRY)
            .read_reg(0x6000_8000)
            .spi_flash_md5(0, 0x100)
            .write_flash(0, &image)
            .flash_end(true);
        let (report, responses) = run_session(&mut chip, &client);

        assert_eq!(report.outcome, BootOutcome::Restart);
        let info = &responses[1];
        assert!(info.is_ok());
        let flags = u32::from_le_bytes(info.data[..4].try_into().unwrap());
        assert_eq!(flags & (1 << 2), 1 << 2);
        assert_eq!(responses[4].opcode(), Some(Opcode::SpiFlashMd5));
        for refused in &responses[2..5] {
            assert_eq!(refused.error, Some(LoaderError::InvalidMessage), "{refused:?}");
        }
        assert!(responses[5..].iter().all(|r| r.is_ok()), "{responses:?}");
        assert_eq!(&chip.flash()[..image.len()], &image[..]);

        // the freshly written image still boots
        chip.soc_mut().strapping = crate::test::STRAP_SPI_BOOT;
        chip.reset(SOFTWARE_RESET);
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                kind: JumpKind::Application
            }
        );
    }

    #[test]
    fn test_download_mode_fused_off() {
        let mut efuses = [0; BLOCK0_WORDS];
        burn(&mut efuses, &DIS_DOWNLOAD_MODE, 1);
        let mut chip = download_chip(efuses);
        let mut client = LoaderClient::new();
        client.sync();
        let (report, responses) = run_session(&mut chip, &client);

        // nothing to boot from flash either
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::IMAGE_BAD_MAGIC)
        );
        assert!(report.log.contains("Download mode disabled\r\n"));
        assert!(responses.is_empty());
    }
}
