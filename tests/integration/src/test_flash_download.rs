// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{
        app_image, download_chip, run_session, APP_DATA, APP_ENTRY, SOFTWARE_RESET,
        STRAP_SPI_BOOT,
    };
    use c3_builder::{md5_hex, LoaderClient};
    use c3_image::{summarize, ChipId};
    use c3_rom_common::download::{LoaderError, Opcode};
    use c3_rom_common::{BootOutcome, JumpKind, RomParameters};

    fn reboot_into_flash(chip: &mut c3_hw_model::ModelChip) -> c3_hw_model::BootReport {
        chip.soc_mut().strapping = STRAP_SPI_BOOT;
        chip.reset(SOFTWARE_RESET);
        chip.run_rom(&RomParameters::default())
    }

    #[test]
    fn test_write_flash_then_boot_it() {
        let image = app_image();
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .noise(b"\r\nesptool probing\r\n")
            .sync()
            .spi_attach()
            .write_flash(0, &image)
            .spi_flash_md5(0, image.len() as u32)
            .flash_end(true);
        let (report, responses) = run_session(&mut chip, &client);

        assert_eq!(report.outcome, BootOutcome::Restart);
        assert!(report.log.ends_with("waiting for download\r\n"));
        assert_eq!(responses.len(), client.commands());
        assert!(responses.iter().all(|r| r.is_ok()), "{responses:?}");
        let md5 = responses
            .iter()
            .find(|r| r.opcode() == Some(Opcode::SpiFlashMd5))
            .unwrap();
        assert_eq!(String::from_utf8(md5.data.clone()).unwrap(), md5_hex(&image));
        assert_eq!(&chip.flash()[..image.len()], &image[..]);
        // the rest of the last sector stays erased
        assert!(chip.flash()[image.len()..0x1000].iter().all(|&b| b == 0xff));
        assert!(summarize(chip.flash(), ChipId::Esp32C3).is_ok());

        let report = reboot_into_flash(&mut chip);
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                kind: JumpKind::Application
            }
        );
        assert!(report
            .log
            .contains("rst:0x3 (RTC_SW_SYS_RST),boot:0xc (SPI_FAST_FLASH_BOOT)\r\n"));
        assert_eq!(
            chip.read_memory(APP_DATA, 4),
            Some(vec![0, 1, 2, 3])
        );
    }

    #[test]
    fn test_write_flash_deflated_then_boot_it() {
        let image = app_image();
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .change_baudrate(921_600, 115_200)
            .write_flash_deflated(0, &image)
            .spi_flash_md5(0, image.len() as u32)
            .flash_defl_end(true);
        let (report, responses) = run_session(&mut chip, &client);

        assert_eq!(report.outcome, BootOutcome::Restart);
        assert!(responses.iter().all(|r| r.is_ok()), "{responses:?}");
        assert_eq!(chip.uart.baud(), 921_600);
        assert_eq!(&chip.flash()[..image.len()], &image[..]);

        let report = reboot_into_flash(&mut chip);
        assert!(matches!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_order_block_is_rejected() {
        let block = vec![0x11u8; 0x400];
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .flash_begin(0x800, 2, 0x400, 0x1000)
            .flash_data(1, &block)
            .flash_data(0, &block);
        let (report, responses) = run_session(&mut chip, &client);

        // host hung up without ending the session
        assert!(matches!(report.outcome, BootOutcome::Halt(_)));
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[2].error, Some(LoaderError::FailedToAct));
        assert!(responses[3].is_ok());
        assert_eq!(&chip.flash()[0x1000..0x1400], &block[..]);
        assert!(chip.flash()[0x1400..0x1800].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_flash_end_without_reboot_keeps_serving() {
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .write_flash(0x8000, b"partition table")
            .flash_end(false)
            .spi_flash_md5(0x8000, 15);
        let (_, responses) = run_session(&mut chip, &client);
        let last = responses.last().unwrap();
        assert_eq!(last.opcode(), Some(Opcode::SpiFlashMd5));
        assert_eq!(
            String::from_utf8(last.data.clone()).unwrap(),
            md5_hex(b"partition table")
        );
    }
}
