// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{app_image, init_logging, APP_ENTRY, POWER_ON, STRAP_SPI_BOOT};
    use c3_builder::LoaderClient;
    use c3_hw_model::{ModelChip, ModelConfig};
    use c3_rom_common::efuse::{burn, BLOCK0_WORDS, DIS_FORCE_DOWNLOAD, DIS_USB_SERIAL_JTAG};
    use c3_rom_common::{BootOutcome, JumpKind, RomParameters};
    use romtime::RomError;

    const DEEP_SLEEP: u32 = 5;
    const WAKE_STUB: u32 = 0x5000_0400;

    fn flashed(config: ModelConfig) -> ModelChip {
        init_logging();
        ModelChip::new(ModelConfig {
            flash: app_image(),
            ..config
        })
        .unwrap()
    }

    #[test]
    fn test_power_on_banner_and_flash_boot() {
        let mut chip = flashed(ModelConfig::default());
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                kind: JumpKind::Application
            }
        );
        let lines: Vec<&str> = report.log.split("\r\n").collect();
        assert_eq!(lines[0], "ESP-ROM:esp32c3-api1-20210207");
        assert_eq!(lines[1], "Build:Feb  7 2021");
        assert_eq!(lines[2], "rst:0x1 (POWERON),boot:0xc (SPI_FAST_FLASH_BOOT)");
        assert!(report.log.ends_with("entry 0x40380000\r\n"));
        assert!(report.watchdog_armed);
    }

    #[test]
    fn test_deep_sleep_cycle() {
        let mut chip = flashed(ModelConfig::default());
        assert!(matches!(
            chip.run_rom(&RomParameters::default()).outcome,
            BootOutcome::Jump { .. }
        ));

        chip.seed_rtc_wake_stub(WAKE_STUB, &[0x13, 0, 0, 0, 0x82, 0x80])
            .unwrap();
        for _ in 0..3 {
            chip.reset(DEEP_SLEEP);
            let report = chip.run_rom(&RomParameters::default());
            assert_eq!(
                report.outcome,
                BootOutcome::Jump {
                    entry: WAKE_STUB,
                    kind: JumpKind::WakeStub
                }
            );
            assert!(!report.log.contains("entry 0x"));
        }

        // a power cycle ignores whatever the RTC domain holds
        chip.reset(POWER_ON);
        let report = chip.run_rom(&RomParameters::default());
        assert!(matches!(
            report.outcome,
            BootOutcome::Jump {
                kind: JumpKind::Application,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_straps_halt() {
        let mut chip = flashed(ModelConfig {
            strapping: 0x0,
            ..Default::default()
        });
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::ROM_INVALID_BOOT_MODE)
        );
    }

    #[test]
    fn test_invalid_reset_cause_restarts() {
        let mut chip = flashed(ModelConfig {
            reset_cause: 2,
            ..Default::default()
        });
        assert_eq!(
            chip.run_rom(&RomParameters::default()).outcome,
            BootOutcome::Restart
        );
    }

    #[test]
    fn test_force_download_over_usb() {
        let mut chip = flashed(ModelConfig {
            reset_cause: 12,
            strapping: STRAP_SPI_BOOT,
            force_download: true,
            ..Default::default()
        });
        let mut client = LoaderClient::new();
        client.sync().load_ram(APP_ENTRY, &[0x13, 0, 0, 0]).mem_end(true, APP_ENTRY);
        chip.usb.send(client.wire());
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                kind: JumpKind::RamLoader
            }
        );
        assert!(!chip.soc().force_download);
        assert!(!chip.usb.output().is_empty());
        assert!(chip.uart.output().is_empty());

        // latch is one-shot
        chip.reset(12);
        let report = chip.run_rom(&RomParameters::default());
        assert!(matches!(
            report.outcome,
            BootOutcome::Jump {
                kind: JumpKind::Application,
                ..
            }
        ));
    }

    #[test]
    fn test_fused_off_paths() {
        let mut efuses = [0; BLOCK0_WORDS];
        burn(&mut efuses, &DIS_FORCE_DOWNLOAD, 1);
        burn(&mut efuses, &DIS_USB_SERIAL_JTAG, 1);
        let mut chip = flashed(ModelConfig {
            efuses,
            force_download: true,
            ..Default::default()
        });
        let report = chip.run_rom(&RomParameters::default());
        assert!(matches!(
            report.outcome,
            BootOutcome::Jump {
                kind: JumpKind::Application,
                ..
            }
        ));
        assert!(chip.soc().force_download);

        // USB is ignored in download mode, so the session never starts
        let mut client = LoaderClient::new();
        client.sync();
        chip.usb.send(client.wire());
        chip.soc_mut().strapping = crate::test::STRAP_DOWNLOAD;
        chip.reset(POWER_ON);
        let report = chip.run_rom(&RomParameters::default());
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::DOWNLOAD_CHANNELS_CLOSED)
        );
        assert!(chip.usb.output().is_empty());
    }
}
