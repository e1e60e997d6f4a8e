// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{download_chip, run_session, APP_ENTRY};
    use c3_builder::LoaderClient;
    use c3_hw_model::PERIPHERALS;
    use c3_rom_common::download::{LoaderError, Opcode};
    use c3_rom_common::{BootOutcome, JumpKind};
    use romtime::RomError;

    /// Large enough to need two MEM_DATA blocks.
    fn stub() -> Vec<u8> {
        (0..0x2000u32).map(|i| (i * 7) as u8).collect()
    }

    #[test]
    fn test_load_and_run_stub() {
        let code = stub();
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .load_ram(APP_ENTRY, &code)
            .load_ram(0x3fc9_0000, b"stub data")
            .mem_end(true, APP_ENTRY);
        let (report, responses) = run_session(&mut chip, &client);

        assert_eq!(
            report.outcome,
            BootOutcome::Jump {
                entry: APP_ENTRY,
                kind: JumpKind::RamLoader
            }
        );
        assert!(!report.watchdog_armed);
        assert_eq!(responses.len(), client.commands());
        assert!(responses.iter().all(|r| r.is_ok()), "{responses:?}");
        assert_eq!(chip.read_memory(APP_ENTRY, code.len()), Some(code));
        assert_eq!(
            chip.read_memory(0x3fc9_0000, 9),
            Some(b"stub data".to_vec())
        );
    }

    #[test]
    fn test_mem_end_without_entry_halts() {
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client.sync().mem_end(true, 0);
        let (report, _) = run_session(&mut chip, &client);
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::DOWNLOAD_NO_USER_CODE)
        );
    }

    #[test]
    fn test_load_over_rom_data_is_refused() {
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .mem_begin(0x100, 1, 0x1800, 0x3fcc_0000)
            .mem_end(true, 0x3fc8_0000);
        let (report, responses) = run_session(&mut chip, &client);
        assert_eq!(responses[1].opcode(), Some(Opcode::MemBegin));
        assert_eq!(responses[1].error, Some(LoaderError::FailedToAct));
        // DRAM entry is not executable; the host is left talking to the ROM
        assert_eq!(responses[2].error, Some(LoaderError::FailedToAct));
        assert_eq!(
            report.outcome,
            BootOutcome::Halt(RomError::DOWNLOAD_CHANNELS_CLOSED)
        );
    }

    #[test]
    fn test_register_access() {
        let reg = PERIPHERALS.start + 0x8000;
        let mut chip = download_chip(Default::default());
        let mut client = LoaderClient::new();
        client
            .sync()
            .write_reg(reg, 0xdead_beef, u32::MAX, 0)
            .write_reg(reg, 0x0000_1234, 0x0000_ffff, 25)
            .read_reg(reg)
            .read_reg(0x1000_0000);
        let (report, responses) = run_session(&mut chip, &client);

        assert!(responses[..4].iter().all(|r| r.is_ok()), "{responses:?}");
        assert_eq!(responses[3].value, 0xdead_1234);
        assert_eq!(chip.soc().elapsed_us, 25);
        assert_eq!(report.elapsed_us, 25);
        // nothing is mapped there
        assert_eq!(responses[4].error, Some(LoaderError::FailedToAct));
    }
}
