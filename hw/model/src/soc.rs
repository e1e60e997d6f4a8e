// Licensed under the Apache-2.0 license

use c3_rom_common::hil::Soc;
use c3_rom_common::efuse::BLOCK0_WORDS;

pub const RTC_STORE_COUNT: usize = 8;

/// Chip state the decision tree reads, plus what the ROM did to it.
#[derive(Debug, Clone, Default)]
pub struct ModelSoc {
    pub reset_cause: u32,
    pub strapping: u32,
    pub efuses: [u32; BLOCK0_WORDS],
    pub rtc_stores: [u32; RTC_STORE_COUNT],
    pub force_download: bool,
    pub chip_revision: u32,
    /// Time spent in `delay_us` since the last reset.
    pub elapsed_us: u64,
    /// Flash boot watchdog timeout, once armed.
    pub watchdog: Option<u32>,
}

impl Soc for ModelSoc {
    fn reset_cause(&self) -> u32 {
        self.reset_cause
    }

    fn strapping(&self) -> u32 {
        self.strapping
    }

    fn efuse_block0(&self) -> [u32; BLOCK0_WORDS] {
        self.efuses
    }

    fn rtc_store(&self, index: usize) -> u32 {
        self.rtc_stores.get(index).copied().unwrap_or(0)
    }

    fn force_download_requested(&self) -> bool {
        self.force_download
    }

    fn clear_force_download(&mut self) {
        self.force_download = false;
    }

    fn chip_revision(&self) -> u32 {
        self.chip_revision
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }

    fn arm_flash_boot_watchdog(&mut self, timeout_cycles: u32) {
        log::debug!("flash boot watchdog armed, {timeout_cycles} cycles");
        self.watchdog = Some(timeout_cycles);
    }
}
