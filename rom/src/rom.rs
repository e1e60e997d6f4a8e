/*++

Licensed under the Apache-2.0 license.

File Name:

    rom.rs

Abstract:

    Boot decision tree: reset cause, straps and eFuses select between
    deep-sleep resume, download mode and flash boot.

--*/

use crate::console::{print_banner, print_policy};
use crate::deep_sleep::DeepSleepResume;
use crate::download::LoaderBuffers;
use crate::efuse::Efuses;
use crate::hil::{FlashStorage, SerialPort, Soc, SystemBus};
use crate::reset_reason::ResetReason;
use crate::strap::{BootMode, Straps};
use crate::{DownloadBoot, FlashBoot, ImageVerifier};
use c3_config::MemoryMap;
use core::fmt::Write;
use romtime::RomError;

/// RTC store register holding the ROM log control word.
pub const RTC_STORE_LOG_CONTROL: usize = 4;

/// Trait for the boot flows the decision tree can hand off to.
pub trait BootFlow {
    /// Execute the boot flow
    fn run(env: &mut RomEnv, params: &RomParameters) -> BootOutcome;
}

/// What the code being jumped to was loaded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Image loaded from flash.
    Application,
    /// Deep-sleep wake stub in RTC fast memory.
    WakeStub,
    /// Code uploaded with MEM_BEGIN/MEM_DATA/MEM_END.
    RamLoader,
}

/// How the ROM leaves. The platform carries it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Jump { entry: u32, kind: JumpKind },
    /// Software system reset.
    Restart,
    /// Spin until the watchdog resets the chip.
    Halt(RomError),
}

pub struct RomParameters<'a> {
    /// Signature check required when `SECURE_BOOT_EN` is burned.
    pub image_verifier: Option<&'a dyn ImageVerifier>,
    /// Extra flash boot attempts after the first failure.
    pub flash_boot_retries: u32,
    pub rom_version: &'a str,
    pub build_date: &'a str,
}

impl Default for RomParameters<'_> {
    fn default() -> Self {
        RomParameters {
            image_verifier: None,
            flash_boot_retries: 2,
            rom_version: "ESP-ROM:esp32c3-api1-20210207",
            build_date: "Feb  7 2021",
        }
    }
}

/// Peripherals and decoded chip state shared by all boot flows.
pub struct RomEnv<'a> {
    pub soc: &'a mut dyn Soc,
    pub flash: &'a dyn FlashStorage,
    pub bus: &'a mut dyn SystemBus,
    pub uart: &'a mut dyn SerialPort,
    pub usb: &'a mut dyn SerialPort,
    pub memory_map: &'a MemoryMap,
    pub efuses: Efuses,
    pub straps: Straps,
    pub buffers: LoaderBuffers<'a>,
}

impl<'a> RomEnv<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        soc: &'a mut dyn Soc,
        flash: &'a dyn FlashStorage,
        bus: &'a mut dyn SystemBus,
        uart: &'a mut dyn SerialPort,
        usb: &'a mut dyn SerialPort,
        memory_map: &'a MemoryMap,
        buffers: LoaderBuffers<'a>,
    ) -> Self {
        let efuses = Efuses::new(soc.efuse_block0());
        let straps = Straps::new(soc.strapping());
        RomEnv {
            soc,
            flash,
            bus,
            uart,
            usb,
            memory_map,
            efuses,
            straps,
            buffers,
        }
    }
}

pub fn rom_start(env: &mut RomEnv, params: &RomParameters) -> BootOutcome {
    // nothing is printed before the console gates are applied
    romtime::set_print_targets(print_policy(
        &env.efuses,
        &env.straps,
        env.soc.rtc_store(RTC_STORE_LOG_CONTROL),
    ));

    let raw_cause = env.soc.reset_cause();
    let Some(reason) = ResetReason::from_raw(raw_cause) else {
        romtime::println!("rst:0x{:x} (invalid)", raw_cause);
        return BootOutcome::Restart;
    };
    print_banner(params, reason, &env.straps);

    if reason == ResetReason::DeepSleep {
        // a bad wake stub falls through to a normal boot
        if let Ok(entry) = DeepSleepResume::try_resume(env) {
            return BootOutcome::Jump {
                entry,
                kind: JumpKind::WakeStub,
            };
        }
    }

    if env.soc.force_download_requested() && !env.efuses.dis_force_download() {
        env.soc.clear_force_download();
        return download_or_flash_boot(env, params);
    }

    match env.straps.boot_mode() {
        BootMode::SpiBoot => FlashBoot::run(env, params),
        BootMode::JointDownload => download_or_flash_boot(env, params),
        BootMode::Invalid => {
            romtime::println!("invalid boot mode");
            BootOutcome::Halt(RomError::ROM_INVALID_BOOT_MODE)
        }
    }
}

fn download_or_flash_boot(env: &mut RomEnv, params: &RomParameters) -> BootOutcome {
    if env.efuses.dis_download_mode() {
        romtime::println!("Download mode disabled");
        return FlashBoot::run(env, params);
    }
    DownloadBoot::run(env, params)
}
