// Licensed under the Apache-2.0 license

//! RTC control block: reset cause, retention registers, the flash boot
//! watchdog and software reset.

use crate::static_ref::StaticRef;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

pub const RTC_CNTL_BASE: StaticRef<RtcCntlRegisters> =
    unsafe { StaticRef::new(0x6000_8000 as *const RtcCntlRegisters) };

/// Unlock key for the watchdog configuration registers.
const WDT_WKEY: u32 = 0x50d8_3aa1;

pub const STORE_COUNT: usize = 8;

register_structs! {
    pub RtcCntlRegisters {
        (0x000 => options0: ReadWrite<u32, OPTIONS0::Register>),
        (0x004 => _reserved0),
        (0x038 => reset_state: ReadOnly<u32, RESET_STATE::Register>),
        (0x03C => _reserved1),
        (0x050 => store_lo: [ReadWrite<u32>; 4]),
        (0x060 => _reserved2),
        (0x090 => wdtconfig0: ReadWrite<u32, WDTCONFIG0::Register>),
        (0x094 => wdtconfig1: ReadWrite<u32>),
        (0x098 => _reserved3),
        (0x0A4 => wdtfeed: WriteOnly<u32>),
        (0x0A8 => wdtwprotect: ReadWrite<u32>),
        (0x0AC => _reserved4),
        (0x0B8 => store_hi: [ReadWrite<u32>; 4]),
        (0x0C8 => _reserved5),
        (0x128 => option1: ReadWrite<u32, OPTION1::Register>),
        (0x12C => @END),
    }
}

register_bitfields![u32,
    OPTIONS0 [
        SW_SYS_RST OFFSET(31) NUMBITS(1) [],
    ],
    RESET_STATE [
        RESET_CAUSE_PROCPU OFFSET(0) NUMBITS(6) [],
    ],
    WDTCONFIG0 [
        CHIP_RESET_EN OFFSET(8) NUMBITS(1) [],
        PAUSE_INSLEEP OFFSET(9) NUMBITS(1) [],
        FLASHBOOT_MOD_EN OFFSET(12) NUMBITS(1) [],
        SYS_RESET_LENGTH OFFSET(13) NUMBITS(3) [],
        CPU_RESET_LENGTH OFFSET(16) NUMBITS(3) [],
        STG3 OFFSET(19) NUMBITS(3) [],
        STG2 OFFSET(22) NUMBITS(3) [],
        STG1 OFFSET(25) NUMBITS(3) [],
        STG0 OFFSET(28) NUMBITS(3) [
            Off = 0,
            Interrupt = 1,
            ResetCpu = 2,
            ResetSystem = 3,
            ResetRtc = 4,
        ],
        EN OFFSET(31) NUMBITS(1) [],
    ],
    OPTION1 [
        FORCE_DOWNLOAD_BOOT OFFSET(0) NUMBITS(1) [],
    ],
];

pub struct RtcCntl {
    registers: StaticRef<RtcCntlRegisters>,
}

impl RtcCntl {
    pub const fn new(registers: StaticRef<RtcCntlRegisters>) -> Self {
        RtcCntl { registers }
    }

    /// Raw reset cause of the CPU.
    pub fn reset_cause(&self) -> u32 {
        self.registers
            .reset_state
            .read(RESET_STATE::RESET_CAUSE_PROCPU)
    }

    /// Reads retention register `index`. Out of range indices read as 0.
    pub fn store(&self, index: usize) -> u32 {
        match index {
            0..=3 => self.registers.store_lo[index].get(),
            4..=7 => self.registers.store_hi[index - 4].get(),
            _ => 0,
        }
    }

    pub fn force_download_requested(&self) -> bool {
        self.registers
            .option1
            .is_set(OPTION1::FORCE_DOWNLOAD_BOOT)
    }

    pub fn clear_force_download(&self) {
        self.registers
            .option1
            .modify(OPTION1::FORCE_DOWNLOAD_BOOT::CLEAR);
    }

    fn enable_wdt_access(&self) {
        self.registers.wdtwprotect.set(WDT_WKEY);
    }

    fn disable_wdt_access(&self) {
        self.registers.wdtwprotect.set(0);
    }

    /// Arms the RTC watchdog in flash boot mode: stage 0 resets the system
    /// after `timeout_cycles` slow clock cycles unless the application
    /// disables it.
    pub fn arm_flash_boot_watchdog(&self, timeout_cycles: u32) {
        self.enable_wdt_access();
        self.registers.wdtconfig1.set(timeout_cycles);
        self.registers.wdtconfig0.write(
            WDTCONFIG0::EN::SET
                + WDTCONFIG0::FLASHBOOT_MOD_EN::SET
                + WDTCONFIG0::STG0::ResetSystem
                + WDTCONFIG0::SYS_RESET_LENGTH.val(7)
                + WDTCONFIG0::CPU_RESET_LENGTH.val(7)
                + WDTCONFIG0::CHIP_RESET_EN::SET,
        );
        self.registers.wdtfeed.set(1 << 31);
        self.disable_wdt_access();
    }

    /// Requests a digital system reset. Returns only on the host.
    pub fn software_system_reset(&self) {
        self.registers.options0.modify(OPTIONS0::SW_SYS_RST::SET);
    }
}
