// Licensed under the Apache-2.0 license

//! eFuse block 0 decoding.

use crate::fuse_layout::{extract_fuse_value, Bits, FuseLayout};
use bitfield::bitfield;
use romtime::RomResult;

pub const BLOCK0_WORDS: usize = 6;
pub const KEY_PURPOSE_COUNT: usize = 6;

/// Location of one field inside block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfuseField {
    pub name: &'static str,
    pub bit_offset: usize,
    pub layout: FuseLayout,
}

impl EfuseField {
    const fn single(name: &'static str, bit_offset: usize, bit_count: usize) -> Self {
        EfuseField {
            name,
            bit_offset,
            layout: FuseLayout::Single(Bits::new(bit_count)),
        }
    }

    const fn flag(name: &'static str, bit_offset: usize) -> Self {
        Self::single(name, bit_offset, 1)
    }

    const fn one_hot(name: &'static str, bit_offset: usize, bit_count: usize) -> Self {
        EfuseField {
            name,
            bit_offset,
            layout: FuseLayout::OneHot(Bits::new(bit_count)),
        }
    }
}

pub const WR_DIS: EfuseField = EfuseField::single("WR_DIS", 0, 32);
pub const RD_DIS: EfuseField = EfuseField::single("RD_DIS", 32, 7);
pub const DIS_RTC_RAM_BOOT: EfuseField = EfuseField::flag("DIS_RTC_RAM_BOOT", 39);
pub const DIS_ICACHE: EfuseField = EfuseField::flag("DIS_ICACHE", 40);
pub const DIS_USB_JTAG: EfuseField = EfuseField::flag("DIS_USB_JTAG", 41);
pub const DIS_DOWNLOAD_ICACHE: EfuseField = EfuseField::flag("DIS_DOWNLOAD_ICACHE", 42);
pub const DIS_USB_SERIAL_JTAG: EfuseField = EfuseField::flag("DIS_USB_SERIAL_JTAG", 43);
pub const DIS_FORCE_DOWNLOAD: EfuseField = EfuseField::flag("DIS_FORCE_DOWNLOAD", 44);
pub const SOFT_DIS_JTAG: EfuseField = EfuseField::one_hot("SOFT_DIS_JTAG", 48, 3);
pub const DIS_PAD_JTAG: EfuseField = EfuseField::flag("DIS_PAD_JTAG", 51);
pub const DIS_DOWNLOAD_MANUAL_ENCRYPT: EfuseField =
    EfuseField::flag("DIS_DOWNLOAD_MANUAL_ENCRYPT", 52);
pub const WDT_DELAY_SEL: EfuseField = EfuseField::single("WDT_DELAY_SEL", 80, 2);
pub const SPI_BOOT_CRYPT_CNT: EfuseField = EfuseField::one_hot("SPI_BOOT_CRYPT_CNT", 82, 3);
pub const SECURE_BOOT_KEY_REVOKE0: EfuseField = EfuseField::flag("SECURE_BOOT_KEY_REVOKE0", 85);
pub const SECURE_BOOT_KEY_REVOKE1: EfuseField = EfuseField::flag("SECURE_BOOT_KEY_REVOKE1", 86);
pub const SECURE_BOOT_KEY_REVOKE2: EfuseField = EfuseField::flag("SECURE_BOOT_KEY_REVOKE2", 87);
pub const KEY_PURPOSE: [EfuseField; KEY_PURPOSE_COUNT] = [
    EfuseField::single("KEY_PURPOSE_0", 88, 4),
    EfuseField::single("KEY_PURPOSE_1", 92, 4),
    EfuseField::single("KEY_PURPOSE_2", 96, 4),
    EfuseField::single("KEY_PURPOSE_3", 100, 4),
    EfuseField::single("KEY_PURPOSE_4", 104, 4),
    EfuseField::single("KEY_PURPOSE_5", 108, 4),
];
pub const SECURE_BOOT_EN: EfuseField = EfuseField::flag("SECURE_BOOT_EN", 116);
pub const SECURE_BOOT_AGGRESSIVE_REVOKE: EfuseField =
    EfuseField::flag("SECURE_BOOT_AGGRESSIVE_REVOKE", 117);
pub const FLASH_TPUW: EfuseField = EfuseField::single("FLASH_TPUW", 124, 4);
pub const DIS_DOWNLOAD_MODE: EfuseField = EfuseField::flag("DIS_DOWNLOAD_MODE", 128);
pub const DIS_USB_SERIAL_JTAG_ROM_PRINT: EfuseField =
    EfuseField::flag("DIS_USB_SERIAL_JTAG_ROM_PRINT", 130);
pub const DIS_USB_SERIAL_JTAG_DOWNLOAD_MODE: EfuseField =
    EfuseField::flag("DIS_USB_SERIAL_JTAG_DOWNLOAD_MODE", 132);
pub const ENABLE_SECURITY_DOWNLOAD: EfuseField =
    EfuseField::flag("ENABLE_SECURITY_DOWNLOAD", 133);
pub const UART_PRINT_CONTROL: EfuseField = EfuseField::single("UART_PRINT_CONTROL", 134, 2);
pub const SECURE_VERSION: EfuseField = EfuseField::single("SECURE_VERSION", 142, 16);

/// When the ROM may print on UART0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartPrintControl {
    Enabled,
    EnabledWhenGpio8Low,
    EnabledWhenGpio8High,
    Disabled,
}

impl UartPrintControl {
    pub fn from_raw(raw: u32) -> Self {
        match raw & 0b11 {
            0 => UartPrintControl::Enabled,
            1 => UartPrintControl::EnabledWhenGpio8Low,
            2 => UartPrintControl::EnabledWhenGpio8High,
            _ => UartPrintControl::Disabled,
        }
    }

    pub fn allows(&self, gpio8: bool) -> bool {
        match self {
            UartPrintControl::Enabled => true,
            UartPrintControl::EnabledWhenGpio8Low => !gpio8,
            UartPrintControl::EnabledWhenGpio8High => gpio8,
            UartPrintControl::Disabled => false,
        }
    }
}

bitfield! {
    /// Security flags word reported by GET_SECURITY_INFO.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecurityFlags(u32);
    impl Debug;
    pub secure_boot_en, set_secure_boot_en: 0;
    pub secure_boot_aggressive_revoke, set_secure_boot_aggressive_revoke: 1;
    pub secure_download_enable, set_secure_download_enable: 2;
    pub key_revoke0, set_key_revoke0: 3;
    pub key_revoke1, set_key_revoke1: 4;
    pub key_revoke2, set_key_revoke2: 5;
    pub soft_dis_jtag, set_soft_dis_jtag: 6;
    pub hard_dis_jtag, set_hard_dis_jtag: 7;
    pub dis_usb, set_dis_usb: 8;
    pub dis_download_dcache, set_dis_download_dcache: 9;
    pub dis_download_icache, set_dis_download_icache: 10;
}

impl SecurityFlags {
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Snapshot of eFuse block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Efuses {
    words: [u32; BLOCK0_WORDS],
}

impl Efuses {
    pub const fn new(words: [u32; BLOCK0_WORDS]) -> Self {
        Efuses { words }
    }

    pub fn words(&self) -> &[u32; BLOCK0_WORDS] {
        &self.words
    }

    pub fn read(&self, field: &EfuseField) -> RomResult<u32> {
        extract_fuse_value(&self.words, field.bit_offset, field.layout)
    }

    // every field in the table above fits inside block 0
    fn value(&self, field: &EfuseField) -> u32 {
        self.read(field).unwrap_or(0)
    }

    fn is_set(&self, field: &EfuseField) -> bool {
        self.value(field) != 0
    }

    pub fn dis_rtc_ram_boot(&self) -> bool {
        self.is_set(&DIS_RTC_RAM_BOOT)
    }

    pub fn dis_usb_serial_jtag(&self) -> bool {
        self.is_set(&DIS_USB_SERIAL_JTAG)
    }

    pub fn dis_force_download(&self) -> bool {
        self.is_set(&DIS_FORCE_DOWNLOAD)
    }

    pub fn dis_download_mode(&self) -> bool {
        self.is_set(&DIS_DOWNLOAD_MODE)
    }

    pub fn dis_usb_serial_jtag_rom_print(&self) -> bool {
        self.is_set(&DIS_USB_SERIAL_JTAG_ROM_PRINT)
    }

    pub fn dis_usb_serial_jtag_download_mode(&self) -> bool {
        self.is_set(&DIS_USB_SERIAL_JTAG_DOWNLOAD_MODE)
    }

    pub fn enable_security_download(&self) -> bool {
        self.is_set(&ENABLE_SECURITY_DOWNLOAD)
    }

    pub fn secure_boot_enabled(&self) -> bool {
        self.is_set(&SECURE_BOOT_EN)
    }

    /// Flash encryption is on while an odd number of crypt count bits are
    /// burned.
    pub fn flash_encryption_enabled(&self) -> bool {
        self.spi_boot_crypt_cnt() % 2 == 1
    }

    pub fn spi_boot_crypt_cnt(&self) -> u32 {
        self.value(&SPI_BOOT_CRYPT_CNT)
    }

    pub fn uart_print_control(&self) -> UartPrintControl {
        UartPrintControl::from_raw(self.value(&UART_PRINT_CONTROL))
    }

    pub fn secure_version(&self) -> u32 {
        self.value(&SECURE_VERSION)
    }

    pub fn key_purposes(&self) -> [u8; KEY_PURPOSE_COUNT] {
        let mut purposes = [0u8; KEY_PURPOSE_COUNT];
        for (purpose, field) in purposes.iter_mut().zip(KEY_PURPOSE.iter()) {
            *purpose = self.value(field) as u8;
        }
        purposes
    }

    /// Flash power-up wait before the first read on power-on resets.
    pub fn flash_tpuw_ms(&self) -> u32 {
        let tpuw = self.value(&FLASH_TPUW);
        if tpuw < 15 {
            tpuw
        } else {
            tpuw * 2
        }
    }

    /// RTC watchdog timeout for flash boot, in slow clock cycles.
    pub fn flash_boot_watchdog_cycles(&self) -> u32 {
        40_000 << self.value(&WDT_DELAY_SEL)
    }

    pub fn security_flags(&self) -> SecurityFlags {
        let mut flags = SecurityFlags(0);
        flags.set_secure_boot_en(self.secure_boot_enabled());
        flags.set_secure_boot_aggressive_revoke(self.is_set(&SECURE_BOOT_AGGRESSIVE_REVOKE));
        flags.set_secure_download_enable(self.enable_security_download());
        flags.set_key_revoke0(self.is_set(&SECURE_BOOT_KEY_REVOKE0));
        flags.set_key_revoke1(self.is_set(&SECURE_BOOT_KEY_REVOKE1));
        flags.set_key_revoke2(self.is_set(&SECURE_BOOT_KEY_REVOKE2));
        flags.set_soft_dis_jtag(self.value(&SOFT_DIS_JTAG) % 2 == 1);
        flags.set_hard_dis_jtag(self.is_set(&DIS_PAD_JTAG));
        flags.set_dis_usb(self.is_set(&DIS_USB_JTAG));
        flags.set_dis_download_icache(self.is_set(&DIS_DOWNLOAD_ICACHE));
        flags
    }
}

/// Builds a block 0 image with the given fields burned; used by tests and
/// the hardware model.
pub fn burn(words: &mut [u32; BLOCK0_WORDS], field: &EfuseField, value: u32) {
    let bits = field.layout.bits();
    let raw = match field.layout {
        FuseLayout::Single(_) => value,
        FuseLayout::OneHot(_) if value >= 32 => u32::MAX,
        FuseLayout::OneHot(_) => (1u32 << value) - 1,
    };
    for i in 0..bits {
        let bit = field.bit_offset + i;
        if bit / 32 >= BLOCK0_WORDS {
            break;
        }
        if (raw >> i) & 1 == 1 {
            words[bit / 32] |= 1 << (bit % 32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burned(fields: &[(&EfuseField, u32)]) -> Efuses {
        let mut words = [0u32; BLOCK0_WORDS];
        for (field, value) in fields {
            burn(&mut words, field, *value);
        }
        Efuses::new(words)
    }

    #[test]
    fn test_blank_chip() {
        let efuses = Efuses::default();
        assert!(!efuses.dis_download_mode());
        assert!(!efuses.secure_boot_enabled());
        assert!(!efuses.flash_encryption_enabled());
        assert_eq!(efuses.uart_print_control(), UartPrintControl::Enabled);
        assert_eq!(efuses.flash_tpuw_ms(), 0);
        assert_eq!(efuses.security_flags(), SecurityFlags(0));
    }

    #[test]
    fn test_flag_positions() {
        let efuses = burned(&[(&DIS_DOWNLOAD_MODE, 1)]);
        assert_eq!(efuses.words()[4], 1);
        assert!(efuses.dis_download_mode());
        let efuses = burned(&[(&DIS_FORCE_DOWNLOAD, 1), (&DIS_RTC_RAM_BOOT, 1)]);
        assert_eq!(efuses.words()[1], (1 << 12) | (1 << 7));
        assert!(efuses.dis_force_download());
        assert!(efuses.dis_rtc_ram_boot());
    }

    #[test]
    fn test_crypt_cnt_parity() {
        for (count, enabled) in [(0, false), (1, true), (2, false), (3, true)] {
            let efuses = burned(&[(&SPI_BOOT_CRYPT_CNT, count)]);
            assert_eq!(efuses.spi_boot_crypt_cnt(), count);
            assert_eq!(efuses.flash_encryption_enabled(), enabled);
        }
    }

    #[test]
    fn test_flash_tpuw() {
        assert_eq!(burned(&[(&FLASH_TPUW, 3)]).flash_tpuw_ms(), 3);
        assert_eq!(burned(&[(&FLASH_TPUW, 14)]).flash_tpuw_ms(), 14);
        assert_eq!(burned(&[(&FLASH_TPUW, 15)]).flash_tpuw_ms(), 30);
    }

    #[test]
    fn test_print_control_gpio8() {
        let efuses = burned(&[(&UART_PRINT_CONTROL, 1)]);
        assert_eq!(
            efuses.uart_print_control(),
            UartPrintControl::EnabledWhenGpio8Low
        );
        assert!(efuses.uart_print_control().allows(false));
        assert!(!efuses.uart_print_control().allows(true));
        assert!(UartPrintControl::EnabledWhenGpio8High.allows(true));
        assert!(!UartPrintControl::Disabled.allows(false));
    }

    #[test]
    fn test_key_purposes_and_security_flags() {
        let efuses = burned(&[
            (&KEY_PURPOSE[0], 9),
            (&KEY_PURPOSE[5], 4),
            (&SECURE_BOOT_EN, 1),
            (&ENABLE_SECURITY_DOWNLOAD, 1),
            (&SOFT_DIS_JTAG, 1),
            (&SECURE_VERSION, 0x1234),
        ]);
        assert_eq!(efuses.key_purposes(), [9, 0, 0, 0, 0, 4]);
        let flags = efuses.security_flags();
        assert!(flags.secure_boot_en());
        assert!(flags.secure_download_enable());
        assert!(flags.soft_dis_jtag());
        assert!(!flags.hard_dis_jtag());
        assert_eq!(flags.0, 0b100_0101);
        assert_eq!(efuses.secure_version(), 0x1234);
    }

    #[test]
    fn test_watchdog_timeout_select() {
        assert_eq!(Efuses::default().flash_boot_watchdog_cycles(), 40_000);
        assert_eq!(
            burned(&[(&WDT_DELAY_SEL, 3)]).flash_boot_watchdog_cycles(),
            320_000
        );
    }
}
