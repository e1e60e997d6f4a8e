// Licensed under the Apache-2.0 license

use num_enum::TryFromPrimitive;

/// CPU reset cause as latched by the RTC controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum ResetReason {
    /// Vbat power on reset
    PowerOn = 1,
    /// Software reset of the digital core
    RtcSwSys = 3,
    /// Deep sleep wakeup
    DeepSleep = 5,
    /// Timer group 0 watchdog, digital core
    Tg0WdtSys = 7,
    /// Timer group 1 watchdog, digital core
    Tg1WdtSys = 8,
    /// RTC watchdog, digital core
    RtcWdtSys = 9,
    Intrusion = 10,
    /// Timer group 0 watchdog, CPU only
    Tg0WdtCpu = 11,
    /// Software reset of the CPU
    RtcSwCpu = 12,
    /// RTC watchdog, CPU only
    RtcWdtCpu = 13,
    /// Brown out, reset by the RTC watchdog
    RtcWdtBrownOut = 15,
    /// RTC watchdog, RTC domain
    RtcWdtRtc = 16,
    Tg1WdtCpu = 17,
    SuperWdt = 18,
    GlitchRtc = 19,
    Efuse = 20,
    UsbUartChip = 21,
    UsbJtagChip = 22,
    PowerGlitch = 23,
}

impl ResetReason {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::try_from(raw).ok()
    }

    /// Name printed in the boot banner.
    pub fn name(&self) -> &'static str {
        match self {
            ResetReason::PowerOn => "POWERON",
            ResetReason::RtcSwSys => "RTC_SW_SYS_RST",
            ResetReason::DeepSleep => "DSLEEP",
            ResetReason::Tg0WdtSys => "TG0WDT_SYS_RST",
            ResetReason::Tg1WdtSys => "TG1WDT_SYS_RST",
            ResetReason::RtcWdtSys => "RTCWDT_SYS_RST",
            ResetReason::Intrusion => "INTRUSION_RST",
            ResetReason::Tg0WdtCpu => "TG0WDT_CPU_RST",
            ResetReason::RtcSwCpu => "RTC_SW_CPU_RST",
            ResetReason::RtcWdtCpu => "RTCWDT_CPU_RST",
            ResetReason::RtcWdtBrownOut => "RTCWDT_BROWN_OUT_RST",
            ResetReason::RtcWdtRtc => "RTCWDT_RTC_RST",
            ResetReason::Tg1WdtCpu => "TG1WDT_CPU_RST",
            ResetReason::SuperWdt => "SUPER_WDT_RST",
            ResetReason::GlitchRtc => "GLITCH_RTC_RST",
            ResetReason::Efuse => "EFUSE_RST",
            ResetReason::UsbUartChip => "USB_UART_CHIP_RESET",
            ResetReason::UsbJtagChip => "USB_JTAG_CHIP_RESET",
            ResetReason::PowerGlitch => "POWER_GLITCH_RESET",
        }
    }

    /// Resets after which the flash may still be powering up.
    pub fn is_power_on(&self) -> bool {
        matches!(
            self,
            ResetReason::PowerOn | ResetReason::RtcWdtBrownOut | ResetReason::PowerGlitch
        )
    }
}
