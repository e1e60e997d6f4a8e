// Licensed under the Apache-2.0 license

const GPIO2_BIT: u32 = 1 << 1;
const GPIO8_BIT: u32 = 1 << 2;
const GPIO9_BIT: u32 = 1 << 3;

/// Strapping pin levels latched at reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Straps {
    raw: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    SpiBoot,
    /// UART0, UART1 and USB-Serial-JTAG are all polled.
    JointDownload,
    Invalid,
}

impl BootMode {
    pub fn name(&self) -> &'static str {
        match self {
            BootMode::SpiBoot => "SPI_FAST_FLASH_BOOT",
            BootMode::JointDownload => "DOWNLOAD(USB/UART0/1)",
            BootMode::Invalid => "invalid",
        }
    }
}

impl Straps {
    pub const fn new(raw: u32) -> Self {
        Straps { raw }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn gpio2(&self) -> bool {
        self.raw & GPIO2_BIT != 0
    }

    pub fn gpio8(&self) -> bool {
        self.raw & GPIO8_BIT != 0
    }

    pub fn gpio9(&self) -> bool {
        self.raw & GPIO9_BIT != 0
    }

    pub fn boot_mode(&self) -> BootMode {
        match (self.gpio9(), self.gpio8()) {
            (true, _) => BootMode::SpiBoot,
            (false, true) => BootMode::JointDownload,
            (false, false) => BootMode::Invalid,
        }
    }
}
