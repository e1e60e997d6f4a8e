// Licensed under the Apache-2.0 license

//! Runtime support shared by the boot ROM: console printing, error codes and
//! drivers for the registers the ROM touches.

#![cfg_attr(target_arch = "riscv32", no_std)]

mod error;
pub use error::*;
mod hex;
pub use hex::*;
mod io;
pub use io::*;
mod static_ref;
pub use static_ref::StaticRef;

pub mod efuse;
pub mod gpio;
pub mod rtc_cntl;
pub mod spi_mem;
pub mod uart;
pub mod usb_serial_jtag;

pub use efuse::EfuseRegs;
pub use gpio::GpioStrap;
pub use rtc_cntl::RtcCntl;
pub use spi_mem::SpiMem;
pub use uart::Uart;
pub use usb_serial_jtag::UsbSerialJtag;
