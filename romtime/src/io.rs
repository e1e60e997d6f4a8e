// Licensed under the Apache-2.0 license

//! ROM console.
//!
//! Everything printed through [`print!`](crate::print) and
//! [`println!`](crate::println) goes to a single [`ConsoleSink`], which fans
//! out to UART0 and USB-Serial-JTAG according to the current
//! [`PrintTargets`]. On the host the sink is a per-thread buffer.

use core::fmt;

/// Which console channels currently receive ROM output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrintTargets {
    pub uart: bool,
    pub usb: bool,
}

impl PrintTargets {
    pub const ALL: PrintTargets = PrintTargets {
        uart: true,
        usb: true,
    };
    pub const NONE: PrintTargets = PrintTargets {
        uart: false,
        usb: false,
    };

    pub fn any(&self) -> bool {
        self.uart || self.usb
    }
}

pub trait ConsoleSink {
    fn write_str(&mut self, targets: PrintTargets, s: &str);
}

/// `core::fmt::Write` adapter used by the print macros.
pub struct Printer;

impl fmt::Write for Printer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        imp::write_str(s);
        Ok(())
    }
}

pub fn set_print_targets(targets: PrintTargets) {
    imp::set_print_targets(targets)
}

pub fn print_targets() -> PrintTargets {
    imp::print_targets()
}

#[cfg(target_arch = "riscv32")]
pub use imp::set_printer;

#[cfg(target_arch = "riscv32")]
mod imp {
    use super::{ConsoleSink, PrintTargets};
    use core::sync::atomic::{AtomicBool, Ordering};

    static PRINT_UART: AtomicBool = AtomicBool::new(true);
    static PRINT_USB: AtomicBool = AtomicBool::new(true);
    static mut PRINTER: Option<&'static mut dyn ConsoleSink> = None;

    /// Install the console sink.
    ///
    /// SAFETY: the ROM is single threaded and the sink must not be used by
    /// anything else once installed.
    pub fn set_printer(printer: &'static mut dyn ConsoleSink) {
        unsafe {
            PRINTER = Some(printer);
        }
    }

    pub(super) fn write_str(s: &str) {
        let targets = print_targets();
        if !targets.any() {
            return;
        }
        #[allow(static_mut_refs)]
        if let Some(printer) = unsafe { PRINTER.as_mut() } {
            printer.write_str(targets, s);
        }
    }

    pub(super) fn set_print_targets(targets: PrintTargets) {
        PRINT_UART.store(targets.uart, Ordering::Relaxed);
        PRINT_USB.store(targets.usb, Ordering::Relaxed);
    }

    pub(super) fn print_targets() -> PrintTargets {
        PrintTargets {
            uart: PRINT_UART.load(Ordering::Relaxed),
            usb: PRINT_USB.load(Ordering::Relaxed),
        }
    }
}

#[cfg(not(target_arch = "riscv32"))]
mod imp {
    use super::PrintTargets;
    use std::cell::RefCell;

    pub(super) struct HostConsole {
        pub targets: PrintTargets,
        pub capture: Option<String>,
        pub echo: bool,
    }

    thread_local! {
        pub(super) static CONSOLE: RefCell<HostConsole> = const {
            RefCell::new(HostConsole {
                targets: PrintTargets::ALL,
                capture: None,
                echo: false,
            })
        };
    }

    pub(super) fn write_str(s: &str) {
        CONSOLE.with(|c| {
            let mut c = c.borrow_mut();
            if !c.targets.any() {
                return;
            }
            if c.echo {
                std::print!("{s}");
            }
            if let Some(buf) = c.capture.as_mut() {
                buf.push_str(s);
            }
        })
    }

    pub(super) fn set_print_targets(targets: PrintTargets) {
        CONSOLE.with(|c| c.borrow_mut().targets = targets)
    }

    pub(super) fn print_targets() -> PrintTargets {
        CONSOLE.with(|c| c.borrow().targets)
    }
}

/// Host-side capture of the ROM console for the current thread.
#[cfg(not(target_arch = "riscv32"))]
pub mod capture {
    use super::imp::CONSOLE;
    use super::PrintTargets;

    /// Start capturing console output, discarding anything captured so far.
    /// Print targets are reset to [`PrintTargets::ALL`].
    pub fn start(echo: bool) {
        CONSOLE.with(|c| {
            let mut c = c.borrow_mut();
            c.capture = Some(String::new());
            c.echo = echo;
            c.targets = PrintTargets::ALL;
        })
    }

    /// Stop capturing and return everything printed since [`start`].
    pub fn take() -> String {
        CONSOLE.with(|c| c.borrow_mut().capture.take().unwrap_or_default())
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        let _ = write!($crate::Printer, $($arg)*);
    }};
}

#[macro_export]
macro_rules! println {
    () => {{
        let _ = write!($crate::Printer, "\r\n");
    }};
    ($($arg:tt)*) => {{
        let _ = write!($crate::Printer, $($arg)*);
        let _ = write!($crate::Printer, "\r\n");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_capture_and_gating() {
        capture::start(false);
        crate::println!("rst:0x{:x}", 1);
        set_print_targets(PrintTargets {
            uart: false,
            usb: false,
        });
        crate::println!("hidden");
        set_print_targets(PrintTargets {
            uart: false,
            usb: true,
        });
        crate::print!("usb only");
        assert_eq!(capture::take(), "rst:0x1\r\nusb only");
        // not capturing any more
        crate::println!("dropped");
        assert_eq!(capture::take(), "");
    }
}
