// Licensed under the Apache-2.0 license

use c3_rom_common::hil::{SerialError, SerialPort};
use std::collections::VecDeque;

pub const DEFAULT_BAUD: u32 = 115_200;

/// One end of a serial link whose other end is a test or the xtask. Bytes
/// queued with [`HostSerial::send`] are what the ROM receives; once they run
/// out the host counts as disconnected.
#[derive(Debug)]
pub struct HostSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
    baud: u32,
}

impl Default for HostSerial {
    fn default() -> Self {
        HostSerial {
            input: VecDeque::new(),
            output: Vec::new(),
            baud: DEFAULT_BAUD,
        }
    }
}

impl HostSerial {
    pub fn send(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Bytes the ROM has not read yet.
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub(crate) fn reset(&mut self) {
        self.baud = DEFAULT_BAUD;
    }
}

impl SerialPort for HostSerial {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        self.input.pop_front().map(Some).ok_or(SerialError::Closed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn set_baud_rate(&mut self, baud: u32) {
        log::debug!("baud rate {} -> {}", self.baud, baud);
        self.baud = baud;
    }
}
