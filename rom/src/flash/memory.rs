// Licensed under the Apache-2.0 license

//! Simple NOR flash implementation backed by memory. Useful for testing and
//! for the hardware model.

use crate::hil::{FlashDrvError, FlashStorage};
use core::ops::Range;
use core::{cell::Cell, result::Result};

/// Value of an erased flash byte.
pub const ERASED: u8 = 0xff;

pub struct SimpleFlash<'a> {
    memory: Cell<&'a mut [u8]>,
}

impl<'a> SimpleFlash<'a> {
    pub fn new(memory: &'a mut [u8]) -> Self {
        SimpleFlash {
            memory: Cell::new(memory),
        }
    }

    fn with_range<T>(
        &self,
        address: usize,
        length: usize,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Result<T, FlashDrvError> {
        let mem = self.memory.take();
        let result = match range(address, length).and_then(|r| mem.get_mut(r)) {
            Some(slice) => Ok(f(slice)),
            None => Err(FlashDrvError::INVAL),
        };
        self.memory.set(mem);
        result
    }
}

fn range(address: usize, length: usize) -> Option<Range<usize>> {
    Some(address..address.checked_add(length)?)
}

impl FlashStorage for SimpleFlash<'_> {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        self.with_range(address, buffer.len(), |slice| {
            buffer.copy_from_slice(slice)
        })
    }

    /// Programming can only clear bits, as on a NOR part.
    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        self.with_range(address, buffer.len(), |slice| {
            for (dst, src) in slice.iter_mut().zip(buffer) {
                *dst &= *src;
            }
        })
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        self.with_range(address, length, |slice| slice.fill(ERASED))
    }

    fn capacity(&self) -> usize {
        let mem = self.memory.take();
        let len = mem.len();
        self.memory.set(mem);
        len
    }
}
