// Licensed under the Apache-2.0 license

use core::num::NonZero;
use romtime::{RomError, RomResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bits(pub NonZero<usize>);

impl Bits {
    pub const fn new(bits: usize) -> Self {
        match NonZero::new(bits) {
            Some(bits) => Bits(bits),
            None => panic!("fuse field cannot be empty"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FuseLayout {
    /// Values are stored literally
    Single(Bits),
    /// Value is the number of bits set,
    /// e.g., 0b110111 -> 5
    OneHot(Bits),
}

impl FuseLayout {
    pub fn bits(&self) -> usize {
        match self {
            FuseLayout::Single(Bits(bits)) | FuseLayout::OneHot(Bits(bits)) => bits.get(),
        }
    }
}

/// Collapses a raw field value according to its layout.
pub fn extract_single_fuse_value(layout: FuseLayout, raw_value: u32) -> RomResult<u32> {
    match layout {
        FuseLayout::Single(Bits(bits)) if bits.get() > 32 => Err(RomError::EFUSE_LAYOUT_TOO_LARGE),
        FuseLayout::Single(Bits(bits)) if bits.get() == 32 => Ok(raw_value),
        FuseLayout::Single(Bits(bits)) => Ok(raw_value & ((1 << bits.get()) - 1)),
        FuseLayout::OneHot(Bits(bits)) if bits.get() > 32 => Err(RomError::EFUSE_LAYOUT_TOO_LARGE),
        FuseLayout::OneHot(Bits(bits)) if bits.get() == 32 => Ok(raw_value.count_ones()),
        FuseLayout::OneHot(Bits(bits)) => Ok((raw_value & ((1 << bits.get()) - 1)).count_ones()),
    }
}

/// Extract `bits` bits from `raw_value` starting at bit `offset`. A field
/// may straddle two adjacent words.
pub fn extract_bits(raw_value: &[u32], offset: usize, bits: usize) -> RomResult<u32> {
    if bits > 32 || offset + bits > raw_value.len() * 32 {
        return Err(RomError::EFUSE_LAYOUT_TOO_LARGE);
    }
    if bits == 0 {
        return Ok(0);
    }
    // skip to the offset
    if offset >= 32 {
        return extract_bits(&raw_value[offset / 32..], offset % 32, bits);
    }

    if offset + bits <= 32 {
        // single u32
        if bits == 32 {
            Ok(raw_value[0])
        } else {
            Ok((raw_value[0] >> offset) & ((1 << bits) - 1))
        }
    } else {
        // split across two adjacent u32s
        let bits_from_first = 32 - offset;
        let bits_from_second = bits - bits_from_first;

        let lower = raw_value[0] >> offset;
        let upper = raw_value[1] & ((1 << bits_from_second) - 1);

        Ok(lower | (upper << bits_from_first))
    }
}

/// Reads a field at `offset` in `words` and collapses it per `layout`.
pub fn extract_fuse_value(words: &[u32], offset: usize, layout: FuseLayout) -> RomResult<u32> {
    let raw = extract_bits(words, offset, layout.bits())?;
    extract_single_fuse_value(layout, raw)
}
