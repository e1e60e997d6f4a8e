// Licensed under the Apache-2.0 license

use core::fmt;

/// Formats a word as 8 lowercase hex digits.
pub struct HexWord(pub u32);

impl fmt::Display for HexWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Formats a byte slice as contiguous lowercase hex digits.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_format() {
        assert_eq!(format!("0x{}", HexWord(0x403c_e000)), "0x403ce000");
        assert_eq!(format!("{}", HexWord(0x1a)), "0000001a");
        assert_eq!(format!("{}", HexBytes(&[0xde, 0xad, 0x01])), "dead01");
    }
}
