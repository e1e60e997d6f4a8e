// Licensed under the Apache-2.0 license

/// Geometry of the SPI NOR flash attached to the chip.
///
/// The ROM starts out with [`DEFAULT_FLASH_GEOMETRY`]; a download host may
/// replace it with `SPI_SET_PARAMS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub device_id: u32,
    pub total_size: u32,  // bytes
    pub block_size: u32,  // erase block, bytes
    pub sector_size: u32, // smallest erase unit, bytes
    pub page_size: u32,   // program page, bytes
    pub status_mask: u32,
}

impl FlashGeometry {
    /// Rounds `[offset, offset + len)` outwards to whole sectors.
    pub fn sector_span(&self, offset: u32, len: u32) -> (u32, u32) {
        let start = offset - offset % self.sector_size;
        let end = offset.saturating_add(len);
        let end = end.div_ceil(self.sector_size).saturating_mul(self.sector_size);
        (start, end - start)
    }

    pub fn contains(&self, offset: u32, len: u32) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.total_size)
    }
}

pub const DEFAULT_FLASH_GEOMETRY: FlashGeometry = FlashGeometry {
    device_id: 0,
    total_size: 4 * 1024 * 1024,
    block_size: 64 * 1024,
    sector_size: 4 * 1024,
    page_size: 256,
    status_mask: 0xffff,
};

/// Offset of the first-stage image read by flash boot.
pub const BOOT_IMAGE_OFFSET: u32 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_span_rounds_outwards() {
        let g = DEFAULT_FLASH_GEOMETRY;
        assert_eq!(g.sector_span(0, 1), (0, 0x1000));
        assert_eq!(g.sector_span(0x1000, 0x1000), (0x1000, 0x1000));
        assert_eq!(g.sector_span(0x0fff, 2), (0, 0x2000));
        assert_eq!(g.sector_span(0x2000, 0), (0x2000, 0));
    }

    #[test]
    fn test_contains_rejects_overflow() {
        let g = DEFAULT_FLASH_GEOMETRY;
        assert!(g.contains(0, g.total_size));
        assert!(!g.contains(1, g.total_size));
        assert!(!g.contains(u32::MAX, 2));
    }
}
