// Licensed under the Apache-2.0 license

//! Memory map and flash configuration shared by the boot ROM, its linker
//! script generator and the host-side chip model.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod flash;

/// A contiguous address range.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u32,
    pub size: u32,
}

impl MemoryRegion {
    pub const fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    /// One past the last address of the region.
    pub const fn end(&self) -> u64 {
        self.start as u64 + self.size as u64
    }

    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && (addr as u64) < self.end()
    }

    /// True when every byte of `[addr, addr + len)` lies inside the region.
    /// An empty range is contained when `addr` itself is.
    pub const fn contains_range(&self, addr: u32, len: u32) -> bool {
        addr >= self.start && addr as u64 + len as u64 <= self.end() && self.contains(addr)
    }

    pub const fn overlaps(&self, addr: u32, len: u32) -> bool {
        let end = addr as u64 + len as u64;
        len != 0 && (addr as u64) < self.end() && end > self.start as u64
    }
}

/// Address map of the chip as seen by the boot ROM.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct MemoryMap {
    /// Mask ROM holding this code.
    pub rom: MemoryRegion,
    /// Internal SRAM, instruction bus view.
    pub iram: MemoryRegion,
    /// Internal SRAM, data bus view.
    pub dram: MemoryRegion,
    /// RTC fast memory, retained across deep sleep.
    pub rtc_fast: MemoryRegion,
    /// Flash mapped through the instruction cache.
    pub irom: MemoryRegion,
    /// Flash mapped through the data cache.
    pub drom: MemoryRegion,
    /// DRAM window owned by the ROM itself (.data, .bss including the
    /// download mode buffers, stack).
    pub rom_data: MemoryRegion,
    pub rom_stack_size: u32,
}

impl MemoryMap {
    /// True when the range can be written by the ROM: it sits in IRAM, DRAM or
    /// RTC fast memory and stays clear of the ROM's own data window.
    pub fn is_loadable(&self, addr: u32, len: u32) -> bool {
        let in_ram = self.iram.contains_range(addr, len)
            || self.dram.contains_range(addr, len)
            || self.rtc_fast.contains_range(addr, len);
        in_ram && !self.overlaps_rom_data(addr, len)
    }

    pub fn overlaps_rom_data(&self, addr: u32, len: u32) -> bool {
        self.rom_data.overlaps(addr, len)
            || self
                .dram_to_iram(self.rom_data.start)
                .is_some_and(|iram| MemoryRegion::new(iram, self.rom_data.size).overlaps(addr, len))
    }

    /// True when the CPU can fetch instructions from `addr` without the cache.
    pub fn is_executable(&self, addr: u32) -> bool {
        self.iram.contains(addr) || self.rtc_fast.contains(addr)
    }

    /// IRAM and DRAM alias the same SRAM; the DRAM view ends where the IRAM
    /// view ends.
    pub fn dram_to_iram(&self, addr: u32) -> Option<u32> {
        if !self.dram.contains(addr) {
            return None;
        }
        let from_end = self.dram.end() - addr as u64;
        let iram = self.iram.end().checked_sub(from_end)?;
        let iram = u32::try_from(iram).ok()?;
        self.iram.contains(iram).then_some(iram)
    }
}

pub const ESP32C3_MEMORY_MAP: MemoryMap = MemoryMap {
    rom: MemoryRegion::new(0x4000_0000, 384 * 1024),
    iram: MemoryRegion::new(0x4037_c000, 400 * 1024),
    dram: MemoryRegion::new(0x3fc8_0000, 384 * 1024),
    rtc_fast: MemoryRegion::new(0x5000_0000, 8 * 1024),
    irom: MemoryRegion::new(0x4200_0000, 8 * 1024 * 1024),
    drom: MemoryRegion::new(0x3c00_0000, 8 * 1024 * 1024),
    rom_data: MemoryRegion::new(0x3fcc_0000, 128 * 1024),
    rom_stack_size: 0x4000,
};

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: MemoryMap = ESP32C3_MEMORY_MAP;

    #[test]
    fn test_region_bounds() {
        let r = MemoryRegion::new(0x1000, 0x100);
        assert!(r.contains(0x1000));
        assert!(r.contains(0x10ff));
        assert!(!r.contains(0x1100));
        assert!(r.contains_range(0x1000, 0x100));
        assert!(!r.contains_range(0x1001, 0x100));
        assert!(!r.contains_range(0x0fff, 1));
        assert!(r.overlaps(0x0fff, 2));
        assert!(!r.overlaps(0x1100, 4));
        assert!(!r.overlaps(0x1000, 0));
    }

    #[test]
    fn test_loadable_ranges() {
        assert!(MAP.is_loadable(0x3fc8_0000, 0x100));
        assert!(MAP.is_loadable(0x4038_0000, 0x1000));
        assert!(MAP.is_loadable(0x5000_0000, 0x2000));
        // flash-mapped segments are never loaded by the ROM
        assert!(!MAP.is_loadable(0x4200_0020, 0x10));
        assert!(!MAP.is_loadable(0x3c00_0020, 0x10));
        // ROM data window, in both views
        assert!(!MAP.is_loadable(0x3fcd_f000, 0x10));
        assert!(!MAP.is_loadable(0x403d_f000, 0x10));
        assert!(!MAP.is_loadable(0x3fcb_fff0, 0x20));
        assert!(MAP.is_loadable(0x3fcb_f000, 0x1000));
        // straddles the end of RTC fast memory
        assert!(!MAP.is_loadable(0x5000_1ff0, 0x20));
    }

    #[test]
    fn test_dram_iram_alias() {
        assert_eq!(MAP.dram_to_iram(0x3fcd_e000), Some(0x403d_e000));
        assert_eq!(MAP.dram_to_iram(0x4037_c000), None);
        assert!(MAP.is_executable(0x403c_e000));
        assert!(MAP.is_executable(0x5000_0010));
        assert!(!MAP.is_executable(0x3fc8_0000));
    }
}
