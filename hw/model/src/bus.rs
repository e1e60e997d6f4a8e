// Licensed under the Apache-2.0 license

use c3_config::{MemoryMap, MemoryRegion};
use c3_rom_common::hil::{BusError, SystemBus};
use std::collections::BTreeMap;

/// APB peripheral window. Reads of registers never written return 0.
pub const PERIPHERALS: MemoryRegion = MemoryRegion::new(0x6000_0000, 0x10_0000);

/// On-chip RAM and a flat register file.
pub struct ModelBus {
    ram: Vec<(MemoryRegion, Vec<u8>)>,
    registers: BTreeMap<u32, u32>,
}

impl ModelBus {
    pub fn new(map: &MemoryMap) -> Self {
        let ram = [map.iram, map.dram, map.rtc_fast]
            .into_iter()
            .map(|r| (r, vec![0u8; r.size as usize]))
            .collect();
        ModelBus {
            ram,
            registers: BTreeMap::new(),
        }
    }

    fn ram(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let (region, mem) = self
            .ram
            .iter()
            .find(|(r, _)| r.contains_range(addr, len as u32))?;
        let start = (addr - region.start) as usize;
        Some(&mem[start..start + len])
    }

    fn ram_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]> {
        let (region, mem) = self
            .ram
            .iter_mut()
            .find(|(r, _)| r.contains_range(addr, len as u32))?;
        let start = (addr - region.start) as usize;
        Some(&mut mem[start..start + len])
    }

    fn register_words(addr: u32, len: usize) -> Option<impl Iterator<Item = u32>> {
        let ok = PERIPHERALS.contains_range(addr, len as u32) && addr % 4 == 0 && len % 4 == 0;
        ok.then(|| (0..len as u32 / 4).map(move |i| addr + i * 4))
    }

    /// Copy of `[addr, addr + len)`, or `None` if the range is not backed.
    pub fn peek(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        if let Some(mem) = self.ram(addr, len) {
            return Some(mem.to_vec());
        }
        let words = Self::register_words(addr, len)?;
        Some(
            words
                .flat_map(|a| self.register(a).to_le_bytes())
                .collect(),
        )
    }

    pub fn register(&self, addr: u32) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }
}

impl SystemBus for ModelBus {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BusError> {
        let data = self.peek(addr, buf.len()).ok_or(BusError::Unmapped(addr))?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BusError> {
        if let Some(mem) = self.ram_mut(addr, data.len()) {
            mem.copy_from_slice(data);
            return Ok(());
        }
        let words = Self::register_words(addr, data.len()).ok_or(BusError::Unmapped(addr))?;
        for (reg, chunk) in words.zip(data.chunks_exact(4)) {
            let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            log::trace!("reg write 0x{reg:08x} = 0x{value:08x}");
            self.registers.insert(reg, value);
        }
        Ok(())
    }
}
