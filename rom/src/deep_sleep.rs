// Licensed under the Apache-2.0 license

//! Resume from deep sleep into a wake stub kept in RTC fast memory.

use crate::rom::RomEnv;
use crc::{Crc, CRC_32_ISO_HDLC};
use romtime::{RomError, RomResult};

/// RTC store register holding the wake stub entry point.
pub const RTC_STORE_WAKE_ENTRY: usize = 6;
/// RTC store register holding the CRC of RTC fast memory.
pub const RTC_STORE_WAKE_CRC: usize = 7;

pub const RTC_MEMORY_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const CHUNK: usize = 256;

pub struct DeepSleepResume;

impl DeepSleepResume {
    /// Checks the wake stub left behind before deep sleep and returns its
    /// entry point.
    pub fn try_resume(env: &mut RomEnv) -> RomResult<u32> {
        if env.efuses.dis_rtc_ram_boot() {
            return Err(RomError::DEEP_SLEEP_DISABLED);
        }
        let entry = env.soc.rtc_store(RTC_STORE_WAKE_ENTRY);
        let expected = env.soc.rtc_store(RTC_STORE_WAKE_CRC);
        if entry == 0 || !env.memory_map.is_executable(entry) {
            return Err(RomError::DEEP_SLEEP_INVALID_ENTRY);
        }

        let rtc = env.memory_map.rtc_fast;
        let mut digest = RTC_MEMORY_CRC.digest();
        let mut chunk = [0u8; CHUNK];
        let mut offset = 0;
        while offset < rtc.size {
            let n = (rtc.size - offset).min(CHUNK as u32) as usize;
            env.bus
                .read(rtc.start + offset, &mut chunk[..n])
                .map_err(|_| RomError::DEEP_SLEEP_READ_FAILED)?;
            digest.update(&chunk[..n]);
            offset += n as u32;
        }
        if digest.finalize() != expected {
            return Err(RomError::DEEP_SLEEP_CRC_MISMATCH);
        }
        Ok(entry)
    }
}
