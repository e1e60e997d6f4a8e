// Licensed under the Apache-2.0 license

//! Serial loader command handling.

use super::command::{
    data_checksum, BeginParams, LoaderError, Opcode, Request, Response, SpiParams,
    WriteRegParams,
};
use crate::efuse::Efuses;
use crate::hil::{FlashStorage, Soc, SystemBus};
use crate::rom::{BootOutcome, JumpKind};
use c3_config::flash::{FlashGeometry, DEFAULT_FLASH_GEOMETRY};
use c3_config::MemoryMap;
use c3_image::ChipId;
use md5::{Digest, Md5};
use miniz_oxide::inflate::core::inflate_flags::{
    TINFL_FLAG_HAS_MORE_INPUT, TINFL_FLAG_PARSE_ZLIB_HEADER,
};
use miniz_oxide::inflate::core::{decompress, DecompressorOxide, TINFL_LZ_DICT_SIZE};
use miniz_oxide::inflate::TINFLStatus;
use romtime::RomError;
use zerocopy::FromBytes;

const MD5_CHUNK: usize = 256;
const SECURITY_INFO_LEN: usize = 20;
const SECURITY_INFO_KEY_PURPOSES: usize = 7;

type LoaderResult<T> = Result<T, LoaderError>;

/// What the download loop must do after sending the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderAction {
    Continue,
    ChangeBaud(u32),
    Exit(BootOutcome),
}

/// Progress of a multi-packet write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transfer {
    /// Flash offset or RAM address of the first byte.
    start: u32,
    /// Bytes the host announced.
    total: u32,
    /// Bytes accepted so far.
    written: u32,
    num_blocks: u32,
    next_seq: u32,
}

impl Transfer {
    fn new(params: &BeginParams) -> Self {
        Transfer {
            start: params.offset.get(),
            total: params.total_size.get(),
            written: 0,
            num_blocks: params.num_blocks.get(),
            next_seq: 0,
        }
    }

    fn check_seq(&self, seq: u32) -> LoaderResult<()> {
        if seq != self.next_seq || seq >= self.num_blocks.max(1) {
            return Err(LoaderError::FailedToAct);
        }
        Ok(())
    }

    fn remaining(&self) -> u32 {
        self.total - self.written
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Idle,
    Flash(Transfer),
    /// Compressed flash write; `written` counts inflated bytes.
    Deflate { transfer: Transfer, dict_pos: usize, done: bool },
    Mem(Transfer),
}

/// Large buffers used by download mode. They live in the ROM's `.bss` on
/// hardware.
pub struct LoaderBuffers<'a> {
    /// SLIP frame buffer, at least [`super::command::MAX_FRAME_LEN`] bytes.
    pub frame: &'a mut [u8],
    pub dictionary: &'a mut [u8; TINFL_LZ_DICT_SIZE],
    pub inflater: &'a mut DecompressorOxide,
}

pub struct Loader<'a> {
    flash: &'a dyn FlashStorage,
    bus: &'a mut dyn SystemBus,
    soc: &'a mut dyn Soc,
    efuses: &'a Efuses,
    memory_map: &'a MemoryMap,
    dictionary: &'a mut [u8; TINFL_LZ_DICT_SIZE],
    inflater: &'a mut DecompressorOxide,
    secure: bool,
    geometry: FlashGeometry,
    session: Session,
}

impl<'a> Loader<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flash: &'a dyn FlashStorage,
        bus: &'a mut dyn SystemBus,
        soc: &'a mut dyn Soc,
        efuses: &'a Efuses,
        memory_map: &'a MemoryMap,
        dictionary: &'a mut [u8; TINFL_LZ_DICT_SIZE],
        inflater: &'a mut DecompressorOxide,
        secure: bool,
    ) -> Self {
        let geometry = FlashGeometry {
            total_size: flash.capacity() as u32,
            ..DEFAULT_FLASH_GEOMETRY
        };
        Loader {
            flash,
            bus,
            soc,
            efuses,
            memory_map,
            dictionary,
            inflater,
            secure,
            geometry,
            session: Session::Idle,
        }
    }

    /// Handles one decoded frame. Frames that are not requests get no
    /// response.
    pub fn handle(&mut self, frame: &[u8]) -> (Option<Response>, LoaderAction) {
        let Some(request) = Request::parse(frame) else {
            return (None, LoaderAction::Continue);
        };
        let op = request.op;
        match self.dispatch(&request) {
            Ok((response, action)) => (Some(response), action),
            Err(error) => (Some(Response::error(op, error)), LoaderAction::Continue),
        }
    }

    fn dispatch(&mut self, request: &Request) -> LoaderResult<(Response, LoaderAction)> {
        let op = request
            .opcode()
            .ok_or(LoaderError::InvalidMessage)?;
        if self.secure && !op.allowed_in_secure_mode() {
            return Err(LoaderError::InvalidMessage);
        }
        let ok = Response::ok(request.op, 0);
        let cont = LoaderAction::Continue;
        match op {
            Opcode::Sync => {
                if !request.is_sync() {
                    return Err(LoaderError::InvalidMessage);
                }
                Ok((ok, cont))
            }
            Opcode::FlashBegin => self.flash_begin(request).map(|_| (ok, cont)),
            Opcode::FlashData => self.flash_data(request).map(|_| (ok, cont)),
            Opcode::FlashEnd => Ok((ok, self.flash_end(request)?)),
            Opcode::FlashDeflBegin => self.deflate_begin(request).map(|_| (ok, cont)),
            Opcode::FlashDeflData => self.deflate_data(request).map(|_| (ok, cont)),
            Opcode::FlashDeflEnd => Ok((ok, self.flash_end(request)?)),
            Opcode::MemBegin => self.mem_begin(request).map(|_| (ok, cont)),
            Opcode::MemData => self.mem_data(request).map(|_| (ok, cont)),
            Opcode::MemEnd => Ok((ok, self.mem_end(request)?)),
            Opcode::WriteReg => self.write_reg(request).map(|_| (ok, cont)),
            Opcode::ReadReg => {
                let value = self.read_reg(request)?;
                Ok((Response::ok(request.op, value), cont))
            }
            Opcode::SpiSetParams => self.spi_set_params(request).map(|_| (ok, cont)),
            Opcode::SpiAttach => {
                self.flash
                    .attach()
                    .map_err(|_| LoaderError::FailedToAct)?;
                Ok((ok, cont))
            }
            Opcode::ChangeBaudrate => {
                let baud = request.word(0).ok_or(LoaderError::InvalidMessage)?;
                if baud == 0 {
                    return Err(LoaderError::InvalidMessage);
                }
                Ok((ok, LoaderAction::ChangeBaud(baud)))
            }
            Opcode::SpiFlashMd5 => {
                let digest = self.flash_md5(request)?;
                Ok((Response::with_data(request.op, &digest), cont))
            }
            Opcode::GetSecurityInfo => {
                Ok((Response::with_data(request.op, &self.security_info()), cont))
            }
        }
    }

    fn begin_params(request: &Request) -> LoaderResult<BeginParams> {
        request
            .params::<BeginParams>()
            .ok_or(LoaderError::InvalidMessage)
    }

    /// Erases the sectors covering the announced range.
    fn erase_for(&mut self, params: &BeginParams) -> LoaderResult<()> {
        let offset = params.offset.get();
        let total = params.total_size.get();
        if !self.geometry.contains(offset, total) || offset as usize >= self.flash.capacity() {
            return Err(LoaderError::FailedToAct);
        }
        let (start, len) = self.geometry.sector_span(offset, total);
        let len = len.min(self.flash.capacity() as u32 - start);
        self.flash
            .erase(start as usize, len as usize)
            .map_err(|_| LoaderError::FlashWriteError)
    }

    fn flash_begin(&mut self, request: &Request) -> LoaderResult<()> {
        let params = Self::begin_params(request)?;
        // fifth word: encrypted write, which this ROM does not support
        if request.word(4).is_some_and(|encrypted| encrypted != 0) {
            return Err(LoaderError::FailedToAct);
        }
        self.session = Session::Idle;
        self.erase_for(&params)?;
        self.session = Session::Flash(Transfer::new(&params));
        Ok(())
    }

    fn checked_data<'r>(request: &Request<'r>) -> LoaderResult<(u32, &'r [u8])> {
        let (header, data) = request.data().ok_or(LoaderError::InvalidMessage)?;
        if data_checksum(data) != request.checksum {
            return Err(LoaderError::BadDataChecksum);
        }
        Ok((header.seq.get(), data))
    }

    fn flash_data(&mut self, request: &Request) -> LoaderResult<()> {
        let Session::Flash(mut transfer) = self.session else {
            return Err(LoaderError::FailedToAct);
        };
        let (seq, data) = Self::checked_data(request)?;
        transfer.check_seq(seq)?;
        // the last block is padded by the host; only the announced bytes land
        let n = data.len().min(transfer.remaining() as usize);
        self.flash
            .write(&data[..n], (transfer.start + transfer.written) as usize)
            .map_err(|_| LoaderError::FlashWriteError)?;
        transfer.written += n as u32;
        transfer.next_seq += 1;
        self.session = Session::Flash(transfer);
        Ok(())
    }

    /// FLASH_END and FLASH_DEFL_END. A zero flag asks for a reboot.
    fn flash_end(&mut self, request: &Request) -> LoaderResult<LoaderAction> {
        let stay = request.word(0).ok_or(LoaderError::InvalidMessage)?;
        self.session = Session::Idle;
        if stay == 0 {
            Ok(LoaderAction::Exit(BootOutcome::Restart))
        } else {
            Ok(LoaderAction::Continue)
        }
    }

    fn deflate_begin(&mut self, request: &Request) -> LoaderResult<()> {
        let params = Self::begin_params(request)?;
        self.session = Session::Idle;
        self.erase_for(&params)?;
        self.inflater.init();
        self.session = Session::Deflate {
            transfer: Transfer::new(&params),
            dict_pos: 0,
            done: false,
        };
        Ok(())
    }

    fn deflate_data(&mut self, request: &Request) -> LoaderResult<()> {
        let Session::Deflate {
            mut transfer,
            mut dict_pos,
            mut done,
        } = self.session
        else {
            return Err(LoaderError::FailedToAct);
        };
        let (seq, mut input) = Self::checked_data(request)?;
        transfer.check_seq(seq)?;
        while !done && !input.is_empty() {
            let flags = TINFL_FLAG_PARSE_ZLIB_HEADER | TINFL_FLAG_HAS_MORE_INPUT;
            let (status, consumed, produced) =
                decompress(self.inflater, input, &mut self.dictionary[..], dict_pos, flags);
            let n = produced.min(transfer.remaining() as usize);
            if n < produced {
                // stream inflates past the announced size
                return Err(LoaderError::DeflateError);
            }
            self.flash
                .write(
                    &self.dictionary[dict_pos..dict_pos + n],
                    (transfer.start + transfer.written) as usize,
                )
                .map_err(|_| LoaderError::FlashWriteError)?;
            transfer.written += n as u32;
            dict_pos = (dict_pos + produced) & (TINFL_LZ_DICT_SIZE - 1);
            input = &input[consumed..];
            match status {
                TINFLStatus::Done => done = true,
                TINFLStatus::NeedsMoreInput | TINFLStatus::HasMoreOutput => {
                    if consumed == 0 && produced == 0 {
                        return Err(LoaderError::DeflateError);
                    }
                }
                _ => return Err(LoaderError::DeflateError),
            }
        }
        transfer.next_seq += 1;
        self.session = Session::Deflate {
            transfer,
            dict_pos,
            done,
        };
        Ok(())
    }

    fn mem_begin(&mut self, request: &Request) -> LoaderResult<()> {
        let params = Self::begin_params(request)?;
        self.session = Session::Idle;
        if !self
            .memory_map
            .is_loadable(params.offset.get(), params.total_size.get())
        {
            return Err(LoaderError::FailedToAct);
        }
        self.session = Session::Mem(Transfer::new(&params));
        Ok(())
    }

    fn mem_data(&mut self, request: &Request) -> LoaderResult<()> {
        let Session::Mem(mut transfer) = self.session else {
            return Err(LoaderError::FailedToAct);
        };
        let (seq, data) = Self::checked_data(request)?;
        transfer.check_seq(seq)?;
        if data.len() > transfer.remaining() as usize {
            return Err(LoaderError::FailedToAct);
        }
        self.bus
            .write(transfer.start + transfer.written, data)
            .map_err(|_| LoaderError::FailedToAct)?;
        transfer.written += data.len() as u32;
        transfer.next_seq += 1;
        self.session = Session::Mem(transfer);
        Ok(())
    }

    /// A zero flag asks the ROM to jump to the entry word.
    fn mem_end(&mut self, request: &Request) -> LoaderResult<LoaderAction> {
        let stay = request.word(0).ok_or(LoaderError::InvalidMessage)?;
        let entry = request.word(1).ok_or(LoaderError::InvalidMessage)?;
        self.session = Session::Idle;
        if stay != 0 {
            return Ok(LoaderAction::Continue);
        }
        if entry == 0 {
            return Ok(LoaderAction::Exit(BootOutcome::Halt(
                RomError::DOWNLOAD_NO_USER_CODE,
            )));
        }
        if !self.memory_map.is_executable(entry) {
            return Err(LoaderError::FailedToAct);
        }
        Ok(LoaderAction::Exit(BootOutcome::Jump {
            entry,
            kind: JumpKind::RamLoader,
        }))
    }

    fn write_reg(&mut self, request: &Request) -> LoaderResult<()> {
        let groups = <[WriteRegParams]>::ref_from_bytes(request.payload)
            .map_err(|_| LoaderError::InvalidMessage)?;
        if groups.is_empty() {
            return Err(LoaderError::InvalidMessage);
        }
        for group in groups {
            let addr = group.addr.get();
            let mask = group.mask.get();
            let old = if mask == u32::MAX {
                0
            } else {
                self.bus
                    .read_u32(addr)
                    .map_err(|_| LoaderError::FailedToAct)?
            };
            let value = (old & !mask) | (group.value.get() & mask);
            self.bus
                .write_u32(addr, value)
                .map_err(|_| LoaderError::FailedToAct)?;
            if group.delay_us.get() != 0 {
                self.soc.delay_us(group.delay_us.get());
            }
        }
        Ok(())
    }

    fn read_reg(&mut self, request: &Request) -> LoaderResult<u32> {
        let addr = request.word(0).ok_or(LoaderError::InvalidMessage)?;
        self.bus
            .read_u32(addr)
            .map_err(|_| LoaderError::FailedToAct)
    }

    fn spi_set_params(&mut self, request: &Request) -> LoaderResult<()> {
        let params = request
            .params::<SpiParams>()
            .ok_or(LoaderError::InvalidMessage)?;
        let geometry = FlashGeometry {
            device_id: params.device_id.get(),
            total_size: params.total_size.get(),
            block_size: params.block_size.get(),
            sector_size: params.sector_size.get(),
            page_size: params.page_size.get(),
            status_mask: params.status_mask.get(),
        };
        if geometry.sector_size == 0 || geometry.block_size == 0 || geometry.page_size == 0 {
            return Err(LoaderError::InvalidMessage);
        }
        self.flash
            .set_params(&geometry)
            .map_err(|_| LoaderError::FailedToAct)?;
        self.geometry = geometry;
        Ok(())
    }

    fn flash_md5(&mut self, request: &Request) -> LoaderResult<[u8; 32]> {
        let addr = request.word(0).ok_or(LoaderError::InvalidMessage)? as usize;
        let size = request.word(1).ok_or(LoaderError::InvalidMessage)? as usize;
        if addr
            .checked_add(size)
            .is_none_or(|end| end > self.flash.capacity())
        {
            return Err(LoaderError::ReadLengthError);
        }
        let mut hasher = Md5::new();
        let mut chunk = [0u8; MD5_CHUNK];
        let mut done = 0;
        while done < size {
            let n = (size - done).min(MD5_CHUNK);
            self.flash
                .read(&mut chunk[..n], addr + done)
                .map_err(|_| LoaderError::FlashReadError)?;
            hasher.update(&chunk[..n]);
            done += n;
        }
        let digest = hasher.finalize();
        Ok(hex_ascii(&digest))
    }

    fn security_info(&self) -> [u8; SECURITY_INFO_LEN] {
        let mut info = [0u8; SECURITY_INFO_LEN];
        info[0..4].copy_from_slice(&self.efuses.security_flags().bits().to_le_bytes());
        info[4] = self.efuses.spi_boot_crypt_cnt() as u8;
        let purposes = self.efuses.key_purposes();
        info[5..5 + purposes.len()].copy_from_slice(&purposes);
        let chip_id_at = 5 + SECURITY_INFO_KEY_PURPOSES;
        info[chip_id_at..chip_id_at + 4]
            .copy_from_slice(&(u16::from(ChipId::Esp32C3) as u32).to_le_bytes());
        info[chip_id_at + 4..].copy_from_slice(&self.soc.chip_revision().to_le_bytes());
        info
    }
}

/// Lowercase hex rendering of a 16-byte digest.
fn hex_ascii(digest: &[u8]) -> [u8; 32] {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = [0u8; 32];
    for (pair, b) in out.chunks_exact_mut(2).zip(digest) {
        pair[0] = HEX[(b >> 4) as usize];
        pair[1] = HEX[(b & 0xf) as usize];
    }
    out
}
