// Licensed under the Apache-2.0 license

//! Host side of the serial loader: SLIP-framed request streams and response
//! parsing.

use anyhow::{anyhow, bail, Result};
use c3_config::flash::FlashGeometry;
use c3_rom_common::download::command::{
    data_checksum, BeginParams, DataHeader, RequestHeader, ResponseHeader, SpiParams,
    WriteRegParams, DIR_REQUEST, DIR_RESPONSE, FLASH_WRITE_SIZE, MAX_RESPONSE_LEN,
    RAM_BLOCK_SIZE, STATUS_LEN, SYNC_FILL, SYNC_FILL_LEN, SYNC_PREFIX,
};
use c3_rom_common::download::{slip, LoaderError, Opcode, SlipDecoder};
use md5::{Digest, Md5};
use miniz_oxide::deflate::compress_to_vec_zlib;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, IntoBytes};

const DEFLATE_LEVEL: u8 = 9;

/// Accumulates the bytes a host writes to the ROM. Every method appends one
/// or more complete SLIP frames.
#[derive(Debug, Default, Clone)]
pub struct LoaderClient {
    wire: Vec<u8>,
    commands: usize,
}

fn words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn begin(total_size: u32, num_blocks: u32, block_size: u32, offset: u32) -> Vec<u8> {
    BeginParams {
        total_size: U32::new(total_size),
        num_blocks: U32::new(num_blocks),
        block_size: U32::new(block_size),
        offset: U32::new(offset),
    }
    .as_bytes()
    .to_vec()
}

impl LoaderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw line noise, e.g. a boot log echo the host did not filter.
    pub fn noise(&mut self, bytes: &[u8]) -> &mut Self {
        self.wire.extend_from_slice(bytes);
        self
    }

    pub fn command(&mut self, op: Opcode, checksum: u32, payload: &[u8]) -> &mut Self {
        let header = RequestHeader {
            direction: DIR_REQUEST,
            op: op as u8,
            size: U16::new(payload.len() as u16),
            checksum: U32::new(checksum),
        };
        let mut frame = header.as_bytes().to_vec();
        frame.extend_from_slice(payload);
        slip::encode(&frame, |chunk| self.wire.extend_from_slice(chunk));
        self.commands += 1;
        self
    }

    fn data(&mut self, op: Opcode, seq: u32, data: &[u8]) -> &mut Self {
        let header = DataHeader {
            size: U32::new(data.len() as u32),
            seq: U32::new(seq),
            ..Default::default()
        };
        let mut payload = header.as_bytes().to_vec();
        payload.extend_from_slice(data);
        self.command(op, data_checksum(data), &payload)
    }

    pub fn sync(&mut self) -> &mut Self {
        let mut payload = SYNC_PREFIX.to_vec();
        payload.extend_from_slice(&[SYNC_FILL; SYNC_FILL_LEN]);
        self.command(Opcode::Sync, 0, &payload)
    }

    pub fn flash_begin(&mut self, size: u32, num_blocks: u32, block_size: u32, offset: u32) -> &mut Self {
        self.command(Opcode::FlashBegin, 0, &begin(size, num_blocks, block_size, offset))
    }

    pub fn flash_data(&mut self, seq: u32, data: &[u8]) -> &mut Self {
        self.data(Opcode::FlashData, seq, data)
    }

    pub fn flash_end(&mut self, reboot: bool) -> &mut Self {
        self.command(Opcode::FlashEnd, 0, &words(&[!reboot as u32]))
    }

    /// FLASH_BEGIN plus FLASH_DATA blocks; the last block is padded with
    /// erased bytes.
    pub fn write_flash(&mut self, offset: u32, data: &[u8]) -> &mut Self {
        let blocks = data.len().div_ceil(FLASH_WRITE_SIZE);
        self.flash_begin(data.len() as u32, blocks as u32, FLASH_WRITE_SIZE as u32, offset);
        for (seq, chunk) in data.chunks(FLASH_WRITE_SIZE).enumerate() {
            let mut block = chunk.to_vec();
            block.resize(FLASH_WRITE_SIZE, 0xff);
            self.flash_data(seq as u32, &block);
        }
        self
    }

    /// FLASH_DEFL_BEGIN plus FLASH_DEFL_DATA blocks of the zlib-compressed
    /// `data`.
    pub fn write_flash_deflated(&mut self, offset: u32, data: &[u8]) -> &mut Self {
        let compressed = compress_to_vec_zlib(data, DEFLATE_LEVEL);
        log::debug!(
            "deflated 0x{:x} bytes to 0x{:x}",
            data.len(),
            compressed.len()
        );
        let blocks = compressed.len().div_ceil(FLASH_WRITE_SIZE);
        self.command(
            Opcode::FlashDeflBegin,
            0,
            &begin(data.len() as u32, blocks as u32, FLASH_WRITE_SIZE as u32, offset),
        );
        for (seq, chunk) in compressed.chunks(FLASH_WRITE_SIZE).enumerate() {
            self.data(Opcode::FlashDeflData, seq as u32, chunk);
        }
        self
    }

    pub fn flash_defl_end(&mut self, reboot: bool) -> &mut Self {
        self.command(Opcode::FlashDeflEnd, 0, &words(&[!reboot as u32]))
    }

    pub fn mem_begin(&mut self, size: u32, num_blocks: u32, block_size: u32, addr: u32) -> &mut Self {
        self.command(Opcode::MemBegin, 0, &begin(size, num_blocks, block_size, addr))
    }

    pub fn mem_data(&mut self, seq: u32, data: &[u8]) -> &mut Self {
        self.data(Opcode::MemData, seq, data)
    }

    /// With `execute` the ROM jumps to `entry` after responding.
    pub fn mem_end(&mut self, execute: bool, entry: u32) -> &mut Self {
        self.command(Opcode::MemEnd, 0, &words(&[!execute as u32, entry]))
    }

    /// MEM_BEGIN plus MEM_DATA blocks.
    pub fn load_ram(&mut self, addr: u32, data: &[u8]) -> &mut Self {
        let blocks = data.len().div_ceil(RAM_BLOCK_SIZE);
        self.mem_begin(data.len() as u32, blocks as u32, RAM_BLOCK_SIZE as u32, addr);
        for (seq, chunk) in data.chunks(RAM_BLOCK_SIZE).enumerate() {
            self.mem_data(seq as u32, chunk);
        }
        self
    }

    pub fn write_reg(&mut self, addr: u32, value: u32, mask: u32, delay_us: u32) -> &mut Self {
        let params = WriteRegParams {
            addr: U32::new(addr),
            value: U32::new(value),
            mask: U32::new(mask),
            delay_us: U32::new(delay_us),
        };
        self.command(Opcode::WriteReg, 0, params.as_bytes())
    }

    pub fn read_reg(&mut self, addr: u32) -> &mut Self {
        self.command(Opcode::ReadReg, 0, &words(&[addr]))
    }

    pub fn spi_set_params(&mut self, geometry: &FlashGeometry) -> &mut Self {
        let params = SpiParams {
            device_id: U32::new(geometry.device_id),
            total_size: U32::new(geometry.total_size),
            block_size: U32::new(geometry.block_size),
            sector_size: U32::new(geometry.sector_size),
            page_size: U32::new(geometry.page_size),
            status_mask: U32::new(geometry.status_mask),
        };
        self.command(Opcode::SpiSetParams, 0, params.as_bytes())
    }

    pub fn spi_attach(&mut self) -> &mut Self {
        self.command(Opcode::SpiAttach, 0, &words(&[0, 0]))
    }

    pub fn change_baudrate(&mut self, baud: u32, old_baud: u32) -> &mut Self {
        self.command(Opcode::ChangeBaudrate, 0, &words(&[baud, old_baud]))
    }

    pub fn spi_flash_md5(&mut self, addr: u32, size: u32) -> &mut Self {
        self.command(Opcode::SpiFlashMd5, 0, &words(&[addr, size, 0, 0]))
    }

    pub fn get_security_info(&mut self) -> &mut Self {
        self.command(Opcode::GetSecurityInfo, 0, &[])
    }

    /// Number of request frames queued so far.
    pub fn commands(&self) -> usize {
        self.commands
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn into_wire(self) -> Vec<u8> {
        self.wire
    }
}

/// One decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderResponse {
    pub op: u8,
    pub value: u32,
    pub data: Vec<u8>,
    pub error: Option<LoaderError>,
}

impl LoaderResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.op).ok()
    }
}

/// Decodes every response frame in `wire`, in order.
pub fn parse_responses(wire: &[u8]) -> Result<Vec<LoaderResponse>> {
    let mut buf = [0u8; 2 * MAX_RESPONSE_LEN];
    let mut decoder = SlipDecoder::new(&mut buf);
    let mut responses = Vec::new();
    for &byte in wire {
        if decoder.push(byte).is_some() {
            responses.push(parse_response(decoder.frame())?);
        }
    }
    Ok(responses)
}

fn parse_response(frame: &[u8]) -> Result<LoaderResponse> {
    let (header, body) = ResponseHeader::read_from_prefix(frame)
        .map_err(|_| anyhow!("response frame too short: {}", hex::encode(frame)))?;
    if header.direction != DIR_RESPONSE {
        bail!("frame is not a response: {}", hex::encode(frame));
    }
    if body.len() != header.size.get() as usize || body.len() < STATUS_LEN {
        bail!("bad response length {} for body of {}", header.size.get(), body.len());
    }
    let (data, status) = body.split_at(body.len() - STATUS_LEN);
    let error = match status[0] {
        0 => None,
        _ => Some(
            LoaderError::try_from(status[1])
                .map_err(|_| anyhow!("unknown loader error 0x{:02x}", status[1]))?,
        ),
    };
    Ok(LoaderResponse {
        op: header.op,
        value: header.value.get(),
        data: data.to_vec(),
        error,
    })
}

/// Lowercase hex MD5, as SPI_FLASH_MD5 reports it.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use c3_rom_common::download::Request;

    fn frames(wire: &[u8]) -> Vec<Vec<u8>> {
        let mut buf = vec![0u8; 0x2000];
        let mut decoder = SlipDecoder::new(&mut buf);
        let mut frames = vec![];
        for &b in wire {
            if decoder.push(b).is_some() {
                frames.push(decoder.frame().to_vec());
            }
        }
        frames
    }

    #[test]
    fn test_requests_parse_on_the_rom_side() {
        let mut client = LoaderClient::new();
        client
            .sync()
            .write_flash(0x1000, &[0xc0; 0x500])
            .flash_end(true);
        assert_eq!(client.commands(), 5);
        let frames = frames(client.wire());
        assert_eq!(frames.len(), 5);

        let sync = Request::parse(&frames[0]).unwrap();
        assert!(sync.is_sync());
        let begin = Request::parse(&frames[1]).unwrap();
        assert_eq!(begin.word(0), Some(0x500));
        assert_eq!(begin.word(1), Some(2));
        assert_eq!(begin.word(3), Some(0x1000));
        let last = Request::parse(&frames[3]).unwrap();
        let (header, data) = last.data().unwrap();
        assert_eq!(header.seq.get(), 1);
        assert_eq!(&data[..0x100], &[0xc0; 0x100]);
        assert_eq!(&data[0x100..], &[0xff; 0x300]);
        assert_eq!(last.checksum, data_checksum(data));
        let end = Request::parse(&frames[4]).unwrap();
        assert_eq!(end.word(0), Some(0));
    }

    #[test]
    fn test_parse_responses() {
        let mut wire = vec![];
        slip::encode(&[1, 0x0a, 4, 0, 0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0], |c| {
            wire.extend_from_slice(c)
        });
        slip::encode(&[1, 0x03, 4, 0, 0, 0, 0, 0, 1, 0x07, 0, 0], |c| {
            wire.extend_from_slice(c)
        });
        let responses = parse_responses(&wire).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].opcode(), Some(Opcode::ReadReg));
        assert_eq!(responses[0].value, 0xdead_beef);
        assert!(responses[0].is_ok());
        assert_eq!(responses[1].error, Some(LoaderError::BadDataChecksum));

        let mut bad = vec![];
        slip::encode(&[0, 0x03, 0, 0, 0, 0, 0, 0], |c| bad.extend_from_slice(c));
        assert!(parse_responses(&bad).is_err());
    }

    #[test]
    fn test_md5_hex() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
