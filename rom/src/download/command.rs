// Licensed under the Apache-2.0 license

//! Loader packets.
//!
//! Request:  `00 | op | size:u16 | checksum:u32 | payload[size]`
//! Response: `01 | op | size:u16 | value:u32 | data | status | error | 00 00`

use c3_image::CHECKSUM_SEED;
use num_enum::TryFromPrimitive;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const DIR_REQUEST: u8 = 0x00;
pub const DIR_RESPONSE: u8 = 0x01;
pub const STATUS_LEN: usize = 4;
/// Largest data field carried by a response (SPI_FLASH_MD5).
pub const MAX_RESPONSE_DATA: usize = 32;
pub const MAX_RESPONSE_LEN: usize =
    core::mem::size_of::<ResponseHeader>() + MAX_RESPONSE_DATA + STATUS_LEN;

/// Block size for FLASH_DATA and FLASH_DEFL_DATA.
pub const FLASH_WRITE_SIZE: usize = 0x400;
/// Block size for MEM_DATA.
pub const RAM_BLOCK_SIZE: usize = 0x1800;
/// Payload of SYNC after the fixed prefix.
pub const SYNC_PREFIX: [u8; 4] = [0x07, 0x07, 0x12, 0x20];
pub const SYNC_FILL: u8 = 0x55;
pub const SYNC_FILL_LEN: usize = 32;
/// Largest request frame: header, data header and one RAM block.
pub const MAX_FRAME_LEN: usize = REQUEST_HEADER_LEN + DATA_HEADER_LEN + RAM_BLOCK_SIZE;

pub const REQUEST_HEADER_LEN: usize = core::mem::size_of::<RequestHeader>();
pub const DATA_HEADER_LEN: usize = core::mem::size_of::<DataHeader>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    FlashBegin = 0x02,
    FlashData = 0x03,
    FlashEnd = 0x04,
    MemBegin = 0x05,
    MemEnd = 0x06,
    MemData = 0x07,
    Sync = 0x08,
    WriteReg = 0x09,
    ReadReg = 0x0a,
    SpiSetParams = 0x0b,
    SpiAttach = 0x0d,
    ChangeBaudrate = 0x0f,
    FlashDeflBegin = 0x10,
    FlashDeflData = 0x11,
    FlashDeflEnd = 0x12,
    SpiFlashMd5 = 0x13,
    GetSecurityInfo = 0x14,
}

impl Opcode {
    /// Commands refused while secure download mode is active.
    pub fn allowed_in_secure_mode(&self) -> bool {
        !matches!(
            self,
            Opcode::MemBegin
                | Opcode::MemEnd
                | Opcode::MemData
                | Opcode::ReadReg
                | Opcode::WriteReg
                | Opcode::SpiFlashMd5
        )
    }
}

/// Error byte of a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum LoaderError {
    InvalidMessage = 0x05,
    FailedToAct = 0x06,
    BadDataChecksum = 0x07,
    FlashWriteError = 0x08,
    FlashReadError = 0x09,
    ReadLengthError = 0x0a,
    DeflateError = 0x0b,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RequestHeader {
    pub direction: u8,
    pub op: u8,
    pub size: U16,
    pub checksum: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ResponseHeader {
    pub direction: u8,
    pub op: u8,
    pub size: U16,
    pub value: U32,
}

/// Parameters of FLASH_BEGIN, FLASH_DEFL_BEGIN and MEM_BEGIN.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct BeginParams {
    /// Bytes to write; uncompressed size for FLASH_DEFL_BEGIN.
    pub total_size: U32,
    pub num_blocks: U32,
    pub block_size: U32,
    /// Flash offset or RAM address.
    pub offset: U32,
}

/// Header in front of the data of every *_DATA command.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct DataHeader {
    pub size: U32,
    pub seq: U32,
    pub reserved: [U32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WriteRegParams {
    pub addr: U32,
    pub value: U32,
    pub mask: U32,
    pub delay_us: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SpiParams {
    pub device_id: U32,
    pub total_size: U32,
    pub block_size: U32,
    pub sector_size: U32,
    pub page_size: U32,
    pub status_mask: U32,
}

/// A validated request frame.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub op: u8,
    pub checksum: u32,
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    /// Parses a decoded frame. `None` when the frame is not a request or its
    /// size field disagrees with the frame length.
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        let (header, payload) = RequestHeader::read_from_prefix(frame).ok()?;
        if header.direction != DIR_REQUEST || payload.len() != header.size.get() as usize {
            return None;
        }
        Some(Request {
            op: header.op,
            checksum: header.checksum.get(),
            payload,
        })
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.op).ok()
    }

    /// Little-endian word `index` of the payload.
    pub fn word(&self, index: usize) -> Option<u32> {
        let bytes = self.payload.get(index * 4..index * 4 + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn params<T: FromBytes + KnownLayout + Immutable>(&self) -> Option<T> {
        T::read_from_prefix(self.payload).ok().map(|(params, _)| params)
    }

    /// Splits a *_DATA payload into its header and data.
    pub fn data(&self) -> Option<(DataHeader, &'a [u8])> {
        let (header, data) = DataHeader::read_from_prefix(self.payload).ok()?;
        if header.size.get() as usize != data.len() {
            return None;
        }
        Some((header, data))
    }

    pub fn is_sync(&self) -> bool {
        self.op == Opcode::Sync as u8
            && self.payload.len() == SYNC_PREFIX.len() + SYNC_FILL_LEN
            && self.payload[..4] == SYNC_PREFIX
            && self.payload[4..].iter().all(|&b| b == SYNC_FILL)
    }
}

/// Checksum the host sends with *_DATA commands.
pub fn data_checksum(data: &[u8]) -> u32 {
    c3_image::checksum_update(CHECKSUM_SEED, data) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub op: u8,
    pub value: u32,
    data: [u8; MAX_RESPONSE_DATA],
    data_len: usize,
    pub error: Option<LoaderError>,
}

impl Response {
    pub fn ok(op: u8, value: u32) -> Self {
        Response {
            op,
            value,
            data: [0; MAX_RESPONSE_DATA],
            data_len: 0,
            error: None,
        }
    }

    pub fn with_data(op: u8, data: &[u8]) -> Self {
        let mut response = Self::ok(op, 0);
        let len = data.len().min(MAX_RESPONSE_DATA);
        response.data[..len].copy_from_slice(&data[..len]);
        response.data_len = len;
        response
    }

    pub fn error(op: u8, error: LoaderError) -> Self {
        Response {
            error: Some(error),
            ..Self::ok(op, 0)
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len]
    }

    /// Serializes the response into `out`, returning the used prefix.
    pub fn encode<'b>(&self, out: &'b mut [u8; MAX_RESPONSE_LEN]) -> &'b [u8] {
        let body_len = self.data_len + STATUS_LEN;
        let header = ResponseHeader {
            direction: DIR_RESPONSE,
            op: self.op,
            size: U16::new(body_len as u16),
            value: U32::new(self.value),
        };
        let header_len = core::mem::size_of::<ResponseHeader>();
        out[..header_len].copy_from_slice(header.as_bytes());
        out[header_len..header_len + self.data_len].copy_from_slice(self.data());
        let status = &mut out[header_len + self.data_len..header_len + body_len];
        status.fill(0);
        if let Some(error) = self.error {
            status[0] = 1;
            status[1] = error as u8;
        }
        &out[..header_len + body_len]
    }
}
