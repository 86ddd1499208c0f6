use crate::types::Endianness;
use crate::wire::error::{eof_as_truncated, Error};
use byteordered::ByteOrdered;
use derive_more::Display;
use std::io::{self, Read};

/// Record type tags
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum RecordType {
    #[display(fmt = "HEADER")]
    Header,
    #[display(fmt = "ALLOC")]
    Alloc,
    #[display(fmt = "FREE")]
    Free,
    #[display(fmt = "CONTEXT")]
    Context,
    #[display(fmt = "INFO")]
    Info,
    #[display(fmt = "UNKNOWN(0x{_0:02X})")]
    Unknown(u8),
}

impl From<u8> for RecordType {
    fn from(tag: u8) -> Self {
        use RecordType::*;
        match tag {
            0x00 => Header,
            0x01 => Alloc,
            0x02 => Free,
            0x03 => Context,
            0x04 => Info,
            _ => Unknown(tag),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(rt: RecordType) -> u8 {
        use RecordType::*;
        match rt {
            Header => 0x00,
            Alloc => 0x01,
            Free => 0x02,
            Context => 0x03,
            Info => 0x04,
            Unknown(raw) => raw,
        }
    }
}

/// The fixed-size part of every record
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RecordFrame {
    pub tag: u8,
    pub len: u32,
}

impl RecordFrame {
    pub const WIRE_SIZE: usize = 5;

    pub fn record_type(&self) -> RecordType {
        RecordType::from(self.tag)
    }

    /// Reads the record tag.
    /// Returns `None` when the input ends exactly at a record boundary.
    pub(crate) fn read_tag<R: Read>(r: &mut R) -> Result<Option<u8>, Error> {
        let mut tag = [0_u8; 1];
        loop {
            match r.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads the raw length bytes, their byte order isn't known for the
    /// header record until its magic has been read.
    pub(crate) fn read_raw_len<R: Read>(r: &mut R) -> Result<[u8; 4], Error> {
        let mut len = [0_u8; 4];
        r.read_exact(&mut len).map_err(eof_as_truncated)?;
        Ok(len)
    }

    pub(crate) fn decode_len(raw: [u8; 4], endianness: Endianness) -> Result<u32, Error> {
        let mut r = ByteOrdered::new(&raw[..], byteordered::Endianness::from(endianness));
        Ok(r.read_u32()?)
    }

    /// Reads a complete frame, `None` at a clean end of input
    pub fn read<R: Read>(r: &mut R, endianness: Endianness) -> Result<Option<Self>, Error> {
        let Some(tag) = Self::read_tag(r)? else {
            return Ok(None);
        };
        let len = Self::decode_len(Self::read_raw_len(r)?, endianness)?;
        Ok(Some(Self { tag, len }))
    }
}

/// Consumes `len` bytes, failing with `LengthOutOfBounds` if the input
/// ends first.
pub(crate) fn skip_payload<R: Read>(r: &mut R, tag: RecordType, len: u32) -> Result<(), Error> {
    let skipped = io::copy(&mut r.by_ref().take(u64::from(len)), &mut io::sink())?;
    if skipped < u64::from(len) {
        Err(Error::LengthOutOfBounds {
            tag,
            len,
            available: skipped,
        })
    } else {
        Ok(())
    }
}
