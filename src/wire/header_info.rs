use crate::config::Config;
use crate::types::Endianness;
use crate::wire::error::{eof_as_truncated, Error};
use crate::wire::record::{skip_payload, RecordFrame, RecordType};
use byteordered::ByteOrdered;
use std::io::Read;
use tracing::debug;

/// Contents of the leading header record
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct HeaderInfo {
    pub endianness: Endianness,
    pub format_version: u16,
    pub pointer_size: u8,
    pub pid: u32,
}

impl HeaderInfo {
    /// Fixed part of the header payload, anything beyond is an extension area
    pub const WIRE_SIZE: usize = 12;
    pub const SUPPORTED_VERSION: u16 = 1;
    /// `b"RTRC"` read as a little-endian word
    pub const MAGIC_LITTLE_ENDIAN: u32 = 0x43_52_54_52;
    /// `b"CRTR"` read as a little-endian word
    pub const MAGIC_BIG_ENDIAN: u32 = 0x52_54_52_43;

    pub fn read_magic<R: Read>(r: &mut R) -> Result<Endianness, Error> {
        let mut magic = [0; 4];
        r.read_exact(&mut magic).map_err(eof_as_truncated)?;
        let endianness = match u32::from_le_bytes(magic) {
            Self::MAGIC_LITTLE_ENDIAN => Endianness::Little,
            Self::MAGIC_BIG_ENDIAN => Endianness::Big,
            _ => return Err(Error::HeaderMagic(magic)),
        };
        Ok(endianness)
    }

    pub fn read<R: Read>(r: &mut R, config: &Config) -> Result<Self, Error> {
        let tag = RecordFrame::read_tag(r)?.ok_or(Error::MissingHeader)?;
        let record_type = RecordType::from(tag);
        if record_type != RecordType::Header {
            return Err(Error::UnexpectedFirstRecord(record_type));
        }
        let raw_len = RecordFrame::read_raw_len(r)?;
        let endianness = Self::read_magic(r)?;
        let len = RecordFrame::decode_len(raw_len, endianness)?;
        if len > config.max_record_len {
            return Err(Error::RecordTooLarge {
                tag: record_type,
                len,
                max: config.max_record_len,
            });
        }
        if (len as usize) < Self::WIRE_SIZE {
            return Err(Error::MalformedHeader(len));
        }

        // The remaining fields are endian-aware
        let mut r = ByteOrdered::new(r, byteordered::Endianness::from(endianness));

        let format_version = r.read_u16().map_err(eof_as_truncated)?;
        debug!(format_version, endianness = %endianness, "Found format version");
        if format_version != Self::SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(format_version));
        }
        let pointer_size = r.read_u8().map_err(eof_as_truncated)?;
        let _reserved = r.read_u8().map_err(eof_as_truncated)?;
        let pid = r.read_u32().map_err(eof_as_truncated)?;

        let extension_len = len - Self::WIRE_SIZE as u32;
        if extension_len != 0 {
            debug!(extension_len, "Skipping header extension area");
            skip_payload(r.inner_mut(), record_type, extension_len)?;
        }

        Ok(Self {
            endianness,
            format_version,
            pointer_size,
            pid,
        })
    }
}
