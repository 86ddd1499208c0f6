use crate::wire::{HeaderInfo, RecordType};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing {} record, the stream is empty", RecordType::Header)]
    MissingHeader,

    #[error("Expected a {} record first, found {0}", RecordType::Header)]
    UnexpectedFirstRecord(RecordType),

    #[error("Invalid header magic {0:X?}")]
    HeaderMagic([u8; 4]),

    #[error(
        "Unsupported format version {0}, expected {}",
        HeaderInfo::SUPPORTED_VERSION
    )]
    UnsupportedVersion(u16),

    #[error(
        "Header payload is {0} bytes, expected at least {}",
        HeaderInfo::WIRE_SIZE
    )]
    MalformedHeader(u32),

    #[error("The stream ended inside a record header")]
    TruncatedRecord,

    #[error("{tag} record declares {len} payload bytes but the stream ends after {available}")]
    LengthOutOfBounds {
        tag: RecordType,
        len: u32,
        available: u64,
    },

    #[error("{tag} record declares {len} payload bytes, exceeding the {max} byte limit")]
    RecordTooLarge { tag: RecordType, len: u32, max: u32 },

    #[error("Skipped a {len} byte {} record found after the start of the stream", RecordType::Header)]
    UnexpectedHeader { len: u32 },

    #[error("Skipped {len} bytes of an unknown record type 0x{tag:02X}")]
    UnknownRecordType { tag: u8, len: u32 },

    #[error("{tag} record payload is {len} bytes, expected {expected}")]
    MalformedPayload {
        tag: RecordType,
        len: u32,
        expected: u64,
    },

    #[error(
        "Encountered an IO error while reading the input stream ({})",
        .0.kind()
    )]
    Io(#[from] io::Error),
}

impl Error {
    /// The decoder consumed exactly the offending record and is positioned
    /// at the next record boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedHeader { .. }
                | Error::UnknownRecordType { .. }
                | Error::MalformedPayload { .. }
        )
    }

    /// The input ended part way through a record header, i.e. the capture
    /// was cut short.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Error::TruncatedRecord)
    }
}

pub(crate) fn eof_as_truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedRecord
    } else {
        Error::Io(e)
    }
}
