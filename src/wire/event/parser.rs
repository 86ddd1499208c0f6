use crate::config::Config;
use crate::time::Timestamp;
use crate::types::{ContextRef, Endianness, Ordinal, ResourceId};
use crate::wire::event::*;
use crate::wire::record::{skip_payload, RecordFrame, RecordType};
use crate::wire::Error;
use byteordered::ByteOrdered;
use std::io::Read;
use tracing::debug;

/// Decodes one data record at a time.
///
/// The parser never looks past the record it is decoding, so after a
/// recoverable error the input is positioned at the next record.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct EventParser {
    /// Endianness of the data, declared by the header
    endianness: byteordered::Endianness,

    /// Payload length limit
    max_record_len: u32,

    /// Ordinal for the next decoded event
    next_ordinal: Ordinal,

    /// Local scratch buffer for the record payload
    buf: Vec<u8>,
}

impl EventParser {
    pub fn new(endianness: Endianness, config: &Config) -> Self {
        Self {
            endianness: byteordered::Endianness::from(endianness),
            max_record_len: config.max_record_len,
            next_ordinal: Ordinal::first(),
            buf: Vec::with_capacity(256),
        }
    }

    /// Number of events decoded so far
    pub fn events_decoded(&self) -> u64 {
        self.next_ordinal.get_raw() - 1
    }

    /// Decodes the next record.
    /// Returns `None` when the input ends on a record boundary.
    pub fn next_event<R: Read>(&mut self, r: &mut R) -> Result<Option<Event>, Error> {
        let frame = match RecordFrame::read(r, self.endianness.into())? {
            Some(f) => f,
            None => return Ok(None),
        };
        let record_type = frame.record_type();
        let len = frame.len;

        if len > self.max_record_len {
            return Err(Error::RecordTooLarge {
                tag: record_type,
                len,
                max: self.max_record_len,
            });
        }

        match record_type {
            RecordType::Header => {
                skip_payload(r, record_type, len)?;
                return Err(Error::UnexpectedHeader { len });
            }
            RecordType::Unknown(tag) => {
                skip_payload(r, record_type, len)?;
                return Err(Error::UnknownRecordType { tag, len });
            }
            _ => (),
        }

        self.buf.clear();
        let available = r.by_ref().take(len.into()).read_to_end(&mut self.buf)?;
        if available < len as usize {
            return Err(Error::LengthOutOfBounds {
                tag: record_type,
                len,
                available: available as u64,
            });
        }

        let ordinal = self.next_ordinal;
        let event = decode_payload(record_type, ordinal, &self.buf, self.endianness)?;
        self.next_ordinal = ordinal.next();
        debug!(%ordinal, kind = %event.kind(), "Decoded event");
        Ok(Some(event))
    }
}

fn decode_payload(
    record_type: RecordType,
    ordinal: Ordinal,
    payload: &[u8],
    endianness: byteordered::Endianness,
) -> Result<Event, Error> {
    let len = payload.len();
    let malformed = |expected: usize| Error::MalformedPayload {
        tag: record_type,
        len: len as u32,
        expected: expected as u64,
    };
    let mut r = ByteOrdered::new(payload, endianness);

    Ok(match record_type {
        RecordType::Alloc => {
            if len != AllocEvent::WIRE_SIZE {
                return Err(malformed(AllocEvent::WIRE_SIZE));
            }
            let timestamp = Timestamp(r.read_u32()?.into());
            let context = ContextRef(r.read_u32()?);
            let id = ResourceId(r.read_u64()?);
            let size = r.read_u64()?;
            Event::Alloc(AllocEvent {
                ordinal,
                timestamp,
                id,
                size,
                context,
            })
        }

        RecordType::Free => {
            if len != FreeEvent::WIRE_SIZE {
                return Err(malformed(FreeEvent::WIRE_SIZE));
            }
            let timestamp = Timestamp(r.read_u32()?.into());
            let context = ContextRef(r.read_u32()?);
            let id = ResourceId(r.read_u64()?);
            Event::Free(FreeEvent {
                ordinal,
                timestamp,
                id,
                context,
            })
        }

        RecordType::Context => {
            if len < ContextEvent::MIN_WIRE_SIZE {
                return Err(malformed(ContextEvent::MIN_WIRE_SIZE));
            }
            let context = ContextRef(r.read_u32()?);
            let frame_count = r.read_u32()?;
            let expected = u64::from(frame_count) * ContextEvent::FRAME_WIRE_SIZE as u64
                + ContextEvent::MIN_WIRE_SIZE as u64;
            if expected != len as u64 {
                return Err(Error::MalformedPayload {
                    tag: record_type,
                    len: len as u32,
                    expected,
                });
            }
            let mut frames = vec![0; frame_count as usize];
            r.read_u64_into(&mut frames)?;
            Event::Context(ContextEvent {
                ordinal,
                context,
                frames,
            })
        }

        RecordType::Info => {
            if len < InfoEvent::MIN_WIRE_SIZE {
                return Err(malformed(InfoEvent::MIN_WIRE_SIZE));
            }
            let key_len = usize::from(r.read_u16()?);
            if len < InfoEvent::MIN_WIRE_SIZE + key_len {
                return Err(malformed(InfoEvent::MIN_WIRE_SIZE + key_len));
            }
            let key = read_string(&mut r, key_len)?;
            let value_len = usize::from(r.read_u16()?);
            let expected = InfoEvent::MIN_WIRE_SIZE + key_len + value_len;
            if len != expected {
                return Err(malformed(expected));
            }
            let value = read_string(&mut r, value_len)?;
            Event::Info(InfoEvent {
                ordinal,
                key,
                value,
            })
        }

        RecordType::Header => {
            return Err(Error::UnexpectedHeader { len: len as u32 })
        }
        RecordType::Unknown(tag) => {
            return Err(Error::UnknownRecordType {
                tag,
                len: len as u32,
            })
        }
    })
}

fn read_string<R: Read, E: byteordered::Endian>(
    r: &mut ByteOrdered<R, E>,
    len: usize,
) -> Result<String, Error> {
    let mut bytes = vec![0; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
