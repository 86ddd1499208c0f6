use crate::config::Config;
use crate::wire::event::{Event, EventParser};
use crate::wire::{Error, HeaderInfo};
use std::io::Read;
use tracing::debug;

/// Header state plus the event decoder configured from it
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TraceReader {
    pub header: HeaderInfo,
    parser: EventParser,
}

impl TraceReader {
    /// Reads the header record, which must come first
    pub fn read<R: Read>(r: &mut R, config: &Config) -> Result<Self, Error> {
        debug!("Reading header record");
        let header = HeaderInfo::read(r, config)?;
        debug!(pid = header.pid, pointer_size = header.pointer_size, "Found header");
        let parser = EventParser::new(header.endianness, config);
        Ok(Self { header, parser })
    }

    pub fn read_event<R: Read>(&mut self, r: &mut R) -> Result<Option<Event>, Error> {
        self.parser.next_event(r)
    }

    pub fn events_decoded(&self) -> u64 {
        self.parser.events_decoded()
    }
}
