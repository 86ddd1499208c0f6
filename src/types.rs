//! Types shared by the decoder, the registry and the reports

use derive_more::{Binary, Deref, Display, From, Into, LowerHex, UpperHex};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum Endianness {
    #[display(fmt = "little-endian")]
    Little,
    #[display(fmt = "big-endian")]
    Big,
}

impl From<byteordered::Endianness> for Endianness {
    fn from(e: byteordered::Endianness) -> Self {
        match e {
            byteordered::Endianness::Little => Endianness::Little,
            byteordered::Endianness::Big => Endianness::Big,
        }
    }
}

impl From<Endianness> for byteordered::Endianness {
    fn from(e: Endianness) -> byteordered::Endianness {
        match e {
            Endianness::Little => byteordered::Endianness::Little,
            Endianness::Big => byteordered::Endianness::Big,
        }
    }
}

/// Identifier of a traced resource: a heap address, a mapped page
/// address or an opaque handle value.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    From,
    Into,
    Display,
    Binary,
    LowerHex,
    UpperHex,
    Deref,
)]
#[display(fmt = "0x{_0:x}")]
pub struct ResourceId(pub u64);

/// Reference into the externally resolved call-context (backtrace) table.
///
/// The value is opaque, zero means the tracer did not record a context.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    From,
    Into,
    Display,
    LowerHex,
    UpperHex,
    Deref,
)]
#[display(fmt = "0x{_0:x}")]
pub struct ContextRef(pub u32);

impl ContextRef {
    pub const NONE: Self = ContextRef(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Sequence number assigned to every decoded event, defines the total order
/// of the trace. The first decoded event has ordinal 1.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Into, Display, Deref)]
#[display(fmt = "{_0}")]
pub struct Ordinal(pub(crate) u64);

impl Ordinal {
    pub const fn first() -> Self {
        Ordinal(1)
    }

    pub const fn new(raw: u64) -> Self {
        Ordinal(raw)
    }

    pub fn get_raw(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(&self) -> Self {
        Ordinal(self.0.saturating_add(1))
    }
}

/// Bytes held by live resources
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display)]
#[display(fmt = "{current}/{high_water_mark}")]
pub struct Usage {
    pub current: u64,
    pub high_water_mark: u64,
    pub live_count: u64,
    pub peak_live_count: u64,
}

impl Usage {
    pub(crate) fn handle_alloc(&mut self, size: u64) {
        self.current = self.current.saturating_add(size);
        if self.current > self.high_water_mark {
            self.high_water_mark = self.current;
        }
        self.live_count += 1;
        if self.live_count > self.peak_live_count {
            self.peak_live_count = self.live_count;
        }
    }

    pub(crate) fn handle_free(&mut self, size: u64) {
        self.current = self.current.saturating_sub(size);
        self.live_count = self.live_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn usage_tracks_high_water_mark() {
        let mut u = Usage::default();
        u.handle_alloc(64);
        u.handle_alloc(32);
        u.handle_free(64);
        u.handle_alloc(16);
        assert_eq!(u.current, 48);
        assert_eq!(u.high_water_mark, 96);
        assert_eq!(u.live_count, 2);
        assert_eq!(u.peak_live_count, 2);

        // Never underflows on unbalanced frees
        u.handle_free(1000);
        u.handle_free(1000);
        u.handle_free(1000);
        assert_eq!(u.current, 0);
        assert_eq!(u.live_count, 0);
    }

    #[test]
    fn display_forms() {
        assert_eq!(ResourceId(0xdead).to_string(), "0xdead");
        assert_eq!(ContextRef(0x10).to_string(), "0x10");
        assert!(ContextRef::NONE.is_none());
        assert_eq!(Ordinal::first().next().to_string(), "2");
    }
}
