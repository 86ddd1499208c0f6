#![allow(dead_code)]

/// Writes trace bytes record by record
pub struct TraceBuilder {
    big_endian: bool,
    bytes: Vec<u8>,
}

impl TraceBuilder {
    pub const TAG_HEADER: u8 = 0x00;
    pub const TAG_ALLOC: u8 = 0x01;
    pub const TAG_FREE: u8 = 0x02;
    pub const TAG_CONTEXT: u8 = 0x03;
    pub const TAG_INFO: u8 = 0x04;

    pub fn new() -> Self {
        Self::with_byte_order(false)
    }

    pub fn big_endian() -> Self {
        Self::with_byte_order(true)
    }

    fn with_byte_order(big_endian: bool) -> Self {
        let mut b = Self {
            big_endian,
            bytes: Vec::new(),
        };
        let mut payload = if big_endian {
            b"CRTR".to_vec()
        } else {
            b"RTRC".to_vec()
        };
        payload.extend_from_slice(&b.u16(1));
        payload.push(8);
        payload.push(0);
        payload.extend_from_slice(&b.u32(4242));
        b.record(Self::TAG_HEADER, &payload)
    }

    /// No header record
    pub fn headerless() -> Self {
        Self {
            big_endian: false,
            bytes: Vec::new(),
        }
    }

    fn u16(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u64(&self, v: u64) -> [u8; 8] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    pub fn record(mut self, tag: u8, payload: &[u8]) -> Self {
        self.bytes.push(tag);
        let len = self.u32(payload.len() as u32);
        self.bytes.extend_from_slice(&len);
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn alloc(self, ts: u32, id: u64, size: u64) -> Self {
        self.alloc_in(ts, 0, id, size)
    }

    pub fn alloc_in(self, ts: u32, ctx: u32, id: u64, size: u64) -> Self {
        let mut p = Vec::new();
        p.extend_from_slice(&self.u32(ts));
        p.extend_from_slice(&self.u32(ctx));
        p.extend_from_slice(&self.u64(id));
        p.extend_from_slice(&self.u64(size));
        self.record(Self::TAG_ALLOC, &p)
    }

    pub fn free(self, ts: u32, id: u64) -> Self {
        let mut p = Vec::new();
        p.extend_from_slice(&self.u32(ts));
        p.extend_from_slice(&self.u32(0));
        p.extend_from_slice(&self.u64(id));
        self.record(Self::TAG_FREE, &p)
    }

    pub fn context(self, ctx: u32, frames: &[u64]) -> Self {
        let mut p = Vec::new();
        p.extend_from_slice(&self.u32(ctx));
        p.extend_from_slice(&self.u32(frames.len() as u32));
        for f in frames {
            p.extend_from_slice(&self.u64(*f));
        }
        self.record(Self::TAG_CONTEXT, &p)
    }

    pub fn info(self, key: &str, value: &str) -> Self {
        let mut p = Vec::new();
        p.extend_from_slice(&self.u16(key.len() as u16));
        p.extend_from_slice(key.as_bytes());
        p.extend_from_slice(&self.u16(value.len() as u16));
        p.extend_from_slice(value.as_bytes());
        self.record(Self::TAG_INFO, &p)
    }

    /// Appends raw bytes, e.g. a cut-off record
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
