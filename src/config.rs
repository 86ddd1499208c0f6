//! Analyzer configuration.
//!
//! A `Config` is built once by the caller and passed by reference to the
//! reader, the registry and the processor.

/// How long closed resources stay available to generators registered
/// after they were freed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Retention {
    /// Keep every closed record until the stream ends
    #[default]
    UntilStreamEnd,
    /// Keep at most this many, dropping the oldest first
    Bounded(usize),
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Config {
    /// Largest record payload accepted by the decoder (default: 16 MiB).
    /// Anything larger is treated as a corrupt length field.
    pub max_record_len: u32,

    /// Largest plausible resource size (default: 2^48 bytes)
    pub max_resource_size: u64,

    /// Retention of the registry's recently-closed buffer
    pub closed_retention: Retention,

    /// Page size of the address space model (default: 4 KiB)
    pub page_size: u64,

    /// Number of pages folded into one density bucket (default: 16)
    pub bucket_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_record_len: 16 * 1024 * 1024,
            max_resource_size: 1 << 48,
            closed_retention: Retention::UntilStreamEnd,
            page_size: 4096,
            bucket_pages: 16,
        }
    }
}

impl Config {
    pub fn with_max_record_len(mut self, len: u32) -> Self {
        self.max_record_len = len;
        self
    }

    pub fn with_max_resource_size(mut self, size: u64) -> Self {
        self.max_resource_size = size;
        self
    }

    pub fn with_closed_retention(mut self, retention: Retention) -> Self {
        self.closed_retention = retention;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Zero is bumped to one page per bucket
    pub fn with_bucket_pages(mut self, pages: usize) -> Self {
        self.bucket_pages = pages.max(1);
        self
    }
}
