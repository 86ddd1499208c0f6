//! The binary trace protocol.
//!
//! A trace is a sequence of framed records, `[tag: u8][length: u32][payload]`.
//! The leading header record declares the byte order of everything that
//! follows, see [`HeaderInfo`].

pub use error::Error;
pub use header_info::HeaderInfo;
pub use reader::TraceReader;
pub use record::{RecordFrame, RecordType};

pub mod error;
pub mod event;
pub mod header_info;
pub mod reader;
pub mod record;
