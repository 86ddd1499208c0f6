//! Resource allocation trace analysis: decodes the binary trace protocol,
//! tracks the lifecycle of every traced resource and renders reports.

pub mod address_space;
pub mod config;
pub mod processor;
pub mod registry;
pub mod report;
pub mod time;
pub mod types;
pub mod wire;

pub use config::{Config, Retention};
pub use processor::{Processor, Stats, Summary};
pub use registry::ResourceRegistry;
