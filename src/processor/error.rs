use crate::wire;
use std::io;
use thiserror::Error;

/// Errors that end processing
#[derive(Debug, Error)]
pub enum Error {
    #[error("No report generators registered")]
    NoGenerators,

    #[error("Failed to decode the trace")]
    Decode(#[from] wire::Error),

    #[error("Report generator '{name}' failed to write its output")]
    Report {
        name: String,
        #[source]
        source: io::Error,
    },
}
