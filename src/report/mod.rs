//! Report generators.
//!
//! Generators are driven synchronously by the [`Processor`](crate::Processor):
//! every decoded event is offered to each registered generator in
//! registration order, leaked records follow at end of stream and
//! `finalize` is called exactly once. Callbacks receive borrowed data and
//! must copy whatever they keep. They shouldn't do I/O either, output is
//! written in `finalize`.

use crate::processor::Summary;
use crate::registry::{ResourceRecord, Transition};
use crate::wire::event::Event;
use std::io;

pub use density::{DensityReport, DensityRow};
pub use filter::Filter;
pub use timeline::{TimelineEntry, TimelineReport};

pub mod density;
pub mod filter;
pub mod timeline;

/// Returned from [`ReportGenerator::on_event`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum Control {
    #[default]
    Continue,
    /// The generator has seen enough, stop offering it events and leaked
    /// records. It is still finalized.
    Stop,
}

pub trait ReportGenerator {
    fn name(&self) -> &str;

    /// Called for every decoded event, after the registry applied it
    fn on_event(&mut self, _event: &Event, _transition: &Transition) -> Control {
        Control::Continue
    }

    /// Called at registration time with the registry's recently-closed
    /// records when the generator joins after events were processed
    fn on_replayed(&mut self, _record: &ResourceRecord) {}

    /// Called once per leaked resource: when an allocation displaces a live
    /// record with the same identifier (before that event is offered), and
    /// for every resource still live at the end of the stream, in allocation
    /// order
    fn on_leaked(&mut self, _record: &ResourceRecord) {}

    fn finalize(&mut self, summary: &Summary<'_>) -> io::Result<()>;
}
