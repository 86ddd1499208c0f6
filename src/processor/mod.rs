//! Event Stream Processor.
//!
//! Reads the header, then pulls one event at a time from the decoder,
//! applies it to the registry and offers it to every attached generator.
//! At end of stream the registry is flushed, leaked records are handed to
//! the generators in allocation order and each generator is finalized once.
//!
//! Everything runs on the caller's thread.

use crate::config::Config;
use crate::registry::{AnomalyCounts, ResourceRecord, ResourceRegistry, Transition};
use crate::report::{Control, ReportGenerator};
use crate::wire::event::Event;
use crate::wire::{self, TraceReader};
use std::io::Read;
use tracing::{debug, error, warn};

pub use error::Error;
pub use stats::{Stats, Summary};

pub mod error;
pub mod stats;

struct Slot<'g> {
    generator: &'g mut dyn ReportGenerator,
    /// Cleared when the generator returns `Control::Stop`
    attached: bool,
}

pub struct Processor<'g> {
    config: Config,
    registry: ResourceRegistry,
    generators: Vec<Slot<'g>>,
    /// Recoverable decode problems, registry anomalies are counted by the
    /// registry itself
    decode_anomalies: AnomalyCounts,
    stats: Stats,
}

impl<'g> Processor<'g> {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            registry: ResourceRegistry::new(config),
            generators: Vec::new(),
            decode_anomalies: AnomalyCounts::default(),
            stats: Stats::default(),
        }
    }

    /// Adds a generator. One registered after events were processed is
    /// first replayed the registry's recently-closed records.
    pub fn register(&mut self, generator: &'g mut dyn ReportGenerator) {
        if self.stats.events_decoded != 0 {
            let mut replayed = 0_usize;
            for record in self.registry.recently_closed() {
                generator.on_replayed(record);
                replayed += 1;
            }
            debug!(
                generator = generator.name(),
                replayed, "Late generator registration"
            );
        }
        self.generators.push(Slot {
            generator,
            attached: true,
        });
    }

    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Processes the whole stream and finalizes every generator
    pub fn run<R: Read>(mut self, r: &mut R) -> Result<Stats, Error> {
        if self.generators.is_empty() {
            return Err(Error::NoGenerators);
        }
        let mut reader = self.start(r)?;
        self.drain(&mut reader, r)?;
        self.finish()
    }

    /// Reads the header record
    pub fn start<R: Read>(&mut self, r: &mut R) -> Result<TraceReader, Error> {
        let reader = TraceReader::read(r, &self.config)?;
        self.stats.header = Some(reader.header.clone());
        Ok(reader)
    }

    /// Processes events until the end of the stream
    pub fn drain<R: Read>(&mut self, reader: &mut TraceReader, r: &mut R) -> Result<(), Error> {
        while self.step(reader, r)? {}
        debug!(
            events = self.stats.events_decoded,
            skipped = self.stats.records_skipped,
            "Reached end of stream"
        );
        Ok(())
    }

    /// Processes at most one record, returns false at end of stream
    pub fn step<R: Read>(&mut self, reader: &mut TraceReader, r: &mut R) -> Result<bool, Error> {
        match reader.read_event(r) {
            Ok(Some(event)) => {
                self.feed(&event);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) if e.is_recoverable() => {
                warn!(err = %e, "Skipping record");
                match e {
                    wire::Error::UnknownRecordType { .. } => {
                        self.decode_anomalies.unknown_records += 1
                    }
                    _ => self.decode_anomalies.malformed_records += 1,
                }
                self.stats.records_skipped += 1;
                Ok(true)
            }
            Err(e) if e.is_truncation() => {
                warn!(err = %e, "Trace ends part way through a record");
                self.decode_anomalies.truncated_records += 1;
                self.stats.truncated = true;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies one event to the registry and offers it to the attached
    /// generators
    pub fn feed(&mut self, event: &Event) {
        let transition = self.registry.apply(event);
        self.stats.events_decoded += 1;
        *self.stats.events.entry(event.kind()).or_default() += 1;
        if let Transition::Replaced { previous, .. } = &transition {
            self.leak(previous);
        }

        for slot in self.generators.iter_mut().filter(|s| s.attached) {
            if slot.generator.on_event(event, &transition) == Control::Stop {
                debug!(
                    generator = slot.generator.name(),
                    ordinal = %event.ordinal(),
                    "Generator detached"
                );
                slot.attached = false;
            }
        }
    }

    fn leak(&mut self, record: &ResourceRecord) {
        self.stats.leaked_count += 1;
        self.stats.leaked_bytes = self.stats.leaked_bytes.saturating_add(record.size);
        for slot in self.generators.iter_mut().filter(|s| s.attached) {
            slot.generator.on_leaked(record);
        }
    }

    /// Flushes the registry, hands leaked records to the attached generators
    /// and finalizes all of them.
    ///
    /// Every generator is finalized even if an earlier one failed, the first
    /// failure is returned.
    pub fn finish(mut self) -> Result<Stats, Error> {
        for record in self.registry.flush() {
            self.leak(&record);
        }

        self.stats.usage = self.registry.usage();
        self.stats.anomalies = self.registry.anomalies() + self.decode_anomalies;
        self.stats.last_timestamp = self.registry.last_timestamp();
        debug!(
            leaked = self.stats.leaked_count,
            anomalies = self.stats.anomalies.total(),
            "Finalizing generators"
        );

        let summary = Summary {
            stats: &self.stats,
            registry: &self.registry,
        };
        let mut first_err = None;
        for slot in self.generators.iter_mut() {
            if let Err(source) = slot.generator.finalize(&summary) {
                let name = slot.generator.name().to_owned();
                error!(generator = %name, err = %source, "Report generator failed");
                first_err.get_or_insert(Error::Report { name, source });
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }
}
