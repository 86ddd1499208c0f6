use common::TraceBuilder;
use pretty_assertions::assert_eq;
use rtrace_parser::address_space::{AddressSpace, MemoryArea, PageState};
use rtrace_parser::processor::Error;
use rtrace_parser::registry::{ResourceRecord, ResourceStatus, Transition};
use rtrace_parser::report::{
    Control, DensityReport, Filter, ReportGenerator, TimelineEntry, TimelineReport,
};
use rtrace_parser::time::Timestamp;
use rtrace_parser::types::ResourceId;
use rtrace_parser::wire::event::{Event, EventKind};
use rtrace_parser::{wire, Config, Processor, Retention, Stats, Summary};
use std::io;

mod common;

/// Collects everything the processor hands out
#[derive(Default)]
struct Collector {
    events: Vec<Event>,
    leaked: Vec<ResourceRecord>,
    finalized: u32,
}

impl ReportGenerator for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    fn on_event(&mut self, event: &Event, _transition: &Transition) -> Control {
        self.events.push(event.clone());
        Control::Continue
    }

    fn on_leaked(&mut self, record: &ResourceRecord) {
        self.leaked.push(*record);
    }

    fn finalize(&mut self, _summary: &Summary<'_>) -> io::Result<()> {
        self.finalized += 1;
        Ok(())
    }
}

fn run_timeline(bytes: &[u8]) -> (Stats, Vec<TimelineEntry>, String) {
    let mut timeline = TimelineReport::new(Vec::new());
    let mut p = Processor::new(&Config::default());
    p.register(&mut timeline);
    let stats = p.run(&mut &bytes[..]).unwrap();
    let entries = timeline.entries().to_vec();
    let text = String::from_utf8(timeline.into_inner()).unwrap();
    (stats, entries, text)
}

#[test_log::test]
fn alloc_alloc_free() {
    let bytes = TraceBuilder::new()
        .alloc(0, 100, 64)
        .alloc(10, 200, 32)
        .free(20, 100)
        .build();
    let (stats, entries, text) = run_timeline(&bytes);

    assert_eq!(stats.event_count(EventKind::Alloc), 2);
    assert_eq!(stats.event_count(EventKind::Free), 1);
    assert_eq!(stats.leaked_count, 1);
    assert_eq!(stats.leaked_bytes, 32);
    assert_eq!(stats.anomalies.total(), 0);
    assert_eq!(stats.usage.high_water_mark, 96);
    assert_eq!(stats.last_timestamp, Timestamp::from_millis(20));

    assert_eq!(entries.len(), 4);
    match &entries[3] {
        TimelineEntry::Leaked(r) => {
            assert_eq!(r.id, ResourceId(200));
            assert_eq!(r.status, ResourceStatus::Leaked);
        }
        e => panic!("Expected a leak entry, got {e:?}"),
    }

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "       1 00:00:00.000 alloc  0x64 size=64 ctx=0x0",
            "       2 00:00:00.010 alloc  0xc8 size=32 ctx=0x0",
            "       3 00:00:00.020 free   0x64 ctx=0x0 size=64 alloc=#1 duration=0.02",
            "       2 00:00:00.010 leak   0xc8 size=32 ctx=0x0 duration=0.01",
            "# events: 3, leaked: 1 (32 bytes), peak usage: 96 bytes",
            "# anomalies: 0 (dangling frees: 0, duplicate allocations: 0, malformed sizes: 0, unknown records: 0, malformed records: 0, truncated records: 0)",
        ]
    );
}

#[test_log::test]
fn dangling_free() {
    let bytes = TraceBuilder::new().free(0, 5).build();
    let (stats, entries, text) = run_timeline(&bytes);

    assert_eq!(stats.leaked_count, 0);
    assert_eq!(stats.anomalies.total(), 1);
    assert_eq!(stats.anomalies.dangling_frees, 1);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_unmatched_free());
    assert!(text.lines().next().unwrap().ends_with(" unmatched"));
}

#[test_log::test]
fn leaked_exactly_once_in_ordinal_order() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x30, 1)
        .alloc(1, 0x10, 1)
        .alloc(2, 0x20, 1)
        .free(3, 0x10)
        .alloc(4, 0x05, 1)
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    let ids: Vec<u64> = c.leaked.iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![0x30, 0x20, 0x05]);
    assert!(c.leaked.windows(2).all(|w| w[0].allocated < w[1].allocated));
    assert_eq!(stats.leaked_count, 3);
    assert_eq!(c.finalized, 1);
}

#[test_log::test]
fn freed_is_terminal() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .free(1, 0x10)
        .free(2, 0x10)
        .build();
    let (stats, entries, _) = run_timeline(&bytes);

    assert_eq!(stats.leaked_count, 0);
    assert_eq!(stats.anomalies.dangling_frees, 1);
    assert!(!entries[1].is_unmatched_free());
    assert!(entries[2].is_unmatched_free());
}

#[test_log::test]
fn resyncs_after_unknown_record() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .record(0xEE, &[0xAB; 33])
        .alloc(1, 0x20, 8)
        .free(2, 0x10)
        .free(3, 0x20)
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(c.events.len(), 4);
    assert_eq!(stats.events_decoded, 4);
    assert_eq!(stats.records_skipped, 1);
    assert_eq!(stats.anomalies.unknown_records, 1);
    assert_eq!(stats.anomalies.total(), 1);
    let ordinals: Vec<u64> = c.events.iter().map(|e| e.ordinal().get_raw()).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);
}

#[test_log::test]
fn duplicate_alloc_overwrites() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .alloc(1, 0x10, 16)
        .build();
    let (stats, entries, text) = run_timeline(&bytes);

    assert_eq!(stats.anomalies.duplicate_allocs, 1);
    // The displaced allocation and the one live at the end
    assert_eq!(stats.leaked_count, 2);
    assert_eq!(stats.leaked_bytes, 24);
    assert_eq!(entries.len(), 4);
    assert!(matches!(&entries[1], TimelineEntry::Leaked(r) if r.size == 8));
    assert!(matches!(
        entries[2],
        TimelineEntry::Alloc {
            overwrites: Some(_),
            ..
        }
    ));
    assert!(matches!(&entries[3], TimelineEntry::Leaked(r) if r.size == 16));
    assert!(text.contains("overwritten=#1"));
}

#[test_log::test]
fn displaced_allocation_is_reported_leaked() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x1010, 64)
        .alloc(1, 0x1010, 32)
        .free(2, 0x1010)
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(c.leaked.len(), 1);
    assert_eq!(c.leaked[0].size, 64);
    assert_eq!(c.leaked[0].status, ResourceStatus::Leaked);
    assert_eq!((stats.leaked_count, stats.leaked_bytes), (1, 64));
    assert_eq!(stats.anomalies.duplicate_allocs, 1);
}

#[test_log::test]
fn stray_header_record_is_skipped() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .record(TraceBuilder::TAG_HEADER, &[0; 12])
        .alloc(1, 0x20, 8)
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(c.events.len(), 2);
    assert_eq!(c.finalized, 1);
    assert_eq!(stats.records_skipped, 1);
    assert_eq!(stats.anomalies.malformed_records, 1);
    assert_eq!(stats.leaked_count, 2);
}

#[test_log::test]
fn malformed_known_record_is_skipped() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .record(TraceBuilder::TAG_FREE, &[0; 9])
        .free(1, 0x10)
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(stats.events_decoded, 2);
    assert_eq!(stats.records_skipped, 1);
    assert_eq!(stats.anomalies.malformed_records, 1);
    assert_eq!(stats.anomalies.unknown_records, 0);
    assert_eq!(stats.anomalies.total(), 1);
    assert_eq!(stats.leaked_count, 0);
    let ordinals: Vec<u64> = c.events.iter().map(|e| e.ordinal().get_raw()).collect();
    assert_eq!(ordinals, vec![1, 2]);
}

#[test_log::test]
fn truncated_capture_still_finalizes() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .raw(&[0x01, 0x18, 0x00])
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert!(stats.truncated);
    assert_eq!(stats.anomalies.truncated_records, 1);
    assert_eq!(c.leaked.len(), 1);
    assert_eq!(c.finalized, 1);
}

#[test]
fn fatal_decode_error() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .raw(&[0x01, 0x18, 0x00, 0x00, 0x00, 0xFF])
        .build();
    let mut c = Collector::default();
    let mut p = Processor::new(&Config::default());
    p.register(&mut c);
    let err = p.run(&mut bytes.as_slice()).unwrap_err();

    assert!(matches!(
        err,
        Error::Decode(wire::Error::LengthOutOfBounds { .. })
    ));
    assert_eq!(c.finalized, 0);
}

#[test]
fn no_generators() {
    let bytes = TraceBuilder::new().alloc(0, 0x10, 8).build();
    let p = Processor::new(&Config::default());
    assert!(matches!(
        p.run(&mut bytes.as_slice()),
        Err(Error::NoGenerators)
    ));
}

#[test_log::test]
fn timeline_limit_and_filters() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .alloc(10, 0x20, 4096)
        .free(20, 0x10)
        .alloc(30, 0x30, 8192)
        .alloc(40, 0x40, 16384)
        .build();
    let mut timeline = TimelineReport::new(Vec::new())
        .with_filter(Filter::MinSize(1024))
        .with_limit(2);
    let mut p = Processor::new(&Config::default());
    p.register(&mut timeline);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(stats.events_decoded, 5);
    let ordinals: Vec<u64> = timeline
        .entries()
        .iter()
        .map(|e| e.ordinal().get_raw())
        .collect();
    // The free passes the size filter, the limit detaches the report
    // before any leak is reported
    assert_eq!(ordinals, vec![2, 3]);
    let text = String::from_utf8(timeline.into_inner()).unwrap();
    assert!(text.contains("# events: 5, leaked: 3"));
}

#[test_log::test]
fn timeline_limit_covers_leak_lines() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .alloc(1, 0x20, 8)
        .alloc(2, 0x30, 8)
        .build();
    let mut timeline = TimelineReport::new(Vec::new()).with_limit(4);
    let mut p = Processor::new(&Config::default());
    p.register(&mut timeline);
    let stats = p.run(&mut bytes.as_slice()).unwrap();

    assert_eq!(stats.leaked_count, 3);
    let entries = timeline.entries();
    assert_eq!(entries.len(), 4);
    assert!(matches!(&entries[3], TimelineEntry::Leaked(r) if r.id == ResourceId(0x10)));
}

#[test_log::test]
fn late_registration_replays_closed() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x10, 8)
        .free(1, 0x10)
        .alloc(2, 0x20, 8)
        .alloc(3, 0x30, 8)
        .free(4, 0x20)
        .build();
    let mut r = bytes.as_slice();
    let mut early = Collector::default();
    let mut late = TimelineReport::new(Vec::new());
    let config = Config::default().with_closed_retention(Retention::Bounded(8));
    let mut p = Processor::new(&config);
    p.register(&mut early);

    let mut reader = p.start(&mut r).unwrap();
    for _ in 0..3 {
        assert!(p.step(&mut reader, &mut r).unwrap());
    }
    p.register(&mut late);
    p.drain(&mut reader, &mut r).unwrap();
    let stats = p.finish().unwrap();

    assert_eq!(stats.leaked_count, 1);
    assert_eq!(early.events.len(), 5);
    let entries = late.entries();
    assert!(matches!(&entries[0], TimelineEntry::Closed(rec) if rec.id == ResourceId(0x10)));
    assert_eq!(
        entries.iter().map(|e| e.ordinal().get_raw()).collect::<Vec<_>>(),
        vec![1, 4, 5, 4]
    );
    assert!(matches!(&entries[3], TimelineEntry::Leaked(rec) if rec.id == ResourceId(0x30)));
}

#[test_log::test]
fn density_report_attributes_leaks() {
    let bytes = TraceBuilder::new()
        .alloc(0, 0x1010, 64)
        .alloc(1, 0x8000, 32)
        .free(2, 0x5000)
        .build();
    let space = AddressSpace::new(
        4096,
        vec![
            MemoryArea::new(
                0x1000,
                0x3000,
                "rw-p".parse().unwrap(),
                "[heap]",
                vec![PageState::Resident, PageState::Absent],
            ),
            MemoryArea::new(
                0x8000,
                0x9000,
                "r--p".parse().unwrap(),
                "",
                vec![PageState::Resident],
            ),
        ],
    );
    let config = Config::default().with_bucket_pages(1);
    let mut density = DensityReport::new(Vec::new(), space, &config);
    let mut p = Processor::new(&config);
    p.register(&mut density);
    p.run(&mut bytes.as_slice()).unwrap();

    let rows = density.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].leaked_count, rows[0].leaked_bytes), (1, 64));
    assert_eq!((rows[1].leaked_count, rows[1].leaked_bytes), (1, 32));
    let text = String::from_utf8(density.into_inner()).unwrap();
    assert!(text.contains("|@ | 1/2 pages, leaked 1 (64 bytes) [heap]"));
    assert!(text
        .lines()
        .last()
        .unwrap()
        .starts_with("# anomalies: 1 (dangling frees: 1,"));
}

#[test_log::test]
fn density_report_rejects_overlapping_areas() {
    let bytes = TraceBuilder::new().alloc(0, 0x1010, 64).build();
    let space = AddressSpace::new(
        4096,
        vec![
            MemoryArea::new(0x1000, 0x3000, Default::default(), "", vec![PageState::Resident; 2]),
            MemoryArea::new(0x2000, 0x4000, Default::default(), "", vec![PageState::Resident; 2]),
        ],
    );
    let config = Config::default();
    let mut density = DensityReport::new(Vec::new(), space, &config);
    assert!(!density.validate());
    let mut p = Processor::new(&config);
    p.register(&mut density);
    p.run(&mut bytes.as_slice()).unwrap();

    assert!(density.validation_error().is_some());
    assert!(density.into_inner().is_empty());
}

#[test_log::test]
fn flush_is_idempotent() {
    let bytes = TraceBuilder::new().alloc(0, 0x10, 8).alloc(1, 0x20, 8).build();
    let mut r = bytes.as_slice();
    let config = Config::default();
    let mut reader = wire::TraceReader::read(&mut r, &config).unwrap();
    let mut registry = rtrace_parser::ResourceRegistry::new(&config);
    while let Some(ev) = reader.read_event(&mut r).unwrap() {
        registry.apply(&ev);
    }
    assert_eq!(registry.flush().len(), 2);
    assert!(registry.flush().is_empty());
    assert!(registry.is_flushed());
}
