use clap::Parser;
use rtrace_parser::address_space::{AddressSpace, MemoryArea, PageState, Permissions};
use rtrace_parser::report::{DensityReport, Filter, TimelineReport};
use rtrace_parser::time::Timestamp;
use rtrace_parser::wire::event::EventKind;
use rtrace_parser::{Config, Processor, Retention, Stats};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tabular::{Row, Table};

/// Print the timeline and a summary of a resource allocation trace
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Opts {
    /// Skip the timeline, only print the summary
    #[clap(long)]
    pub no_timeline: bool,

    /// Only show allocations of at least this many bytes
    #[clap(long, value_parser=clap_num::maybe_hex::<u64>)]
    pub min_size: Option<u64>,

    /// Only show allocations of at most this many bytes
    #[clap(long, value_parser=clap_num::maybe_hex::<u64>)]
    pub max_size: Option<u64>,

    /// Only show events at or after this many milliseconds into the trace
    #[clap(long)]
    pub start_ms: Option<u64>,

    /// Only show events at or before this many milliseconds into the trace
    #[clap(long)]
    pub end_ms: Option<u64>,

    /// Stop the timeline after this many lines
    #[clap(long)]
    pub limit: Option<usize>,

    /// Keep at most this many freed resources for late reports
    #[clap(long)]
    pub retain: Option<usize>,

    /// Largest record payload accepted
    #[clap(long, value_parser=clap_num::maybe_hex::<u32>)]
    pub max_record_len: Option<u32>,

    /// Memory map in /proc/<pid>/maps format, prints a density report of it.
    /// The maps format has no residency information, every page is shown
    /// as resident.
    #[clap(long)]
    pub maps: Option<PathBuf>,

    /// Pages per density bucket
    #[clap(long, default_value_t = 16)]
    pub bucket_pages: usize,

    /// Path to the trace file
    #[clap(value_parser)]
    pub path: PathBuf,
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    reset_signal_pipe_handler()?;

    try_init_tracing_subscriber()?;

    let mut config = Config::default().with_bucket_pages(opts.bucket_pages);
    if let Some(n) = opts.retain {
        config = config.with_closed_retention(Retention::Bounded(n));
    }
    if let Some(len) = opts.max_record_len {
        config = config.with_max_record_len(len);
    }

    let f = File::open(&opts.path)?;
    let mut r = BufReader::new(f);

    let mut timeline = TimelineReport::new(io::stdout());
    if let Some(size) = opts.min_size {
        timeline = timeline.with_filter(Filter::MinSize(size));
    }
    if let Some(size) = opts.max_size {
        timeline = timeline.with_filter(Filter::MaxSize(size));
    }
    if let Some(ms) = opts.start_ms {
        timeline = timeline.with_filter(Filter::MinTime(Timestamp::from_millis(ms)));
    }
    if let Some(ms) = opts.end_ms {
        timeline = timeline.with_filter(Filter::MaxTime(Timestamp::from_millis(ms)));
    }
    if let Some(limit) = opts.limit {
        timeline = timeline.with_limit(limit);
    }

    let mut density = match &opts.maps {
        Some(path) => Some(DensityReport::new(
            io::stdout(),
            read_maps(path, &config)?,
            &config,
        )),
        None => None,
    };

    let mut processor = Processor::new(&config);
    if !opts.no_timeline {
        processor.register(&mut timeline);
    }
    if let Some(density) = density.as_mut() {
        processor.register(density);
    }
    if processor.generator_count() == 0 {
        // Summary only
        let mut reader = processor.start(&mut r)?;
        processor.drain(&mut reader, &mut r)?;
        print_summary(&processor.finish()?);
    } else {
        print_summary(&processor.run(&mut r)?);
    }

    Ok(())
}

fn print_summary(stats: &Stats) {
    let mut table = Table::new("{:<}  {:>}");
    if let Some(h) = &stats.header {
        table.add_row(Row::new().with_cell("pid").with_cell(h.pid));
        table.add_row(Row::new().with_cell("byte order").with_cell(h.endianness));
        table.add_row(Row::new().with_cell("pointer size").with_cell(h.pointer_size));
    }
    for kind in enum_iterator::all::<EventKind>() {
        table.add_row(
            Row::new()
                .with_cell(format!("{kind} events"))
                .with_cell(stats.event_count(kind)),
        );
    }
    table.add_row(
        Row::new()
            .with_cell("skipped records")
            .with_cell(stats.records_skipped),
    );
    table.add_row(
        Row::new()
            .with_cell("peak usage (bytes)")
            .with_cell(stats.usage.high_water_mark),
    );
    table.add_row(
        Row::new()
            .with_cell("peak live resources")
            .with_cell(stats.usage.peak_live_count),
    );
    table.add_row(Row::new().with_cell("leaked").with_cell(stats.leaked_count));
    table.add_row(
        Row::new()
            .with_cell("leaked (bytes)")
            .with_cell(stats.leaked_bytes),
    );
    table.add_row(
        Row::new()
            .with_cell("anomalies")
            .with_cell(stats.anomalies.total()),
    );
    table.add_row(Row::new().with_cell("truncated").with_cell(stats.truncated));
    println!("----------------------------");
    print!("{table}");
    println!("----------------------------");
}

/// Reads `start-end perms offset dev inode [path]` lines
fn read_maps(path: &Path, config: &Config) -> Result<AddressSpace, Box<dyn std::error::Error>> {
    let r = BufReader::new(File::open(path)?);
    let mut areas = Vec::new();
    for line in r.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let (Some(range), Some(perms)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((start, end)) = range.split_once('-') else {
            return Err(format!("Invalid address range '{range}'").into());
        };
        let start = u64::from_str_radix(start, 16)?;
        let end = u64::from_str_radix(end, 16)?;
        let permissions: Permissions = perms.parse()?;
        let backing = fields.nth(3).unwrap_or_default();
        let pages = end.saturating_sub(start) / config.page_size;
        areas.push(MemoryArea::new(
            start,
            end,
            permissions,
            backing,
            vec![PageState::Resident; pages as usize],
        ));
    }
    Ok(AddressSpace::new(config.page_size, areas))
}

fn try_init_tracing_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt::Subscriber::builder();
    let env_filter = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                tracing::Level::WARN
            ))
        });
    let builder = builder.with_env_filter(env_filter);
    let subscriber = builder.finish();
    use tracing_subscriber::util::SubscriberInitExt;
    subscriber.try_init()?;
    Ok(())
}

// Used to prevent panics on broken pipes.
// See:
//   https://github.com/rust-lang/rust/issues/46016#issuecomment-605624865
fn reset_signal_pipe_handler() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(target_family = "unix")]
    {
        use nix::sys::signal;

        unsafe {
            signal::signal(signal::Signal::SIGPIPE, signal::SigHandler::SigDfl)?;
        }
    }

    Ok(())
}
