use crate::address_space::{AddressSpace, LayoutError, PageState, Permissions};
use crate::config::Config;
use crate::processor::Summary;
use crate::registry::ResourceRecord;
use crate::report::ReportGenerator;
use ordered_float::OrderedFloat;
use std::io::{self, Write};
use tracing::{debug, error};

/// Density glyphs from empty to fully resident
pub const GLYPHS: &[u8; 10] = b" .:-=+*#%@";

/// Glyph for a density in `[0, 1]`. Anything above zero gets at least the
/// first non-blank level.
pub fn glyph(density: OrderedFloat<f64>) -> char {
    let levels = (GLYPHS.len() - 1) as f64;
    let idx = (density.0.clamp(0.0, 1.0) * levels).ceil() as usize;
    GLYPHS[idx.min(GLYPHS.len() - 1)] as char
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DensityRow {
    pub start: u64,
    pub end: u64,
    pub permissions: Permissions,
    pub backing: String,
    /// Fraction of resident pages per bucket, the last one may cover fewer pages
    pub buckets: Vec<OrderedFloat<f64>>,
    pub resident_pages: usize,
    pub pages: usize,
    pub leaked_count: u64,
    pub leaked_bytes: u64,
}

impl DensityRow {
    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let glyphs: String = self.buckets.iter().copied().map(glyph).collect();
        write!(
            out,
            "{:#014x}-{:#014x} {} {:>6} |{}| {}/{} pages, leaked {} ({} bytes)",
            self.start,
            self.end,
            self.permissions,
            self.pages,
            glyphs,
            self.resident_pages,
            self.pages,
            self.leaked_count,
            self.leaked_bytes
        )?;
        if !self.backing.is_empty() {
            write!(out, " {}", self.backing)?;
        }
        writeln!(out)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
struct Leaks {
    count: u64,
    bytes: u64,
}

impl Leaks {
    fn add(&mut self, record: &ResourceRecord) {
        self.count += 1;
        self.bytes = self.bytes.saturating_add(record.size);
    }
}

/// Renders the page residency of every memory area as a row of density
/// glyphs, one per bucket of pages
#[derive(Debug)]
pub struct DensityReport<W: Write> {
    out: W,
    space: AddressSpace,
    bucket_pages: usize,
    leaks: Vec<Leaks>,
    unmapped_leaks: Leaks,
    validation_error: Option<LayoutError>,
}

impl<W: Write> DensityReport<W> {
    pub fn new(out: W, space: AddressSpace, config: &Config) -> Self {
        let leaks = vec![Leaks::default(); space.areas().len()];
        Self {
            out,
            space,
            bucket_pages: config.bucket_pages.max(1),
            leaks,
            unmapped_leaks: Leaks::default(),
            validation_error: None,
        }
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn validate(&self) -> bool {
        self.space.validate()
    }

    /// Set when `finalize` refused to render an inconsistent address space
    pub fn validation_error(&self) -> Option<&LayoutError> {
        self.validation_error.as_ref()
    }

    pub fn rows(&self) -> Result<Vec<DensityRow>, LayoutError> {
        self.space.check()?;
        let rows = self
            .space
            .areas()
            .iter()
            .zip(self.leaks.iter())
            .map(|(area, leaks)| DensityRow {
                start: area.start,
                end: area.end,
                permissions: area.permissions,
                backing: area.backing.clone(),
                buckets: area
                    .pages
                    .chunks(self.bucket_pages)
                    .map(|chunk| {
                        let resident =
                            chunk.iter().filter(|p| **p == PageState::Resident).count();
                        OrderedFloat(resident as f64 / chunk.len() as f64)
                    })
                    .collect(),
                resident_pages: area.resident_pages(),
                pages: area.pages.len(),
                leaked_count: leaks.count,
                leaked_bytes: leaks.bytes,
            })
            .collect();
        Ok(rows)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_legend(&mut self) -> io::Result<()> {
        let levels = GLYPHS.len() - 1;
        writeln!(
            self.out,
            "# page size {} bytes, {} pages per bucket",
            self.space.page_size(),
            self.bucket_pages
        )?;
        writeln!(self.out, "'{}' 0%", GLYPHS[0] as char)?;
        for (level, g) in GLYPHS.iter().enumerate().skip(1) {
            let lo = (level - 1) * 100 / levels;
            let hi = level * 100 / levels;
            writeln!(self.out, "'{}' {lo}% - {hi}%", *g as char)?;
        }
        Ok(())
    }
}

impl<W: Write> ReportGenerator for DensityReport<W> {
    fn name(&self) -> &str {
        "density"
    }

    fn on_leaked(&mut self, record: &ResourceRecord) {
        let area = self
            .space
            .areas()
            .iter()
            .position(|a| a.contains(record.id.0));
        match area.and_then(|idx| self.leaks.get_mut(idx)) {
            Some(leaks) => leaks.add(record),
            None => self.unmapped_leaks.add(record),
        }
    }

    fn finalize(&mut self, summary: &Summary<'_>) -> io::Result<()> {
        let rows = match self.rows() {
            Ok(rows) => rows,
            Err(e) => {
                error!(err = %e, "Address space is inconsistent, density report not written");
                self.validation_error = Some(e);
                return Ok(());
            }
        };
        debug!(areas = rows.len(), "Writing density report");

        self.write_legend()?;
        for row in &rows {
            row.write(&mut self.out)?;
        }
        if self.unmapped_leaks.count != 0 {
            writeln!(
                self.out,
                "# leaked outside mapped areas: {} ({} bytes)",
                self.unmapped_leaks.count, self.unmapped_leaks.bytes
            )?;
        }
        let anomalies = summary.stats.anomalies;
        writeln!(self.out, "# anomalies: {} ({})", anomalies.total(), anomalies)?;
        self.out.flush()
    }
}
