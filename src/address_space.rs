//! Read-only model of a process address space: the mapped memory areas and
//! the residency of each of their pages.
//!
//! Acquiring the data (memory maps, pagemap) is the caller's business, this
//! module only describes and checks it.

use derive_more::Display;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LayoutError {
    #[error("The address space has no memory areas")]
    Empty,

    #[error("Page size {0} is not a power of two")]
    PageSize(u64),

    #[error("Memory area 0x{start:x}-0x{end:x} is empty or inverted")]
    EmptyArea { start: u64, end: u64 },

    #[error("Memory area 0x{start:x}-0x{end:x} is not page aligned")]
    Unaligned { start: u64, end: u64 },

    #[error("Memory area 0x{start:x} spans {expected} pages but has residency for {actual}")]
    ResidencyLength {
        start: u64,
        expected: u64,
        actual: usize,
    },

    #[error("Memory area 0x{start:x} overlaps or precedes the area ending at 0x{previous_end:x}")]
    Overlap { start: u64, previous_end: u64 },

    #[error("Invalid permissions '{0}'")]
    Permissions(String),
}

/// Memory area access permissions, rendered like `/proc/<pid>/maps` does
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub shared: bool,
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            flag(self.read, 'r'),
            flag(self.write, 'w'),
            flag(self.execute, 'x'),
            if self.shared { 's' } else { 'p' }
        )
    }
}

impl FromStr for Permissions {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        let err = || LayoutError::Permissions(s.to_owned());
        if b.len() != 4 {
            return Err(err());
        }
        let flag = |c: u8, set: u8| match c {
            b'-' => Ok(false),
            c if c == set => Ok(true),
            _ => Err(err()),
        };
        Ok(Self {
            read: flag(b[0], b'r')?,
            write: flag(b[1], b'w')?,
            execute: flag(b[2], b'x')?,
            shared: match b[3] {
                b's' => true,
                b'p' => false,
                _ => return Err(err()),
            },
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display)]
pub enum PageState {
    #[default]
    #[display(fmt = "absent")]
    Absent,
    #[display(fmt = "resident")]
    Resident,
    #[display(fmt = "swapped")]
    Swapped,
}

/// A contiguous virtual address range `[start, end)`
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct MemoryArea {
    pub start: u64,
    pub end: u64,
    pub permissions: Permissions,
    /// Mapped file path or a pseudo name such as `[heap]`, may be empty
    pub backing: String,
    /// One entry per page
    pub pages: Vec<PageState>,
}

impl MemoryArea {
    pub fn new<S: Into<String>>(
        start: u64,
        end: u64,
        permissions: Permissions,
        backing: S,
        pages: Vec<PageState>,
    ) -> Self {
        Self {
            start,
            end,
            permissions,
            backing: backing.into(),
            pages,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_count(&self, page_size: u64) -> u64 {
        self.len() / page_size
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Pages past the residency array count as absent
    pub fn is_resident(&self, page: usize) -> bool {
        self.pages.get(page) == Some(&PageState::Resident)
    }

    pub fn resident_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| **p == PageState::Resident)
            .count()
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AddressSpace {
    page_size: u64,
    areas: Vec<MemoryArea>,
}

impl AddressSpace {
    pub fn new(page_size: u64, areas: Vec<MemoryArea>) -> Self {
        Self { page_size, areas }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Areas in the order they were supplied
    pub fn areas(&self) -> &[MemoryArea] {
        &self.areas
    }

    pub fn area_containing(&self, addr: u64) -> Option<&MemoryArea> {
        self.areas.iter().find(|a| a.contains(addr))
    }

    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// Checks the model is usable: non-empty, page aligned, residency sized
    /// to each area, areas sorted and non-overlapping.
    pub fn check(&self) -> Result<(), LayoutError> {
        if self.areas.is_empty() {
            return Err(LayoutError::Empty);
        }
        if !self.page_size.is_power_of_two() {
            return Err(LayoutError::PageSize(self.page_size));
        }
        let mut previous_end = None;
        for area in &self.areas {
            let (start, end) = (area.start, area.end);
            if start >= end {
                return Err(LayoutError::EmptyArea { start, end });
            }
            if start % self.page_size != 0 || end % self.page_size != 0 {
                return Err(LayoutError::Unaligned { start, end });
            }
            let expected = area.page_count(self.page_size);
            if expected != area.pages.len() as u64 {
                return Err(LayoutError::ResidencyLength {
                    start,
                    expected,
                    actual: area.pages.len(),
                });
            }
            if let Some(previous_end) = previous_end {
                if start < previous_end {
                    return Err(LayoutError::Overlap {
                        start,
                        previous_end,
                    });
                }
            }
            previous_end = Some(end);
        }
        Ok(())
    }
}
