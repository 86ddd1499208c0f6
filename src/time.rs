use derive_more::{Add, AddAssign, Display, Into, Sum};
use std::fmt;
use std::ops;

/// Timestamp (in milliseconds) of a traced call, relative to the
/// tracer's time origin.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Into)]
pub struct Timestamp(pub(crate) u64);

impl Timestamp {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn get_raw(&self) -> u64 {
        self.0
    }

    pub fn millis(&self) -> u64 {
        self.get_raw()
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn elapsed_since(&self, earlier: Timestamp) -> Elapsed {
        Elapsed(self.0.saturating_sub(earlier.0))
    }
}

/// Renders as `HH:MM:SS.mmm`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0 % 1000;
        let secs = self.0 / 1000;
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            ms
        )
    }
}

impl ops::Add<Elapsed> for Timestamp {
    type Output = Timestamp;

    fn add(self, e: Elapsed) -> Timestamp {
        Timestamp(self.0.saturating_add(e.0))
    }
}

/// A span of time in milliseconds
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Into,
    Display,
    Add,
    AddAssign,
    Sum,
)]
#[display(fmt = "{}", "self.offset_string()")]
pub struct Elapsed(pub(crate) u64);

impl Elapsed {
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn millis(&self) -> u64 {
        self.0
    }

    /// Compact form, leading zero fields and trailing fraction zeros are dropped:
    /// 1500ms is `1.5`, one minute is `1:00`, zero is `0`.
    pub fn offset_string(&self) -> String {
        let full = Timestamp(self.0).to_string();
        let text = full
            .trim_start_matches(|c| c == ':' || c == '0')
            .trim_end_matches('0')
            .trim_end_matches('.');
        if text.is_empty() || text.starts_with('.') {
            format!("0{text}")
        } else {
            text.to_owned()
        }
    }
}
