use serde::Serialize;

use crate::domain::time::SimTime;
use crate::error::{Error, Result};

/// A closed interval of simulated time, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: SimTime,
    end: SimTime,
}

impl TimeWindow {
    pub fn new(start: SimTime, end: SimTime) -> Result<Self> {
        if start > end {
            return Err(Error::ConfigurationError(format!("Time window starts at {} after it ends at {}.", start, end)));
        }

        Ok(TimeWindow { start, end })
    }

    pub fn get_start(&self) -> SimTime {
        self.start
    }

    pub fn get_end(&self) -> SimTime {
        self.end
    }

    /// `true` if `start <= time <= end`.
    pub fn contains(&self, time: SimTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// Checks whether two windows share time.
    ///
    /// With `inclusive` set, windows that only touch at an endpoint count as overlapping.
    pub fn overlaps(&self, other: &TimeWindow, inclusive: bool) -> bool {
        if inclusive {
            return self.start <= other.end && other.start <= self.end;
        }

        self.start < other.end && other.start < self.end
    }
}
